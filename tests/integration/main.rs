//! Integration tests

mod common;
mod config_test;
mod evaluator_test;
mod scan_test;
