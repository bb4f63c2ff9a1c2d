//! Inference gateway
//!
//! Sends valid feature rows to the remote scorer and maps the ordered response
//! back onto the originating rows.

mod client;
mod gateway;

pub use client::{InferenceClient, InferenceConfig};
pub use gateway::{build_request, score_rows};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request body: `{"rows": [{"ema12": .., "rv_24": ..}, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub rows: Vec<BTreeMap<String, f64>>,
}

impl InferenceRequest {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One element of the ordered response list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceScore {
    /// Model output; `null` on the wire leaves the row unscored
    pub raw_alpha: Option<f64>,
}

/// Opaque scoring function over feature vectors
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score every row of `request`, returning one entry per row in order
    async fn score(&self, request: &InferenceRequest) -> Result<Vec<InferenceScore>>;
}
