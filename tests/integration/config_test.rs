//! Configuration loading tests

use alpha_scanner::config::Config;
use std::io::Write;

#[test]
fn test_config_example_parses() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.scanner.timeframe_hours.hours(), 4);
    assert_eq!(config.scanner.model_id, "alpha-v1");
    assert_eq!(config.exchange.symbol_suffix, "/USDT:USDT");
    assert_eq!(config.evaluator.horizons_hours, vec![4]);
    assert!(config.validate_settings().is_ok());
}

#[test]
fn test_config_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [scanner]
        top_k = 3
        large_threshold = 0.1
        mid_threshold = 0.5

        [store]
        database_url = "sqlite::memory:"

        [inference]
        url = "http://scorer.local/api/infer"
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.scanner.top_k, 3);
    assert_eq!(config.scanner.tier_thresholds().large, 0.1);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_bad_thresholds() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [scanner]
        large_threshold = 0.7
        mid_threshold = 0.4
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert!(config.validate_settings().is_err());
}

#[test]
fn test_malformed_config_is_not_treated_as_missing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [scanner]
        top_k = "ten"
        "#
    )
    .unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(!Config::is_missing_file(&err));

    let dir = tempfile::tempdir().unwrap();
    let missing = Config::load(dir.path().join("config.toml")).unwrap_err();
    assert!(Config::is_missing_file(&missing));
}
