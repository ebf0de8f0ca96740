//! Tests for configuration loading and validation

use std::io::Write;

use wenzhen::config::Config;

#[test]
fn test_defaults_validate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file_roundtrip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[graph]
url = "http://graph.internal:7474"
user = "neo4j"
password = "secret"
timeout_secs = 20
vocab_limit = 50000

[ollama]
endpoint = "http://llm.internal:11434"
model = "cwchang/llama-3-taiwan-8b-instruct"
timeout_secs = 120

[recognizer]
endpoint = "http://ner.internal:8090"
timeout_secs = 10

[pipeline]
enable_fallback = true
enable_low_overlap = false
low_overlap_threshold = 0.008

[logging]
level = "info"
format = "text"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.graph.url, "http://graph.internal:7474");
    assert_eq!(config.graph.vocab_limit, 50_000);
    assert_eq!(config.ollama.timeout_secs, 120);
    assert!(config.pipeline.enable_fallback);
    assert!(!config.pipeline.enable_low_overlap);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file_rejects_bad_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not valid toml [[[").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_validate_rejects_zero_timeouts() {
    let mut config = Config::default();
    config.ollama.timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_out_of_range_threshold() {
    let mut config = Config::default();
    config.pipeline.low_overlap_threshold = 1.5;
    assert!(config.validate().is_err());
}
