//! Integration tests for layered configuration
//!
//! These tests verify that configuration loading follows the correct precedence:
//! CLI arguments > Environment variables > Config file > Defaults

use agriboundary_core::config::{CliConfigOverrides, ConfigSource, LayeredConfig};
use agriboundary_core::models::{Device, ModelVariant, SegmentationBackend};
use chrono::NaiveDate;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

const ENV_KEYS: [&str; 5] = [
    "AGRIBOUNDARY_CLOUD_MAX",
    "AGRIBOUNDARY_REQUEST_TIMEOUT",
    "AGRIBOUNDARY_BACKEND",
    "AGRIBOUNDARY_SEED_SPACING",
    "AGRIBOUNDARY_CATALOG_URL",
];

fn clear_env() {
    for key in ENV_KEYS {
        env::remove_var(key);
    }
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", content).unwrap();
    file
}

#[test]
fn test_file_overrides_defaults() {
    let file = config_file(
        r#"
start_date = "2024-04-01"
end_date = "2024-08-31"
cloud_max = 20.0
backend = "model"
model_variant = "vit_l"
device = "cpu"
"#,
    );

    let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

    assert_eq!(config.start_date.value, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    assert_eq!(config.start_date.source, ConfigSource::File);
    assert_eq!(config.cloud_max.value, 20.0);
    assert_eq!(config.backend.value, SegmentationBackend::Model);
    assert_eq!(config.model_variant.value, ModelVariant::VitL);
    assert_eq!(config.device.value, Device::Cpu);
    // untouched keys keep their defaults
    assert_eq!(config.seed_spacing.value, 30);
    assert_eq!(config.seed_spacing.source, ConfigSource::Default);
}

#[test]
fn test_unknown_backend_in_file_is_rejected() {
    let file = config_file(r#"backend = "watershed""#);
    assert!(LayeredConfig::with_defaults().load_from_file(file.path()).is_err());
}

#[test]
fn test_malformed_file_is_rejected() {
    let file = config_file("cloud_max = [not toml");
    assert!(LayeredConfig::with_defaults().load_from_file(file.path()).is_err());
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    env::set_var("AGRIBOUNDARY_CLOUD_MAX", "5");
    env::set_var("AGRIBOUNDARY_BACKEND", "snic");

    let file = config_file("cloud_max = 20.0\nbackend = \"model\"");
    let config = LayeredConfig::with_defaults()
        .load_from_file(file.path())
        .unwrap()
        .load_from_env();

    assert_eq!(config.cloud_max.value, 5.0);
    assert_eq!(config.cloud_max.source, ConfigSource::Environment);
    assert_eq!(config.backend.value, SegmentationBackend::Clustering);
    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_value_is_ignored() {
    clear_env();
    env::set_var("AGRIBOUNDARY_SEED_SPACING", "lots");

    let config = LayeredConfig::with_defaults().load_from_env();

    assert_eq!(config.seed_spacing.value, 30);
    assert_eq!(config.seed_spacing.source, ConfigSource::Default);
    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_everything() {
    clear_env();
    env::set_var("AGRIBOUNDARY_CATALOG_URL", "http://env.example");

    let mut config = LayeredConfig::with_defaults().load_from_env();
    config.update_from_cli(CliConfigOverrides {
        catalog_url: Some("http://cli.example".to_string()),
        seed_spacing: Some(50),
        ..Default::default()
    });

    assert_eq!(config.catalog_url.value.as_deref(), Some("http://cli.example"));
    assert_eq!(config.catalog_url.source, ConfigSource::Cli);
    assert_eq!(config.seed_spacing.value, 50);

    let map = config.to_inspection_map();
    assert_eq!(map["seed_spacing"].1, ConfigSource::Cli);
    clear_env();
}

#[test]
#[serial]
fn test_request_timeout_layers() {
    clear_env();
    let config = LayeredConfig::with_defaults();
    assert_eq!(config.request_timeout.value, 300);

    let file = config_file("request_timeout = 60");
    let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();
    assert_eq!(config.request_timeout.value, 60);
    assert_eq!(config.request_timeout.source, ConfigSource::File);

    env::set_var("AGRIBOUNDARY_REQUEST_TIMEOUT", "15");
    let mut config = config.load_from_env();
    assert_eq!(config.request_timeout.value, 15);

    config.update_from_cli(CliConfigOverrides { request_timeout: Some(5), ..Default::default() });
    assert_eq!(config.request_timeout.value, 5);
    assert_eq!(config.to_inspection_map()["request_timeout"].0, "5 s");
    clear_env();
}
