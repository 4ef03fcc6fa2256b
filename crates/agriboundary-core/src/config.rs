use crate::error::{BoundaryError, Result};
use crate::models::imagery::{DEFAULT_COLLECTION, NATIVE_SCALE_M};
use crate::models::{Device, ModelVariant, SegmentationBackend};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default compute-service call timeout; median compositing runs server-side
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for a detection session
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub start_date: ConfigValue<NaiveDate>,
    pub end_date: ConfigValue<NaiveDate>,
    pub cloud_max: ConfigValue<f64>,
    pub seed_spacing: ConfigValue<u32>,
    pub compactness: ConfigValue<f64>,
    pub backend: ConfigValue<SegmentationBackend>,
    pub model_variant: ConfigValue<ModelVariant>,
    pub device: ConfigValue<Device>,
    pub model_command: ConfigValue<String>,
    pub catalog_url: ConfigValue<Option<String>>,
    /// Seconds before a compute-service call is abandoned
    pub request_timeout: ConfigValue<u64>,
    pub collection: ConfigValue<String>,
    pub scale: ConfigValue<f64>,
    pub scratch_dir: ConfigValue<PathBuf>,
    pub credentials: ConfigValue<Option<PathBuf>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            start_date: ConfigValue::new(default_date(2023, 5, 1), ConfigSource::Default),
            end_date: ConfigValue::new(default_date(2023, 9, 30), ConfigSource::Default),
            cloud_max: ConfigValue::new(10.0, ConfigSource::Default),
            seed_spacing: ConfigValue::new(30, ConfigSource::Default),
            compactness: ConfigValue::new(0.5, ConfigSource::Default),
            backend: ConfigValue::new(SegmentationBackend::Clustering, ConfigSource::Default),
            model_variant: ConfigValue::new(ModelVariant::VitB, ConfigSource::Default),
            device: ConfigValue::new(Device::Auto, ConfigSource::Default),
            model_command: ConfigValue::new(
                "python scripts/segment_anything_masks.py".to_string(),
                ConfigSource::Default,
            ),
            catalog_url: ConfigValue::new(None, ConfigSource::Default),
            request_timeout: ConfigValue::new(DEFAULT_REQUEST_TIMEOUT_SECS, ConfigSource::Default),
            collection: ConfigValue::new(DEFAULT_COLLECTION.to_string(), ConfigSource::Default),
            scale: ConfigValue::new(NATIVE_SCALE_M, ConfigSource::Default),
            scratch_dir: ConfigValue::new(env::temp_dir(), ConfigSource::Default),
            credentials: ConfigValue::new(None, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| BoundaryError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| BoundaryError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(start) = file_config.start_date {
            self.start_date.update(start, ConfigSource::File);
        }
        if let Some(end) = file_config.end_date {
            self.end_date.update(end, ConfigSource::File);
        }
        if let Some(cloud_max) = file_config.cloud_max {
            self.cloud_max.update(cloud_max, ConfigSource::File);
        }
        if let Some(spacing) = file_config.seed_spacing {
            self.seed_spacing.update(spacing, ConfigSource::File);
        }
        if let Some(compactness) = file_config.compactness {
            self.compactness.update(compactness, ConfigSource::File);
        }
        if let Some(backend) = file_config.backend {
            self.backend.update(backend.parse()?, ConfigSource::File);
        }
        if let Some(variant) = file_config.model_variant {
            self.model_variant.update(variant.parse()?, ConfigSource::File);
        }
        if let Some(device) = file_config.device {
            self.device.update(device.parse()?, ConfigSource::File);
        }
        if let Some(command) = file_config.model_command {
            self.model_command.update(command, ConfigSource::File);
        }
        if let Some(url) = file_config.catalog_url {
            self.catalog_url.update(Some(url), ConfigSource::File);
        }
        if let Some(timeout) = file_config.request_timeout {
            self.request_timeout.update(timeout, ConfigSource::File);
        }
        if let Some(collection) = file_config.collection {
            self.collection.update(collection, ConfigSource::File);
        }
        if let Some(scale) = file_config.scale {
            self.scale.update(scale, ConfigSource::File);
        }
        if let Some(dir) = file_config.scratch_dir {
            self.scratch_dir.update(dir, ConfigSource::File);
        }
        if let Some(credentials) = file_config.credentials {
            self.credentials.update(Some(credentials), ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Some(date) = env_parsed::<NaiveDate>("AGRIBOUNDARY_START_DATE", "YYYY-MM-DD date") {
            self.start_date.update(date, ConfigSource::Environment);
        }
        if let Some(date) = env_parsed::<NaiveDate>("AGRIBOUNDARY_END_DATE", "YYYY-MM-DD date") {
            self.end_date.update(date, ConfigSource::Environment);
        }
        if let Some(cloud) = env_parsed::<f64>("AGRIBOUNDARY_CLOUD_MAX", "percentage") {
            self.cloud_max.update(cloud, ConfigSource::Environment);
        }
        if let Some(spacing) = env_parsed::<u32>("AGRIBOUNDARY_SEED_SPACING", "pixel count") {
            self.seed_spacing.update(spacing, ConfigSource::Environment);
        }
        if let Some(compactness) = env_parsed::<f64>("AGRIBOUNDARY_COMPACTNESS", "number") {
            self.compactness.update(compactness, ConfigSource::Environment);
        }
        if let Some(backend) =
            env_parsed::<SegmentationBackend>("AGRIBOUNDARY_BACKEND", "snic or model")
        {
            self.backend.update(backend, ConfigSource::Environment);
        }
        if let Some(variant) =
            env_parsed::<ModelVariant>("AGRIBOUNDARY_MODEL_VARIANT", "vit_b, vit_l or vit_h")
        {
            self.model_variant.update(variant, ConfigSource::Environment);
        }
        if let Some(device) = env_parsed::<Device>("AGRIBOUNDARY_DEVICE", "auto, cpu or cuda") {
            self.device.update(device, ConfigSource::Environment);
        }
        if let Ok(command) = env::var("AGRIBOUNDARY_MODEL_COMMAND") {
            self.model_command.update(command, ConfigSource::Environment);
        }
        if let Ok(url) = env::var("AGRIBOUNDARY_CATALOG_URL") {
            self.catalog_url.update(Some(url), ConfigSource::Environment);
        }
        if let Some(timeout) = env_parsed::<u64>("AGRIBOUNDARY_REQUEST_TIMEOUT", "seconds") {
            self.request_timeout.update(timeout, ConfigSource::Environment);
        }
        if let Ok(collection) = env::var("AGRIBOUNDARY_COLLECTION") {
            self.collection.update(collection, ConfigSource::Environment);
        }
        if let Some(scale) = env_parsed::<f64>("AGRIBOUNDARY_SCALE", "metres") {
            self.scale.update(scale, ConfigSource::Environment);
        }
        if let Ok(dir) = env::var("AGRIBOUNDARY_SCRATCH_DIR") {
            self.scratch_dir.update(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(path) = env::var("AGRIBOUNDARY_CREDENTIALS") {
            self.credentials.update(Some(PathBuf::from(path)), ConfigSource::Environment);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(start) = overrides.start_date {
            self.start_date.update(start, ConfigSource::Cli);
        }
        if let Some(end) = overrides.end_date {
            self.end_date.update(end, ConfigSource::Cli);
        }
        if let Some(cloud) = overrides.cloud_max {
            self.cloud_max.update(cloud, ConfigSource::Cli);
        }
        if let Some(spacing) = overrides.seed_spacing {
            self.seed_spacing.update(spacing, ConfigSource::Cli);
        }
        if let Some(compactness) = overrides.compactness {
            self.compactness.update(compactness, ConfigSource::Cli);
        }
        if let Some(backend) = overrides.backend {
            self.backend.update(backend, ConfigSource::Cli);
        }
        if let Some(variant) = overrides.model_variant {
            self.model_variant.update(variant, ConfigSource::Cli);
        }
        if let Some(device) = overrides.device {
            self.device.update(device, ConfigSource::Cli);
        }
        if let Some(url) = overrides.catalog_url {
            self.catalog_url.update(Some(url), ConfigSource::Cli);
        }
        if let Some(timeout) = overrides.request_timeout {
            self.request_timeout.update(timeout, ConfigSource::Cli);
        }
        if let Some(credentials) = overrides.credentials {
            self.credentials.update(Some(credentials), ConfigSource::Cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "start_date".to_string(),
            (self.start_date.value.to_string(), self.start_date.source),
        );
        map.insert("end_date".to_string(), (self.end_date.value.to_string(), self.end_date.source));
        map.insert(
            "cloud_max".to_string(),
            (format!("{}%", self.cloud_max.value), self.cloud_max.source),
        );
        map.insert(
            "seed_spacing".to_string(),
            (format!("{} px", self.seed_spacing.value), self.seed_spacing.source),
        );
        map.insert(
            "compactness".to_string(),
            (self.compactness.value.to_string(), self.compactness.source),
        );
        map.insert("backend".to_string(), (self.backend.value.to_string(), self.backend.source));
        map.insert(
            "model_variant".to_string(),
            (self.model_variant.value.to_string(), self.model_variant.source),
        );
        map.insert("device".to_string(), (self.device.value.to_string(), self.device.source));
        map.insert(
            "model_command".to_string(),
            (self.model_command.value.clone(), self.model_command.source),
        );
        map.insert(
            "catalog_url".to_string(),
            (
                self.catalog_url.value.clone().unwrap_or_else(|| "(none)".to_string()),
                self.catalog_url.source,
            ),
        );
        map.insert(
            "request_timeout".to_string(),
            (format!("{} s", self.request_timeout.value), self.request_timeout.source),
        );
        map.insert(
            "collection".to_string(),
            (self.collection.value.clone(), self.collection.source),
        );
        map.insert("scale".to_string(), (format!("{} m", self.scale.value), self.scale.source));
        map.insert(
            "scratch_dir".to_string(),
            (self.scratch_dir.value.display().to_string(), self.scratch_dir.source),
        );
        map.insert(
            "credentials".to_string(),
            (
                self.credentials
                    .value
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(none)".to_string()),
                self.credentials.source,
            ),
        );

        map
    }
}

fn default_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn env_parsed<T: std::str::FromStr>(key: &str, expected: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': expected {}", key, raw, expected);
            None
        }
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    cloud_max: Option<f64>,
    seed_spacing: Option<u32>,
    compactness: Option<f64>,
    backend: Option<String>,
    model_variant: Option<String>,
    device: Option<String>,
    model_command: Option<String>,
    catalog_url: Option<String>,
    request_timeout: Option<u64>,
    collection: Option<String>,
    scale: Option<f64>,
    scratch_dir: Option<PathBuf>,
    credentials: Option<PathBuf>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub cloud_max: Option<f64>,
    pub seed_spacing: Option<u32>,
    pub compactness: Option<f64>,
    pub backend: Option<SegmentationBackend>,
    pub model_variant: Option<ModelVariant>,
    pub device: Option<Device>,
    pub catalog_url: Option<String>,
    pub request_timeout: Option<u64>,
    pub credentials: Option<PathBuf>,
}
