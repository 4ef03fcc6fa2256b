//! Vector format readers for uploaded boundaries and re-imported exports
//!
//! Each format implements the `FormatReader` trait, and the `FormatRegistry` manages
//! format detection and dispatching to appropriate readers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{BoundaryError, Result};

pub mod geojson;
pub mod kml;
pub mod validation;

/// Format reader trait that all format implementations must implement
#[async_trait]
pub trait FormatReader: Send + Sync {
    /// Read every feature of the file at `path`
    async fn read(&self, path: &Path) -> Result<FormatDataset>;

    /// Get supported file extensions (e.g., ["kml"])
    fn supported_extensions(&self) -> &[&str];

    /// Get human-readable format name (e.g., "KML", "GeoJSON")
    fn format_name(&self) -> &str;

    /// Validate file structure without full read
    async fn validate(&self, _path: &Path) -> Result<FormatValidation> {
        Ok(FormatValidation::default())
    }
}

/// Result of format validation
#[derive(Debug, Clone, Default)]
pub struct FormatValidation {
    /// Validation errors that prevent reading
    pub errors: Vec<String>,

    /// Warnings that don't prevent reading but indicate potential issues
    pub warnings: Vec<String>,
}

impl FormatValidation {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Features read from one file
#[derive(Debug, Clone)]
pub struct FormatDataset {
    /// Dataset name (file stem)
    pub name: String,

    /// Format name (e.g., "KML")
    pub format_name: String,

    /// CRS EPSG code of the coordinates
    pub crs: u32,

    pub features: Vec<FormatFeature>,
}

/// Feature extracted from a format
#[derive(Debug, Clone)]
pub struct FormatFeature {
    /// Feature identifier
    pub id: String,

    /// Geometry as a GeoJSON value; None for placemarks without geometry
    pub geometry: Option<serde_json::Value>,

    /// Feature properties
    pub properties: HashMap<String, serde_json::Value>,
}

/// Central registry for format readers
pub struct FormatRegistry {
    readers: Vec<Box<dyn FormatReader>>,
}

impl FormatRegistry {
    /// Create a new empty format registry
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with every built-in reader
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(kml::KmlReader));
        registry.register(Box::new(geojson::GeoJsonReader));
        registry
    }

    /// Register a format reader
    pub fn register(&mut self, reader: Box<dyn FormatReader>) {
        self.readers.push(reader);
    }

    /// Detect format and return appropriate reader
    pub fn detect_format(&self, path: &Path) -> Result<&dyn FormatReader> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| BoundaryError::UnsupportedFormat {
                extension: "none".to_string(),
                supported: self.supported_formats(),
            })?;

        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
            .ok_or_else(|| BoundaryError::UnsupportedFormat {
                extension,
                supported: self.supported_formats(),
            })
    }

    /// Validate then read `path` with the matching reader
    pub async fn read(&self, path: &Path) -> Result<FormatDataset> {
        let reader = self.detect_format(path)?;
        let validation = reader.validate(path).await?;
        for warning in &validation.warnings {
            tracing::warn!(format = reader.format_name(), "{}", warning);
        }
        validation::FormatValidator::validation_to_result(&validation, path)?;
        reader.read(path).await
    }

    /// Get list of all supported format extensions
    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }

    /// Get all registered readers
    pub fn readers(&self) -> &[Box<dyn FormatReader>] {
        &self.readers
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockReader {
        extensions: Vec<&'static str>,
        name: &'static str,
    }

    #[async_trait]
    impl FormatReader for MockReader {
        async fn read(&self, _path: &Path) -> Result<FormatDataset> {
            Ok(FormatDataset {
                name: "test".to_string(),
                format_name: self.name.to_string(),
                crs: 4326,
                features: vec![],
            })
        }

        fn supported_extensions(&self) -> &[&str] {
            &self.extensions
        }

        fn format_name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_format_registry_creation() {
        let registry = FormatRegistry::new();
        assert_eq!(registry.readers().len(), 0);
    }

    #[test]
    fn test_default_registry_formats() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(registry.supported_formats(), vec!["kml", "json", "geojson"]);
    }

    #[test]
    fn test_format_detection() {
        let mut registry = FormatRegistry::new();
        registry.register(Box::new(MockReader {
            extensions: vec!["json", "geojson"],
            name: "GeoJSON",
        }));
        registry.register(Box::new(MockReader { extensions: vec!["kml"], name: "KML" }));

        let reader = registry.detect_format(Path::new("aoi.geojson")).unwrap();
        assert_eq!(reader.format_name(), "GeoJSON");

        let reader = registry.detect_format(Path::new("farm.KML")).unwrap();
        assert_eq!(reader.format_name(), "KML");
    }

    #[test]
    fn test_unsupported_format() {
        let registry = FormatRegistry::with_defaults();
        let result = registry.detect_format(Path::new("fields.shp"));
        match result {
            Err(BoundaryError::UnsupportedFormat { extension, supported }) => {
                assert_eq!(extension, "shp");
                assert!(supported.contains(&"kml".to_string()));
            }
            _ => panic!("Expected UnsupportedFormat"),
        }
        assert!(registry.detect_format(Path::new("noext")).is_err());
    }

    #[test]
    fn test_format_validation_with_warnings() {
        let validation = FormatValidation {
            errors: vec![],
            warnings: vec!["No CRS specified".to_string()],
        };
        assert!(validation.is_valid());
        assert!(validation.has_warnings());
    }
}
