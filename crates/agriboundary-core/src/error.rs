//! Error types for AgriBoundary

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Authentication,
    Configuration,
    Ingestion,
    Acquisition,
    Segmentation,
    Vectorization,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Authentication => "authentication",
            Stage::Configuration => "configuration",
            Stage::Ingestion => "geometry ingestion",
            Stage::Acquisition => "imagery acquisition",
            Stage::Segmentation => "segmentation",
            Stage::Vectorization => "vectorization",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BoundaryError {
    // Session errors
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    // Ingestion errors
    #[error("Could not read area of interest from {source_name}: {reason}")]
    GeometryParse { source_name: String, reason: String },

    #[error("Unsupported file format: .{extension}. Supported: {}", .supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    // Request errors
    #[error("Invalid {field}: {reason}")]
    InvalidRequest { field: String, reason: String },

    // Acquisition errors
    #[error("No imagery matched the filters: {filters}")]
    ImageryUnavailable { filters: String },

    // Backend errors
    #[error("{backend} call failed during {stage}: {reason}")]
    Service {
        stage: Stage,
        backend: String,
        reason: String,
    },

    #[error("Segmentation failed: {reason}. Try: {remediation}")]
    SegmentationFailure { reason: String, remediation: String },

    #[error("Reprojection from {from} to {to} failed: {reason}")]
    Reprojection {
        from: String,
        to: String,
        reason: String,
    },

    // Export errors
    #[error("Export to {format} failed: {reason}")]
    Export { format: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BoundaryError {
    /// Stage the failure is reported against
    pub fn stage(&self) -> Stage {
        match self {
            BoundaryError::Authentication { .. } => Stage::Authentication,
            BoundaryError::GeometryParse { .. }
            | BoundaryError::UnsupportedFormat { .. }
            | BoundaryError::FileNotFound { .. } => Stage::Ingestion,
            BoundaryError::InvalidRequest { .. } | BoundaryError::ImageryUnavailable { .. } => {
                Stage::Acquisition
            }
            BoundaryError::Service { stage, .. } => *stage,
            BoundaryError::SegmentationFailure { .. } => Stage::Segmentation,
            BoundaryError::Reprojection { .. } => Stage::Vectorization,
            BoundaryError::Export { .. } => Stage::Export,
            BoundaryError::ConfigInvalid { .. } => Stage::Configuration,
            BoundaryError::Io(_) | BoundaryError::Serialization(_) => Stage::Ingestion,
        }
    }

    /// Authentication failures end the session; everything else is per request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BoundaryError::Authentication { .. })
    }

    /// Corrective suggestion shown next to the error
    pub fn remediation(&self) -> String {
        match self {
            BoundaryError::Authentication { .. } => {
                "Check the service credential file (project id and private key) or supply a \
                 valid access token, then start a new session"
                    .to_string()
            }
            BoundaryError::GeometryParse { .. } => {
                "Upload a KML or GeoJSON file containing at least one valid Polygon".to_string()
            }
            BoundaryError::UnsupportedFormat { supported, .. } => {
                format!("Upload one of: {}", supported.join(", "))
            }
            BoundaryError::InvalidRequest { .. } => {
                "Make sure the start date is not after the end date and the cloud cover \
                 threshold is between 0 and 100"
                    .to_string()
            }
            BoundaryError::ImageryUnavailable { .. } => {
                "Widen the date range or raise the maximum cloud cover".to_string()
            }
            BoundaryError::Service { .. } => {
                "Check network access, quota and credentials for the backend and retry"
                    .to_string()
            }
            BoundaryError::SegmentationFailure { remediation, .. } => remediation.clone(),
            BoundaryError::Reprojection { .. } => {
                "Check that PROJ knows both EPSG codes and that coordinates are inside the \
                 projection's area of use"
                    .to_string()
            }
            BoundaryError::Export { .. } => {
                "Choose a writable output path with a .geojson or .kml extension".to_string()
            }
            BoundaryError::ConfigInvalid { key, .. } => {
                format!("Fix the value of '{}' in agriboundary.toml or the environment", key)
            }
            BoundaryError::FileNotFound { .. } => "Check the file path and try again".to_string(),
            BoundaryError::Io(_) | BoundaryError::Serialization(_) => {
                "Check file permissions and available disk space".to_string()
            }
        }
    }

    pub fn geometry(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        BoundaryError::GeometryParse {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn service(stage: Stage, backend: impl Into<String>, reason: impl Into<String>) -> Self {
        BoundaryError::Service {
            stage,
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BoundaryError::InvalidRequest {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BoundaryError>;
