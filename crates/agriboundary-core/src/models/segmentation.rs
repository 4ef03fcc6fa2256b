//! Segmentation parameters and backend outputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{BoundaryError, Result};
use crate::models::boundary::BoundarySet;
use crate::models::imagery::GridSpec;

/// Pixel neighbourhood used when growing or tracing regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

impl Connectivity {
    /// Column/row offsets of the neighbours
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
        const EIGHT: [(isize, isize); 8] =
            [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Size variant of the pretrained segmentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelVariant {
    #[default]
    VitB,
    VitL,
    VitH,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::VitB => "vit_b",
            ModelVariant::VitL => "vit_l",
            ModelVariant::VitH => "vit_h",
        }
    }

    /// Next smaller variant, if any
    pub fn smaller(&self) -> Option<ModelVariant> {
        match self {
            ModelVariant::VitH => Some(ModelVariant::VitL),
            ModelVariant::VitL => Some(ModelVariant::VitB),
            ModelVariant::VitB => None,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = BoundaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "vit_b" | "b" | "base" => Ok(ModelVariant::VitB),
            "vit_l" | "l" | "large" => Ok(ModelVariant::VitL),
            "vit_h" | "h" | "huge" => Ok(ModelVariant::VitH),
            _ => Err(BoundaryError::ConfigInvalid {
                key: "model_variant".to_string(),
                reason: format!("Invalid model variant: {}. Use vit_b, vit_l or vit_h", s),
            }),
        }
    }
}

/// Compute device for the model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Device {
    /// GPU when one is visible, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = BoundaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            _ => Err(BoundaryError::ConfigInvalid {
                key: "device".to_string(),
                reason: format!("Invalid device: {}. Use auto, cpu or cuda", s),
            }),
        }
    }
}

/// How the model produces masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MaskMode {
    /// Prompt-free whole-image mask generation
    #[default]
    Automatic,
}

impl MaskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskMode::Automatic => "automatic",
        }
    }
}

/// Which segmentation strategy is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SegmentationBackend {
    /// Superpixel clustering on the composite
    #[default]
    Clustering,
    /// External pretrained model on a materialized tile
    Model,
}

impl fmt::Display for SegmentationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentationBackend::Clustering => f.write_str("snic"),
            SegmentationBackend::Model => f.write_str("model"),
        }
    }
}

impl FromStr for SegmentationBackend {
    type Err = BoundaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snic" | "clustering" => Ok(SegmentationBackend::Clustering),
            "model" | "sam" => Ok(SegmentationBackend::Model),
            _ => Err(BoundaryError::ConfigInvalid {
                key: "backend".to_string(),
                reason: format!("Invalid backend: {}. Use snic or model", s),
            }),
        }
    }
}

/// Parameters for exactly one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SegmentationParameters {
    Clustering {
        /// Seed grid spacing in pixels
        seed_spacing: u32,
        /// 0 weighs only spectral similarity; larger values favour regular shapes
        compactness: f64,
        connectivity: Connectivity,
        /// Search radius in pixels around a cluster centroid
        neighborhood_size: u32,
    },
    Model {
        variant: ModelVariant,
        device: Device,
        mode: MaskMode,
    },
}

impl SegmentationParameters {
    /// Clustering parameters with 8-connectivity and a neighbourhood of twice the spacing
    pub fn clustering(seed_spacing: u32, compactness: f64) -> Result<Self> {
        if seed_spacing == 0 {
            return Err(BoundaryError::invalid("seed spacing", "must be at least 1 pixel"));
        }
        if !compactness.is_finite() || compactness < 0.0 {
            return Err(BoundaryError::invalid(
                "compactness",
                format!("{} must be a non-negative number", compactness),
            ));
        }

        Ok(SegmentationParameters::Clustering {
            seed_spacing,
            compactness,
            connectivity: Connectivity::Eight,
            neighborhood_size: seed_spacing.saturating_mul(2),
        })
    }

    pub fn model(variant: ModelVariant, device: Device) -> Self {
        SegmentationParameters::Model {
            variant,
            device,
            mode: MaskMode::Automatic,
        }
    }

    pub fn backend(&self) -> SegmentationBackend {
        match self {
            SegmentationParameters::Clustering { .. } => SegmentationBackend::Clustering,
            SegmentationParameters::Model { .. } => SegmentationBackend::Model,
        }
    }
}

/// Label value for pixels that belong to no region
pub const NO_LABEL: u32 = 0;

/// Per-pixel region labels on a grid
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRaster {
    pub grid: GridSpec,
    pub labels: Vec<u32>,
}

impl LabelRaster {
    pub fn new(grid: GridSpec, labels: Vec<u32>) -> Result<Self> {
        if labels.len() != grid.len() {
            return Err(BoundaryError::SegmentationFailure {
                reason: format!(
                    "label raster has {} pixels but the grid is {}x{}",
                    labels.len(),
                    grid.width,
                    grid.height
                ),
                remediation: "Check that the backend writes masks at the tile resolution"
                    .to_string(),
            });
        }
        Ok(Self { grid, labels })
    }

    pub fn get(&self, col: usize, row: usize) -> u32 {
        self.labels[self.grid.index(col, row)]
    }

    /// Distinct labels, excluding [`NO_LABEL`]
    pub fn unique_labels(&self) -> BTreeSet<u32> {
        self.labels.iter().copied().filter(|&l| l != NO_LABEL).collect()
    }
}

/// What a backend hands back
#[derive(Debug, Clone)]
pub enum SegmentationOutput {
    Labels(LabelRaster),
    Boundaries(BoundarySet),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geometry::Crs;
    use crate::models::imagery::GeoTransform;

    #[test]
    fn test_clustering_defaults() {
        let params = SegmentationParameters::clustering(30, 0.5).unwrap();
        match params {
            SegmentationParameters::Clustering { connectivity, neighborhood_size, .. } => {
                assert_eq!(connectivity, Connectivity::Eight);
                assert_eq!(neighborhood_size, 60);
            }
            _ => panic!("Expected clustering parameters"),
        }
        assert_eq!(params.backend(), SegmentationBackend::Clustering);
    }

    #[test]
    fn test_clustering_rejects_bad_values() {
        assert!(SegmentationParameters::clustering(0, 0.5).is_err());
        assert!(SegmentationParameters::clustering(10, -0.1).is_err());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("vit-h".parse::<ModelVariant>().unwrap(), ModelVariant::VitH);
        assert_eq!("GPU".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!("sam".parse::<SegmentationBackend>().unwrap(), SegmentationBackend::Model);
        assert!("tiny".parse::<ModelVariant>().is_err());
        assert_eq!(ModelVariant::VitH.smaller(), Some(ModelVariant::VitL));
        assert_eq!(ModelVariant::VitB.smaller(), None);
    }

    #[test]
    fn test_parameters_serialize_tagged() {
        let params = SegmentationParameters::model(ModelVariant::VitL, Device::Cpu);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["backend"], "model");
        assert_eq!(json["variant"], "VitL");
    }

    #[test]
    fn test_label_raster_size_checked() {
        let grid = GridSpec::new(
            2,
            2,
            GeoTransform { origin_x: 0.0, origin_y: 2.0, pixel_size: 1.0 },
            Crs::wgs84(),
        );
        assert!(LabelRaster::new(grid.clone(), vec![1, 2, 3]).is_err());
        let raster = LabelRaster::new(grid, vec![0, 2, 2, 5]).unwrap();
        assert_eq!(raster.get(1, 1), 5);
        assert_eq!(raster.unique_labels().into_iter().collect::<Vec<_>>(), vec![2, 5]);
    }
}
