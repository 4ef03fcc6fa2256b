use serde::Serialize;
use tabled::Tabled;

/// Output for the detect command
#[derive(Debug, Serialize)]
pub struct DetectOutput {
    pub run_id: String,
    pub source: String,
    pub area_ha: f64,
    pub scene_count: usize,
    pub composite_size: [usize; 2],
    pub backend: String,
    pub polygon_count: usize,
    pub export_path: String,
    pub map_path: Option<String>,
}

/// Output for the aoi command
#[derive(Debug, Serialize)]
pub struct AoiOutput {
    pub source: String,
    pub feature_count: usize,
    pub part_count: usize,
    pub vertex_count: usize,
    pub area_ha: f64,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bbox: Option<[f64; 4]>,
    pub centroid: Option<[f64; 2]>,
}

/// One configuration value with its origin
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigEntry {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

/// Row of the detect summary table
#[derive(Debug, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Step")]
    pub step: String,
    #[tabled(rename = "Result")]
    pub result: String,
}

impl SummaryRow {
    pub fn new(step: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            result: result.into(),
        }
    }
}
