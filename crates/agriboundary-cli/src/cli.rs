use agriboundary_core::models::{Device, ModelVariant, SegmentationBackend};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AgriBoundary - candidate field boundaries from Sentinel-2 composites
#[derive(Parser, Debug)]
#[command(name = "agriboundary")]
#[command(about = "Detect agricultural field boundaries inside an area of interest", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./agriboundary.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full detection pipeline for an area of interest
    Detect(DetectArgs),

    /// Read an area of interest and report its extent
    Aoi(AoiArgs),

    /// Show the effective configuration and where each value came from
    Config,
}

#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Area of interest file (KML or GeoJSON)
    pub aoi: PathBuf,

    /// First acquisition date to include (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last acquisition date to include (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Keep scenes whose cloudy pixel percentage is below this value
    #[arg(long, value_name = "PERCENT")]
    pub cloud_max: Option<f64>,

    /// Superpixel seed spacing in pixels
    #[arg(long, value_name = "PIXELS")]
    pub seed_spacing: Option<u32>,

    /// Weight of spatial distance against spectral distance
    #[arg(long)]
    pub compactness: Option<f64>,

    /// Segmentation backend (snic or model)
    #[arg(long)]
    pub backend: Option<SegmentationBackend>,

    /// Pretrained model variant (vit_b, vit_l, vit_h)
    #[arg(long)]
    pub model_variant: Option<ModelVariant>,

    /// Inference device (auto, cpu, cuda)
    #[arg(long)]
    pub device: Option<Device>,

    /// Remote compute service base URL
    #[arg(long, value_name = "URL", conflicts_with = "scenes")]
    pub catalog: Option<String>,

    /// Local scene manifest to composite from instead of the compute service
    #[arg(long, value_name = "FILE")]
    pub scenes: Option<PathBuf>,

    /// Service credential file (JSON key file or TOML secrets)
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Seconds to wait on the compute service before giving up
    #[arg(long, value_name = "SECONDS")]
    pub request_timeout: Option<u64>,

    /// Boundary export path; .kml or .geojson (defaults to detected_boundaries.kml)
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write an interactive HTML map
    #[arg(long, value_name = "FILE")]
    pub map: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct AoiArgs {
    /// Area of interest file (KML or GeoJSON)
    pub path: PathBuf,
}
