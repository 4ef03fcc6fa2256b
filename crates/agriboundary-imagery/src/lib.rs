//! AgriBoundary Imagery - Cloud-masked median composites
//!
//! Scene filtering, QA-band cloud and cirrus masking, per-pixel median
//! compositing, and the catalogs that serve composites to the pipeline.

pub mod catalog;
pub mod composite;

pub use catalog::{HttpCatalog, SceneCatalog};
pub use composite::{filter_scenes, median_composite, qa_clear, Scene};
