//! AgriBoundary Segment - Segmentation backends
//!
//! Two interchangeable [`Segmenter`](agriboundary_core::ports::Segmenter)
//! implementations: in-process SNIC superpixel clustering and an external
//! pretrained mask-generation model driven through a rendered visual tile.

pub mod model;
pub mod snic;
pub mod tile;

pub use model::ModelSegmenter;
pub use snic::SnicSegmenter;
