//! Domain models for AgriBoundary

pub mod boundary;
pub mod geometry;
pub mod imagery;
pub mod segmentation;

pub use boundary::{BoundaryPolygon, BoundarySet};
pub use geometry::{AreaOfInterest, Crs};
pub use imagery::{
    BandLayer, Composite, GeoTransform, GridSpec, ImageryRequest, DEFAULT_COLLECTION,
    NATIVE_SCALE_M, SEGMENTATION_BANDS, VISUAL_BANDS,
};
pub use segmentation::{
    Connectivity, Device, LabelRaster, MaskMode, ModelVariant, SegmentationBackend,
    SegmentationOutput, SegmentationParameters, NO_LABEL,
};
