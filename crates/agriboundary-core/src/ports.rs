//! Port trait definitions
//!
//! The imagery catalog and the segmentation backends are black boxes to the pipeline;
//! these traits are the only surface it sees, so either side can be swapped without
//! touching orchestration.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::models::{Composite, ImageryRequest, SegmentationOutput, SegmentationParameters};

/// Port for building a cloud-masked median composite
#[async_trait]
pub trait ImageryCatalog: Send + Sync {
    /// Filter the catalog by area, date window and cloud cover, mask clouds and reduce
    /// the remaining scenes to one composite clipped to the area.
    ///
    /// # Errors
    /// `ImageryUnavailable` when no scene passes the filters, `Service` when the
    /// backend call itself fails.
    async fn composite(&self, request: &ImageryRequest) -> Result<Composite>;

    /// Human-readable backend name for logs and errors
    fn name(&self) -> &str;
}

/// Port for turning a composite into regions
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Segment the composite.
    ///
    /// # Arguments
    /// * `composite` - Input imagery, never mutated
    /// * `params` - Parameters for this backend
    /// * `scratch` - Run-scoped directory for any files the backend materializes
    async fn segment(
        &self,
        composite: &Composite,
        params: &SegmentationParameters,
        scratch: &Path,
    ) -> Result<SegmentationOutput>;

    fn name(&self) -> &str;
}
