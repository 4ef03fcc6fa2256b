//! Linear boundary detection run
//!
//! ingest -> composite -> segment -> vectorize -> reproject, one stage after
//! the other. Any stage failure ends the run with that stage's error; the
//! run's scratch directory is removed either way.

use std::path::PathBuf;

use agriboundary_core::error::{BoundaryError, Result, Stage};
use agriboundary_core::formats::FormatRegistry;
use agriboundary_core::models::{
    AreaOfInterest, BoundarySet, Composite, Crs, ImageryRequest, SegmentationOutput,
    SegmentationParameters, DEFAULT_COLLECTION, NATIVE_SCALE_M,
};
use agriboundary_core::ports::{ImageryCatalog, Segmenter};
use agriboundary_geo::transform::reproject_boundaries;
use agriboundary_geo::vectorize::vectorize;
use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::RunContext;
use crate::ingest::ingest_upload;

/// Everything one run needs from the user
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Name the file was uploaded under; its extension selects the reader
    pub file_name: String,
    pub upload: Vec<u8>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cloud_max_pct: f64,
    pub collection: String,
    pub scale_m: f64,
    pub params: SegmentationParameters,
}

impl PipelineRequest {
    pub fn new(
        file_name: impl Into<String>,
        upload: Vec<u8>,
        start: NaiveDate,
        end: NaiveDate,
        cloud_max_pct: f64,
        params: SegmentationParameters,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            upload,
            start,
            end,
            cloud_max_pct,
            collection: DEFAULT_COLLECTION.to_string(),
            scale_m: NATIVE_SCALE_M,
            params,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_scale(mut self, scale_m: f64) -> Self {
        self.scale_m = scale_m;
        self
    }
}

/// Result of a completed run; boundaries are in WGS 84
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub aoi: AreaOfInterest,
    pub composite: Composite,
    pub boundaries: BoundarySet,
}

/// The pipeline with its two swappable collaborators
pub struct BoundaryPipeline {
    catalog: Box<dyn ImageryCatalog>,
    segmenter: Box<dyn Segmenter>,
    registry: FormatRegistry,
    scratch_root: PathBuf,
}

impl BoundaryPipeline {
    pub fn new(
        catalog: Box<dyn ImageryCatalog>,
        segmenter: Box<dyn Segmenter>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self::with_registry(catalog, segmenter, FormatRegistry::with_defaults(), scratch_root)
    }

    pub fn with_registry(
        catalog: Box<dyn ImageryCatalog>,
        segmenter: Box<dyn Segmenter>,
        registry: FormatRegistry,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            segmenter,
            registry,
            scratch_root: scratch_root.into(),
        }
    }

    pub fn catalog_name(&self) -> &str {
        self.catalog.name()
    }

    pub fn segmenter_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Execute every stage for one upload.
    ///
    /// Date and cloud parameters are checked before anything is written or sent.
    pub async fn run(&self, request: &PipelineRequest) -> Result<RunOutcome> {
        ImageryRequest::check_filters(request.start, request.end, request.cloud_max_pct)?;

        let ctx = RunContext::create(&self.scratch_root)?;
        let result = self.run_stages(&ctx, request).await;

        let run_id = ctx.id();
        if let Err(e) = ctx.close() {
            warn!(run_id = %run_id, error = %e, "Scratch cleanup failed");
        }

        match &result {
            Ok(outcome) => info!(run_id = %run_id, polygons = outcome.boundaries.len(), "Run finished"),
            Err(e) => warn!(run_id = %run_id, stage = %e.stage(), error = %e, "Run failed"),
        }
        result
    }

    async fn run_stages(&self, ctx: &RunContext, request: &PipelineRequest) -> Result<RunOutcome> {
        info!(run_id = %ctx.id(), stage = %Stage::Ingestion, file = %request.file_name, "Starting stage");
        let aoi = ingest_upload(ctx, &request.file_name, &request.upload, &self.registry).await?;
        info!(
            parts = aoi.part_count(),
            area_ha = aoi.area_m2() / 10_000.0,
            "Area of interest ready"
        );

        let imagery = ImageryRequest::new(aoi.clone(), request.start, request.end, request.cloud_max_pct)?
            .with_collection(request.collection.clone())
            .with_scale(request.scale_m);
        info!(
            stage = %Stage::Acquisition,
            catalog = self.catalog.name(),
            filters = %imagery.filter_summary(),
            "Starting stage"
        );
        let composite = self.catalog.composite(&imagery).await?;
        if composite.is_empty() {
            return Err(BoundaryError::ImageryUnavailable { filters: imagery.filter_summary() });
        }
        info!(
            scenes = composite.scene_count,
            width = composite.grid.width,
            height = composite.grid.height,
            valid_pixels = composite.valid_pixel_count(),
            "Composite ready"
        );

        info!(stage = %Stage::Segmentation, backend = self.segmenter.name(), "Starting stage");
        let output = self.segmenter.segment(&composite, &request.params, ctx.path()).await?;

        let boundaries = match output {
            SegmentationOutput::Labels(labels) => {
                info!(
                    stage = %Stage::Vectorization,
                    clusters = labels.unique_labels().len(),
                    "Starting stage"
                );
                vectorize(&labels)
            }
            SegmentationOutput::Boundaries(set) => set,
        };
        let boundaries = reproject_boundaries(&boundaries, &Crs::wgs84())?;
        info!(polygons = boundaries.len(), "Boundaries ready");

        Ok(RunOutcome {
            run_id: ctx.id(),
            aoi,
            composite,
            boundaries,
        })
    }
}
