//! AgriBoundary Pipeline - Linear boundary detection runs
//!
//! Ties the stages together: upload ingestion into a run-scoped scratch
//! directory, composite acquisition, segmentation, vectorization, and the
//! export and map outputs built from a finished run.

pub mod context;
pub mod export;
pub mod ingest;
pub mod map;
pub mod run;

pub use context::RunContext;
pub use export::{download_name, export, import_boundaries, write_export, ExportFormat};
pub use ingest::{ingest_path, ingest_upload, ACCEPTED_EXTENSIONS};
pub use map::{MapView, RasterStyle, VectorStyle};
pub use run::{BoundaryPipeline, PipelineRequest, RunOutcome};
