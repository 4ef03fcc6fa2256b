//! Upload ingestion

use std::path::Path;

use agriboundary_core::error::{BoundaryError, Result};
use agriboundary_core::formats::validation::MAX_UPLOAD_MB;
use agriboundary_core::formats::FormatRegistry;
use agriboundary_core::models::AreaOfInterest;
use agriboundary_geo::aoi::area_from_dataset;
use tracing::info;

use crate::context::RunContext;

/// Extensions an area of interest may be uploaded with
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["kml", "geojson", "json"];

/// Stage an uploaded file in the run directory and reduce it to an area of interest
pub async fn ingest_upload(
    ctx: &RunContext,
    file_name: &str,
    bytes: &[u8],
    registry: &FormatRegistry,
) -> Result<AreaOfInterest> {
    let path = Path::new(file_name);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(BoundaryError::UnsupportedFormat {
            extension: if extension.is_empty() { "none".to_string() } else { extension },
            supported: ACCEPTED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        });
    }

    let limit = MAX_UPLOAD_MB * 1024 * 1024;
    if bytes.len() as u64 > limit {
        return Err(BoundaryError::geometry(
            file_name,
            format!("upload is larger than {} MB", MAX_UPLOAD_MB),
        ));
    }

    let staged = ctx.stage_upload(bytes, &extension)?;
    let mut dataset = registry.read(&staged).await.map_err(|e| rename_source(e, file_name))?;
    dataset.name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());

    info!(
        file = file_name,
        format = %dataset.format_name,
        features = dataset.features.len(),
        "Read upload"
    );
    area_from_dataset(&dataset)
}

/// Read a file from disk and ingest it like an upload
pub async fn ingest_path(ctx: &RunContext, path: &Path, registry: &FormatRegistry) -> Result<AreaOfInterest> {
    if !path.exists() {
        return Err(BoundaryError::FileNotFound { path: path.to_path_buf() });
    }
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    ingest_upload(ctx, &file_name, &bytes, registry).await
}

/// Errors from the staged copy should name the file the user uploaded
fn rename_source(err: BoundaryError, file_name: &str) -> BoundaryError {
    match err {
        BoundaryError::GeometryParse { reason, .. } => BoundaryError::geometry(file_name, reason),
        other => other,
    }
}
