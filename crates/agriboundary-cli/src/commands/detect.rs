//! Detect command implementation

use crate::cli::DetectArgs;
use crate::config_loader::load_config_with_overrides;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::{DetectOutput, SummaryRow};
use crate::progress::{create_spinner, finish_error, finish_success};
use agriboundary_core::auth::{Credentials, Session};
use agriboundary_core::config::{CliConfigOverrides, LayeredConfig};
use agriboundary_core::models::{SegmentationBackend, SegmentationParameters};
use agriboundary_core::ports::{ImageryCatalog, Segmenter};
use agriboundary_imagery::{HttpCatalog, SceneCatalog};
use agriboundary_pipeline::{
    download_name, write_export, BoundaryPipeline, ExportFormat, MapView, PipelineRequest,
    RasterStyle, VectorStyle,
};
use agriboundary_segment::{ModelSegmenter, SnicSegmenter};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub async fn execute(args: DetectArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let overrides = CliConfigOverrides {
        start_date: args.start,
        end_date: args.end,
        cloud_max: args.cloud_max,
        seed_spacing: args.seed_spacing,
        compactness: args.compactness,
        backend: args.backend,
        model_variant: args.model_variant,
        device: args.device,
        catalog_url: args.catalog.clone(),
        credentials: args.credentials.clone(),
        request_timeout: args.request_timeout,
    };
    let config = load_config_with_overrides(config_path, overrides)?;

    // Session first: nothing is ingested without it
    let (catalog, session) = build_catalog(&args, &config).await?;
    let result = detect(&args, &config, catalog, output).await;
    if let Some(session) = session {
        session.teardown();
    }
    result
}

async fn detect(
    args: &DetectArgs,
    config: &LayeredConfig,
    catalog: Box<dyn ImageryCatalog>,
    output: &OutputWriter,
) -> Result<()> {
    let segmenter = build_segmenter(config)?;
    let params = segmentation_params(config)?;

    let upload = tokio::fs::read(&args.aoi)
        .await
        .with_context(|| format!("Failed to read area of interest {}", args.aoi.display()))?;
    let file_name = args
        .aoi
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| args.aoi.display().to_string());

    let request = PipelineRequest::new(
        file_name,
        upload,
        config.start_date.value,
        config.end_date.value,
        config.cloud_max.value,
        params,
    )
    .with_collection(config.collection.value.clone())
    .with_scale(config.scale.value);

    let pipeline = BoundaryPipeline::new(catalog, segmenter, config.scratch_dir.value.clone());
    let backend = pipeline.segmenter_name().to_string();

    let spinner = create_spinner(
        &format!("Detecting boundaries ({} via {})", backend, pipeline.catalog_name()),
        output.is_json(),
    );
    let outcome = match pipeline.run(&request).await {
        Ok(outcome) => {
            finish_success(&spinner, &format!("Found {} boundaries", outcome.boundaries.len()));
            outcome
        }
        Err(e) => {
            finish_error(&spinner, &format!("Failed during {}", e.stage()));
            return Err(e.into());
        }
    };

    if outcome.boundaries.is_empty() {
        output.warning("Segmentation produced no polygons inside the area of interest");
    }

    let export_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(download_name(ExportFormat::Kml)));
    write_export(&outcome.boundaries, &export_path).await?;

    if let Some(map_path) = &args.map {
        let mut map = MapView::for_area(&outcome.aoi)?;
        map.add_composite(&outcome.composite, &RasterStyle::default())?;
        map.add_boundaries(&outcome.boundaries, &VectorStyle::default())?;
        map.write_html(map_path).await?;
    }

    let summary = DetectOutput {
        run_id: outcome.run_id.to_string(),
        source: outcome.aoi.source_name.clone(),
        area_ha: outcome.aoi.area_m2() / 10_000.0,
        scene_count: outcome.composite.scene_count,
        composite_size: [outcome.composite.grid.width, outcome.composite.grid.height],
        backend,
        polygon_count: outcome.boundaries.len(),
        export_path: export_path.display().to_string(),
        map_path: args.map.as_ref().map(|p| p.display().to_string()),
    };

    output.result(summary, |s| {
        output.section("Boundary Detection");
        output.table(vec![
            SummaryRow::new("Area of interest", format!("{} ({:.2} ha)", s.source, s.area_ha)),
            SummaryRow::new(
                "Imagery",
                format!(
                    "{} scenes, {}x{} px composite",
                    s.scene_count, s.composite_size[0], s.composite_size[1]
                ),
            ),
            SummaryRow::new("Segmentation", s.backend.clone()),
            SummaryRow::new("Boundaries", s.polygon_count.to_string()),
        ]);
        output.success(format!("Boundaries written to {}", s.export_path));
        if let Some(map) = &s.map_path {
            output.info(format!("Map written to {}", map));
        }
    })
}

/// Local manifest, or the compute service behind an authenticated session.
/// The session handle is returned so the caller can tear it down after the run.
async fn build_catalog(
    args: &DetectArgs,
    config: &LayeredConfig,
) -> Result<(Box<dyn ImageryCatalog>, Option<Session>)> {
    if let Some(manifest) = &args.scenes {
        let catalog = SceneCatalog::from_manifest(manifest).await?;
        return Ok((Box::new(catalog), None));
    }

    let url = config.catalog_url.value.clone().ok_or_else(errors::no_catalog)?;
    let credentials = match &config.credentials.value {
        Some(path) => Credentials::from_file(path)?,
        None => Credentials::from_env().ok_or_else(errors::missing_credentials)?,
    };
    let session = Session::initialize(&credentials)?;
    let timeout = Duration::from_secs(config.request_timeout.value);
    let catalog = HttpCatalog::new(url, session.clone(), timeout)?;
    Ok((Box::new(catalog), Some(session)))
}

fn build_segmenter(config: &LayeredConfig) -> Result<Box<dyn Segmenter>> {
    match config.backend.value {
        SegmentationBackend::Clustering => Ok(Box::new(SnicSegmenter::new())),
        SegmentationBackend::Model => Ok(Box::new(ModelSegmenter::from_command(
            &config.model_command.value,
        )?)),
    }
}

fn segmentation_params(config: &LayeredConfig) -> Result<SegmentationParameters> {
    let params = match config.backend.value {
        SegmentationBackend::Clustering => {
            SegmentationParameters::clustering(config.seed_spacing.value, config.compactness.value)?
        }
        SegmentationBackend::Model => {
            SegmentationParameters::model(config.model_variant.value, config.device.value)
        }
    };
    Ok(params)
}
