//! Aoi command implementation

use crate::cli::AoiArgs;
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use crate::output_types::AoiOutput;
use agriboundary_core::formats::FormatRegistry;
use agriboundary_pipeline::{ingest_path, RunContext};
use anyhow::Result;
use std::path::Path;

pub async fn execute(args: AoiArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let config = load_config(config_path)?;
    let ctx = RunContext::create(&config.scratch_dir.value)?;
    let result = ingest_path(&ctx, &args.path, &FormatRegistry::with_defaults()).await;
    ctx.close()?;
    let aoi = result?;

    let summary = AoiOutput {
        source: aoi.source_name.clone(),
        feature_count: aoi.feature_count,
        part_count: aoi.part_count(),
        vertex_count: aoi.vertex_count(),
        area_ha: aoi.area_m2() / 10_000.0,
        bbox: aoi
            .bounding_rect()
            .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y]),
        centroid: aoi.centroid().map(|c| [c.x, c.y]),
    };

    output.result(summary, |s| {
        output.section("Area of Interest");
        output.kv("Source", &s.source);
        output.kv("Features", s.feature_count);
        output.kv("Parts", s.part_count);
        output.kv("Vertices", s.vertex_count);
        output.kv("Area", format!("{:.2} ha", s.area_ha));
        if let Some([min_x, min_y, max_x, max_y]) = s.bbox {
            output.kv("Bounds", format!("{:.6}, {:.6} to {:.6}, {:.6}", min_x, min_y, max_x, max_y));
        }
        if let Some([x, y]) = s.centroid {
            output.kv("Centre", format!("{:.6}, {:.6}", x, y));
        }
    })
}
