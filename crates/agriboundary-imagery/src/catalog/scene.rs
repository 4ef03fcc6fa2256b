//! Catalog over scenes already resampled onto one grid

use std::path::Path;

use agriboundary_core::error::{BoundaryError, Result, Stage};
use agriboundary_core::models::{Composite, GeoTransform, GridSpec, ImageryRequest, DEFAULT_COLLECTION};
use agriboundary_core::ports::ImageryCatalog;
use agriboundary_geo::transform::Transformer;
use async_trait::async_trait;
use geo::BoundingRect;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::composite::{filter_scenes, median_composite, Scene};

/// JSON manifest describing a local scene stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneManifest {
    #[serde(default = "default_collection")]
    pub collection: String,
    pub grid: GridSpec,
    pub scenes: Vec<Scene>,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

/// Local catalog: filtering and compositing run in-process
#[derive(Debug, Clone)]
pub struct SceneCatalog {
    collection: String,
    grid: GridSpec,
    scenes: Vec<Scene>,
}

impl SceneCatalog {
    pub fn new(collection: impl Into<String>, grid: GridSpec, scenes: Vec<Scene>) -> Self {
        Self { collection: collection.into(), grid, scenes }
    }

    /// Load a catalog from a JSON manifest
    pub async fn from_manifest(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BoundaryError::FileNotFound { path: path.to_path_buf() });
        }
        let content = tokio::fs::read_to_string(path).await?;
        let manifest: SceneManifest = serde_json::from_str(&content).map_err(|e| {
            BoundaryError::service(
                Stage::Acquisition,
                "scene catalog",
                format!("Invalid manifest {}: {}", path.display(), e),
            )
        })?;
        info!(
            scenes = manifest.scenes.len(),
            collection = %manifest.collection,
            "Loaded scene manifest"
        );
        Ok(Self::from(manifest))
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Pixel window of the catalog grid covering `bounds` (grid CRS), clamped to the grid
    fn window(&self, bounds: geo::Rect<f64>) -> Option<(usize, usize, usize, usize)> {
        const SNAP: f64 = 1e-6;
        let t = &self.grid.transform;
        let to_col = |x: f64| (x - t.origin_x) / t.pixel_size;
        let to_row = |y: f64| (t.origin_y - y) / t.pixel_size;

        let col0 = (to_col(bounds.min().x) + SNAP).floor().max(0.0) as usize;
        let row0 = (to_row(bounds.max().y) + SNAP).floor().max(0.0) as usize;
        let col1 = ((to_col(bounds.max().x) - SNAP).ceil().max(0.0) as usize).min(self.grid.width);
        let row1 = ((to_row(bounds.min().y) - SNAP).ceil().max(0.0) as usize).min(self.grid.height);

        (col0 < col1 && row0 < row1).then_some((col0, row0, col1 - col0, row1 - row0))
    }
}

impl From<SceneManifest> for SceneCatalog {
    fn from(manifest: SceneManifest) -> Self {
        Self::new(manifest.collection, manifest.grid, manifest.scenes)
    }
}

#[async_trait]
impl ImageryCatalog for SceneCatalog {
    async fn composite(&self, request: &ImageryRequest) -> Result<Composite> {
        if request.collection != self.collection {
            warn!(
                requested = %request.collection,
                available = %self.collection,
                "Requested collection is not in this catalog"
            );
            return Err(BoundaryError::ImageryUnavailable { filters: request.filter_summary() });
        }

        let (pixel_size, scale) = (self.grid.transform.pixel_size, request.scale_m);
        if (pixel_size - scale).abs() > f64::EPSILON {
            warn!(pixel_size, scale, "Catalog grid resolution differs from the requested scale");
        }

        let transformer = Transformer::new(&request.area.crs, &self.grid.crs).map_err(|e| {
            BoundaryError::service(Stage::Acquisition, self.name(), e.to_string())
        })?;
        let aoi = transformer
            .multi_polygon(&request.area.geometry)
            .map_err(|e| BoundaryError::service(Stage::Acquisition, self.name(), e.to_string()))?;

        let matched = filter_scenes(&self.scenes, request);
        info!(matched = matched.len(), total = self.scenes.len(), "Filtered scenes");
        if matched.is_empty() {
            return Err(BoundaryError::ImageryUnavailable { filters: request.filter_summary() });
        }

        let window = aoi.bounding_rect().and_then(|bounds| self.window(bounds));
        let Some((col0, row0, width, height)) = window else {
            warn!("Area of interest lies outside the catalog grid");
            return Err(BoundaryError::ImageryUnavailable { filters: request.filter_summary() });
        };
        debug!(col0, row0, width, height, "Cropping catalog grid to the area");

        let origin = self.grid.corner(col0, row0);
        let grid = GridSpec::new(
            width,
            height,
            GeoTransform { origin_x: origin.x, origin_y: origin.y, pixel_size },
            self.grid.crs.clone(),
        );
        let cropped: Vec<Scene> = matched
            .iter()
            .map(|s| crop(s, &self.grid, col0, row0, width, height))
            .collect();
        let refs: Vec<&Scene> = cropped.iter().collect();

        median_composite(&refs, request, &grid, &aoi)
    }

    fn name(&self) -> &str {
        "scene catalog"
    }
}

fn crop(scene: &Scene, grid: &GridSpec, col0: usize, row0: usize, width: usize, height: usize) -> Scene {
    let slice = |values: &Vec<u16>| -> Vec<u16> {
        if values.len() != grid.len() {
            // left for median_composite to report
            return values.clone();
        }
        (row0..row0 + height)
            .flat_map(|row| {
                let start = grid.index(col0, row);
                values[start..start + width].iter().copied()
            })
            .collect()
    };

    Scene {
        id: scene.id.clone(),
        date: scene.date,
        cloudy_pixel_percentage: scene.cloudy_pixel_percentage,
        footprint: scene.footprint,
        bands: scene.bands.iter().map(|(k, v)| (k.clone(), slice(v))).collect(),
        qa60: slice(&scene.qa60),
    }
}
