//! Imagery request, raster grid and composite models.

use chrono::NaiveDate;
use geo::{coord, Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{BoundaryError, Result};
use crate::models::geometry::{AreaOfInterest, Crs};

/// Sentinel-2 surface reflectance collection used by default
pub const DEFAULT_COLLECTION: &str = "COPERNICUS/S2_SR_HARMONIZED";

/// Native ground sampling distance of the visible and NIR bands, in metres
pub const NATIVE_SCALE_M: f64 = 10.0;

/// Blue, green, red and near-infrared
pub const SEGMENTATION_BANDS: [&str; 4] = ["B2", "B3", "B4", "B8"];

/// True colour band order for previews and model tiles
pub const VISUAL_BANDS: [&str; 3] = ["B4", "B3", "B2"];

/// Parameters for one composite query against an imagery catalog
#[derive(Debug, Clone)]
pub struct ImageryRequest {
    pub area: AreaOfInterest,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cloud_max_pct: f64,
    pub bands: Vec<String>,
    pub collection: String,
    pub scale_m: f64,
}

impl ImageryRequest {
    /// Build a request, rejecting inverted date windows and out-of-range cloud thresholds
    /// before anything is sent to a catalog.
    pub fn new(
        area: AreaOfInterest,
        start: NaiveDate,
        end: NaiveDate,
        cloud_max_pct: f64,
    ) -> Result<Self> {
        Self::check_filters(start, end, cloud_max_pct)?;

        Ok(Self {
            area,
            start,
            end,
            cloud_max_pct,
            bands: SEGMENTATION_BANDS.iter().map(|b| b.to_string()).collect(),
            collection: DEFAULT_COLLECTION.to_string(),
            scale_m: NATIVE_SCALE_M,
        })
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_scale(mut self, scale_m: f64) -> Self {
        self.scale_m = scale_m;
        self
    }

    /// The date and cloud checks `new` applies, for callers that have no area yet
    pub fn check_filters(start: NaiveDate, end: NaiveDate, cloud_max_pct: f64) -> Result<()> {
        if start > end {
            return Err(BoundaryError::invalid(
                "date range",
                format!("start date {} is after end date {}", start, end),
            ));
        }

        if !cloud_max_pct.is_finite() || !(0.0..=100.0).contains(&cloud_max_pct) {
            return Err(BoundaryError::invalid(
                "cloud cover",
                format!("{} is outside 0..=100 percent", cloud_max_pct),
            ));
        }
        Ok(())
    }

    pub fn with_bands(mut self, bands: Vec<String>) -> Self {
        self.bands = bands;
        self
    }

    /// One-line summary of the filters, used when nothing matched
    pub fn filter_summary(&self) -> String {
        format!(
            "{} from {} to {} with cloud cover < {}% over {}",
            self.collection, self.start, self.end, self.cloud_max_pct, self.area.source_name
        )
    }
}

/// North-up affine transform; origin is the top-left corner of pixel (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
}

/// Pixel grid of a raster in a given CRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
}

impl GridSpec {
    pub fn new(width: usize, height: usize, transform: GeoTransform, crs: Crs) -> Self {
        Self { width, height, transform, crs }
    }

    /// Smallest grid aligned to multiples of `pixel_size` that covers `bounds`
    pub fn covering(bounds: Rect<f64>, pixel_size: f64, crs: Crs) -> Self {
        let min_x = (bounds.min().x / pixel_size).floor() * pixel_size;
        let max_y = (bounds.max().y / pixel_size).ceil() * pixel_size;
        let max_x = (bounds.max().x / pixel_size).ceil() * pixel_size;
        let min_y = (bounds.min().y / pixel_size).floor() * pixel_size;

        let width = (((max_x - min_x) / pixel_size).round() as usize).max(1);
        let height = (((max_y - min_y) / pixel_size).round() as usize).max(1);

        Self::new(
            width,
            height,
            GeoTransform { origin_x: min_x, origin_y: max_y, pixel_size },
            crs,
        )
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// World coordinate of a pixel corner; `col == width` / `row == height` address the far edges.
    pub fn corner(&self, col: usize, row: usize) -> Coord<f64> {
        let t = &self.transform;
        coord! {
            x: t.origin_x + col as f64 * t.pixel_size,
            y: t.origin_y - row as f64 * t.pixel_size,
        }
    }

    pub fn pixel_center(&self, col: usize, row: usize) -> Coord<f64> {
        let t = &self.transform;
        coord! {
            x: t.origin_x + (col as f64 + 0.5) * t.pixel_size,
            y: t.origin_y - (row as f64 + 0.5) * t.pixel_size,
        }
    }

    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(self.corner(0, 0), self.corner(self.width, self.height))
    }

    /// Ground area of one pixel in CRS units squared
    pub fn pixel_area(&self) -> f64 {
        self.transform.pixel_size * self.transform.pixel_size
    }
}

/// One band of a composite; masked pixels hold NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandLayer {
    pub name: String,
    pub values: Vec<f32>,
}

/// Per-pixel median of the cloud-masked scenes, clipped to the area
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub grid: GridSpec,
    pub bands: Vec<BandLayer>,
    pub scene_count: usize,
}

impl Composite {
    pub fn band(&self, name: &str) -> Option<&BandLayer> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    /// A pixel is valid when every band has a finite value there.
    pub fn is_valid(&self, idx: usize) -> bool {
        !self.bands.is_empty() && self.bands.iter().all(|b| b.values[idx].is_finite())
    }

    pub fn valid_pixel_count(&self) -> usize {
        (0..self.grid.len()).filter(|&i| self.is_valid(i)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.scene_count == 0 || self.valid_pixel_count() == 0
    }
}
