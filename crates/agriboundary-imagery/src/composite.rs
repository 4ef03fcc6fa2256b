//! Scene filtering, cloud masking and median compositing

use std::collections::HashMap;

use agriboundary_core::error::{BoundaryError, Result, Stage};
use agriboundary_core::models::{BandLayer, Composite, GridSpec, ImageryRequest};
use chrono::NaiveDate;
use geo::{Contains, Intersects, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// QA60 bit flagging opaque cloud
pub const CLOUD_BIT: u16 = 1 << 10;

/// QA60 bit flagging cirrus
pub const CIRRUS_BIT: u16 = 1 << 11;

/// Digital numbers are surface reflectance multiplied by this factor
pub const REFLECTANCE_SCALE: f32 = 10_000.0;

/// Digital number marking pixels outside the scene swath
pub const NO_DATA: u16 = 0;

/// True when neither the cloud nor the cirrus bit is set
pub fn qa_clear(qa: u16) -> bool {
    qa & (CLOUD_BIT | CIRRUS_BIT) == 0
}

/// One acquisition resampled onto the catalog grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub date: NaiveDate,

    /// Scene-level cloud metadata in percent
    pub cloudy_pixel_percentage: f64,

    /// WGS 84 footprint as `[min_lon, min_lat, max_lon, max_lat]`
    pub footprint: [f64; 4],

    /// Raw digital numbers per band
    pub bands: HashMap<String, Vec<u16>>,

    /// QA60 bitmask per pixel
    pub qa60: Vec<u16>,
}

impl Scene {
    pub fn footprint_rect(&self) -> Rect<f64> {
        let [min_x, min_y, max_x, max_y] = self.footprint;
        Rect::new((min_x, min_y), (max_x, max_y))
    }

    /// Cloud-masked reflectance of one band at one pixel
    pub fn reflectance(&self, band: &str, idx: usize) -> Option<f32> {
        let dn = *self.bands.get(band)?.get(idx)?;
        let qa = *self.qa60.get(idx)?;
        if dn == NO_DATA || !qa_clear(qa) {
            return None;
        }
        Some(dn as f32 / REFLECTANCE_SCALE)
    }
}

/// Scenes intersecting the area, inside the date window (inclusive) and
/// strictly below the cloud threshold, in input order.
pub fn filter_scenes<'a>(scenes: &'a [Scene], request: &ImageryRequest) -> Vec<&'a Scene> {
    scenes
        .iter()
        .filter(|s| s.date >= request.start && s.date <= request.end)
        .filter(|s| s.cloudy_pixel_percentage < request.cloud_max_pct)
        .filter(|s| s.footprint_rect().intersects(&request.area.geometry))
        .collect()
}

/// Per-pixel median of the masked scenes, clipped to `aoi_in_grid`.
///
/// `aoi_in_grid` must be in the grid's CRS. Pixels with no clear observation or
/// whose centre lies outside the area are NaN.
pub fn median_composite(
    scenes: &[&Scene],
    request: &ImageryRequest,
    grid: &GridSpec,
    aoi_in_grid: &MultiPolygon<f64>,
) -> Result<Composite> {
    for scene in scenes {
        if scene.qa60.len() != grid.len() {
            return Err(size_mismatch(&scene.id, "QA60", scene.qa60.len(), grid));
        }
        for band in &request.bands {
            match scene.bands.get(band) {
                Some(values) if values.len() == grid.len() => {}
                Some(values) => return Err(size_mismatch(&scene.id, band, values.len(), grid)),
                None => {
                    return Err(BoundaryError::service(
                        Stage::Acquisition,
                        "scene catalog",
                        format!("scene {} has no band {}", scene.id, band),
                    ))
                }
            }
        }
    }

    let inside: Vec<bool> = (0..grid.height)
        .flat_map(|row| (0..grid.width).map(move |col| (col, row)))
        .map(|(col, row)| aoi_in_grid.contains(&Point::from(grid.pixel_center(col, row))))
        .collect();

    let mut samples = Vec::with_capacity(scenes.len());
    let bands = request
        .bands
        .iter()
        .map(|band| {
            let values = (0..grid.len())
                .map(|idx| {
                    if !inside[idx] {
                        return f32::NAN;
                    }
                    samples.clear();
                    samples.extend(scenes.iter().filter_map(|s| s.reflectance(band, idx)));
                    median(&mut samples)
                })
                .collect();
            BandLayer { name: band.clone(), values }
        })
        .collect();

    let composite = Composite { grid: grid.clone(), bands, scene_count: scenes.len() };
    debug!(
        scenes = scenes.len(),
        valid_pixels = composite.valid_pixel_count(),
        "Built median composite"
    );
    Ok(composite)
}

/// Median of the samples; the mean of the two middle values for even counts, NaN when empty
pub fn median(samples: &mut [f32]) -> f32 {
    if samples.is_empty() {
        return f32::NAN;
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        (samples[mid - 1] + samples[mid]) / 2.0
    } else {
        samples[mid]
    }
}

fn size_mismatch(scene: &str, band: &str, len: usize, grid: &GridSpec) -> BoundaryError {
    BoundaryError::service(
        Stage::Acquisition,
        "scene catalog",
        format!(
            "scene {} band {} has {} pixels, expected {}x{}",
            scene, band, len, grid.width, grid.height
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qa_bits() {
        assert!(qa_clear(0));
        assert!(!qa_clear(CLOUD_BIT));
        assert!(!qa_clear(CIRRUS_BIT));
        assert!(!qa_clear(CLOUD_BIT | CIRRUS_BIT));
        // other bits are ignored
        assert!(qa_clear(1 << 3));
    }

    #[test]
    fn test_median() {
        assert!(median(&mut []).is_nan());
        assert_eq!(median(&mut [0.3]), 0.3);
        assert_eq!(median(&mut [0.5, 0.1, 0.3]), 0.3);
        assert_eq!(median(&mut [0.4, 0.1, 0.2, 0.3]), 0.25);
    }

    #[test]
    fn test_reflectance_masking() {
        let scene = Scene {
            id: "s".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            cloudy_pixel_percentage: 1.0,
            footprint: [0.0, 0.0, 1.0, 1.0],
            bands: HashMap::from([("B4".to_string(), vec![1500, 1500, 0])]),
            qa60: vec![0, CIRRUS_BIT, 0],
        };
        assert_eq!(scene.reflectance("B4", 0), Some(0.15));
        assert_eq!(scene.reflectance("B4", 1), None);
        assert_eq!(scene.reflectance("B4", 2), None);
        assert_eq!(scene.reflectance("B8", 0), None);
    }
}
