//! Visual raster tiles rendered from a composite

use std::path::Path;

use agriboundary_core::error::{BoundaryError, Result};
use agriboundary_core::models::{Composite, VISUAL_BANDS};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use tracing::debug;

/// Reflectance mapped to black
pub const STRETCH_MIN: f32 = 0.0;

/// Reflectance mapped to full brightness
pub const STRETCH_MAX: f32 = 0.3;

/// Linear stretch of one reflectance value to 8 bits; non-finite values map to `None`
pub fn stretch(value: f32, min: f32, max: f32) -> Option<u8> {
    if !value.is_finite() {
        return None;
    }
    let span = (max - min).max(f32::EPSILON);
    Some((((value - min) / span).clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Three-band RGBA rendering; masked pixels are transparent.
///
/// Returns `None` when the composite lacks one of the requested bands.
pub fn render_rgba(composite: &Composite, bands: [&str; 3], min: f32, max: f32) -> Option<RgbaImage> {
    let [r, g, b] = bands.map(|name| composite.band(name));
    let (r, g, b) = (r?, g?, b?);
    let grid = &composite.grid;

    let mut image = RgbaImage::new(grid.width as u32, grid.height as u32);
    for (col, row, pixel) in image.enumerate_pixels_mut() {
        let idx = grid.index(col as usize, row as usize);
        let channels = (
            stretch(r.values[idx], min, max),
            stretch(g.values[idx], min, max),
            stretch(b.values[idx], min, max),
        );
        *pixel = match channels {
            (Some(r), Some(g), Some(b)) => Rgba([r, g, b, 255]),
            _ => Rgba([0, 0, 0, 0]),
        };
    }
    Some(image)
}

/// Write the B4/B3/B2 composite as an 8-bit RGB PNG at the grid resolution.
///
/// Masked pixels are black.
pub fn write_visual_tile(composite: &Composite, path: &Path) -> Result<()> {
    let rgba = render_rgba(composite, VISUAL_BANDS, STRETCH_MIN, STRETCH_MAX).ok_or_else(|| {
        BoundaryError::SegmentationFailure {
            reason: format!("composite lacks one of the visual bands {}", VISUAL_BANDS.join(", ")),
            remediation: "Request B4, B3 and B2 from the imagery catalog".to_string(),
        }
    })?;

    let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, _]) = *rgba.get_pixel(x, y);
        Rgb([r, g, b])
    });

    rgb.save(path).map_err(|e| BoundaryError::SegmentationFailure {
        reason: format!("Failed to write tile {}: {}", path.display(), e),
        remediation: "Check free space in the scratch directory".to_string(),
    })?;
    debug!(path = %path.display(), width = rgb.width(), height = rgb.height(), "Wrote visual tile");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agriboundary_core::models::{BandLayer, Crs, GeoTransform, GridSpec};

    fn composite() -> Composite {
        let grid = GridSpec::new(
            2,
            1,
            GeoTransform { origin_x: 0.0, origin_y: 10.0, pixel_size: 10.0 },
            Crs::from_epsg(32631),
        );
        let band = |name: &str, v: f32| BandLayer { name: name.to_string(), values: vec![v, f32::NAN] };
        Composite {
            grid,
            bands: vec![band("B4", 0.3), band("B3", 0.15), band("B2", 0.0)],
            scene_count: 1,
        }
    }

    #[test]
    fn test_stretch() {
        assert_eq!(stretch(0.0, 0.0, 0.3), Some(0));
        assert_eq!(stretch(0.15, 0.0, 0.3), Some(128));
        assert_eq!(stretch(0.9, 0.0, 0.3), Some(255));
        assert_eq!(stretch(-0.1, 0.0, 0.3), Some(0));
        assert_eq!(stretch(f32::NAN, 0.0, 0.3), None);
    }

    #[test]
    fn test_render_rgba_masks_nan() {
        let image = render_rgba(&composite(), VISUAL_BANDS, 0.0, 0.3).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 128, 0, 255]));
        assert_eq!(image.get_pixel(1, 0)[3], 0);
        assert!(render_rgba(&composite(), ["B8", "B4", "B3"], 0.0, 0.3).is_none());
    }

    #[test]
    fn test_write_visual_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        write_visual_tile(&composite(), &path).unwrap();

        let read = image::open(&path).unwrap().to_rgb8();
        assert_eq!(read.dimensions(), (2, 1));
        assert_eq!(read.get_pixel(0, 0), &Rgb([255, 128, 0]));
        assert_eq!(read.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }
}
