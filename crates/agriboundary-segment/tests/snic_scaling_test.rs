//! Superpixel count against seed spacing on a 1 km² composite
//!
//! A 100 x 100 pixel grid at 10 m covers one square kilometre. The number of
//! superpixels is expected to track `pixels / spacing²` within ±50%; the
//! tolerance covers seeds lost to the half-spacing offset at the grid edges and
//! orphan patches that become clusters of their own.

use agriboundary_core::models::{
    BandLayer, Composite, Crs, GeoTransform, GridSpec, SegmentationParameters, SEGMENTATION_BANDS,
};
use agriboundary_segment::snic::{snic, SnicSettings};

const SIZE: usize = 100;
const TOLERANCE: f64 = 0.5;

/// Parcels of 25 x 40 px with distinct reflectance and a little deterministic texture
fn field_composite() -> Composite {
    let grid = GridSpec::new(
        SIZE,
        SIZE,
        GeoTransform { origin_x: 628_000.0, origin_y: 5_805_000.0, pixel_size: 10.0 },
        Crs::from_epsg(32631),
    );
    let bands = SEGMENTATION_BANDS
        .iter()
        .enumerate()
        .map(|(b, name)| {
            let values = (0..SIZE * SIZE)
                .map(|idx| {
                    let (col, row) = (idx % SIZE, idx / SIZE);
                    let parcel = (col / 25) + 4 * (row / 40);
                    let base = 0.04 + 0.02 * ((parcel * 7 + b * 3) % 11) as f32;
                    let texture = ((col * 31 + row * 17) % 7) as f32 * 0.002;
                    base + texture
                })
                .collect();
            BandLayer { name: name.to_string(), values }
        })
        .collect();
    Composite { grid, bands, scene_count: 4 }
}

fn count_for(spacing: u32) -> usize {
    let params = SegmentationParameters::clustering(spacing, 0.5).unwrap();
    let settings = SnicSettings::from_params(&params).unwrap();
    snic(&field_composite(), &settings).unwrap().unique_labels().len()
}

#[test]
fn test_superpixel_count_scales_with_spacing() {
    for spacing in [10u32, 20, 30] {
        let expected = (SIZE * SIZE) as f64 / (spacing * spacing) as f64;
        let count = count_for(spacing) as f64;
        let ratio = count / expected;
        assert!(
            (1.0 - TOLERANCE..=1.0 + TOLERANCE).contains(&ratio),
            "spacing {}: {} superpixels, expected about {:.1}",
            spacing,
            count,
            expected
        );
    }
}

#[test]
fn test_smaller_spacing_gives_more_clusters() {
    assert!(count_for(10) > count_for(20));
    assert!(count_for(20) > count_for(30));
}
