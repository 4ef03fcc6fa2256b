//! SNIC superpixel clustering.
//!
//! Seeds sit on a regular grid; clusters grow simultaneously from a single
//! priority queue ordered by a distance that mixes spectral difference to the
//! running cluster mean with spatial distance to its centroid.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;

use agriboundary_core::error::{BoundaryError, Result};
use agriboundary_core::models::{
    Composite, Connectivity, LabelRaster, SegmentationOutput, SegmentationParameters, NO_LABEL,
    SEGMENTATION_BANDS,
};
use agriboundary_core::ports::Segmenter;
use async_trait::async_trait;
use tracing::{debug, info};

/// Clustering settings resolved from [`SegmentationParameters::Clustering`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnicSettings {
    pub seed_spacing: u32,
    pub compactness: f64,
    pub connectivity: Connectivity,
    pub neighborhood_size: u32,
}

impl SnicSettings {
    pub fn from_params(params: &SegmentationParameters) -> Result<Self> {
        match params {
            SegmentationParameters::Clustering {
                seed_spacing,
                compactness,
                connectivity,
                neighborhood_size,
            } => Ok(Self {
                seed_spacing: *seed_spacing,
                compactness: *compactness,
                connectivity: *connectivity,
                neighborhood_size: *neighborhood_size,
            }),
            other => Err(BoundaryError::invalid(
                "backend",
                format!("SNIC cannot run with {} parameters", other.backend()),
            )),
        }
    }
}

/// In-process superpixel clustering over the visible and near-infrared bands
#[derive(Debug, Default, Clone)]
pub struct SnicSegmenter;

impl SnicSegmenter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Segmenter for SnicSegmenter {
    async fn segment(
        &self,
        composite: &Composite,
        params: &SegmentationParameters,
        _scratch: &Path,
    ) -> Result<SegmentationOutput> {
        let settings = SnicSettings::from_params(params)?;
        let labels = snic(composite, &settings)?;
        Ok(SegmentationOutput::Labels(labels))
    }

    fn name(&self) -> &str {
        "snic"
    }
}

#[derive(Debug)]
struct Candidate {
    distance: f64,
    order: u64,
    idx: usize,
    cluster: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // min-heap on distance, ties broken by insertion order
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug, Clone)]
struct Cluster {
    features: [f64; 4],
    x: f64,
    y: f64,
    count: f64,
}

impl Cluster {
    fn empty() -> Self {
        Self { features: [0.0; 4], x: 0.0, y: 0.0, count: 0.0 }
    }

    fn add(&mut self, features: &[f64; 4], col: usize, row: usize) {
        self.count += 1.0;
        for (mean, v) in self.features.iter_mut().zip(features) {
            *mean += (v - *mean) / self.count;
        }
        self.x += (col as f64 - self.x) / self.count;
        self.y += (row as f64 - self.y) / self.count;
    }
}

/// Seed positions on a regular grid offset by half the spacing
pub fn seed_grid(width: usize, height: usize, spacing: usize) -> Vec<(usize, usize)> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let spacing = spacing.max(1);
    let first_col = (spacing / 2).min(width - 1);
    let first_row = (spacing / 2).min(height - 1);

    (first_row..height)
        .step_by(spacing)
        .flat_map(|row| (first_col..width).step_by(spacing).map(move |col| (col, row)))
        .collect()
}

/// Run SNIC and return labels `1..=k`; masked pixels get [`NO_LABEL`]
pub fn snic(composite: &Composite, settings: &SnicSettings) -> Result<LabelRaster> {
    let grid = &composite.grid;
    let bands = SEGMENTATION_BANDS
        .iter()
        .map(|name| {
            composite.band(name).ok_or_else(|| BoundaryError::SegmentationFailure {
                reason: format!("composite has no {} band", name),
                remediation: format!(
                    "Request the bands {} from the imagery catalog",
                    SEGMENTATION_BANDS.join(", ")
                ),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let features = |idx: usize| -> Option<[f64; 4]> {
        let mut out = [0.0; 4];
        for (slot, band) in out.iter_mut().zip(&bands) {
            let v = *band.values.get(idx)?;
            if !v.is_finite() {
                return None;
            }
            *slot = v as f64;
        }
        Some(out)
    };

    let valid: Vec<Option<[f64; 4]>> = (0..grid.len()).map(features).collect();
    if valid.iter().all(Option::is_none) {
        return Err(BoundaryError::ImageryUnavailable {
            filters: "composite has no cloud-free pixel inside the area".to_string(),
        });
    }

    let spacing = settings.seed_spacing.max(1) as f64;
    let radius = settings.neighborhood_size as f64;
    let offsets = settings.connectivity.offsets();

    let mut labels = vec![NO_LABEL; grid.len()];
    let mut clusters = Vec::new();
    let mut heap = BinaryHeap::new();
    let mut order = 0u64;

    for (col, row) in seed_grid(grid.width, grid.height, settings.seed_spacing as usize) {
        let idx = grid.index(col, row);
        if valid[idx].is_none() {
            continue;
        }
        heap.push(Candidate { distance: 0.0, order, idx, cluster: clusters.len() });
        order += 1;
        clusters.push(Cluster::empty());
    }
    debug!(seeds = clusters.len(), "Placed SNIC seeds");

    while let Some(Candidate { idx, cluster, .. }) = heap.pop() {
        if labels[idx] != NO_LABEL {
            continue;
        }
        let Some(pixel) = valid[idx] else {
            continue;
        };
        let (col, row) = (idx % grid.width, idx / grid.width);
        labels[idx] = cluster as u32 + 1;
        clusters[cluster].add(&pixel, col, row);
        let centre = &clusters[cluster];

        for (dc, dr) in offsets {
            let (c, r) = (col as isize + dc, row as isize + dr);
            if c < 0 || r < 0 || c >= grid.width as isize || r >= grid.height as isize {
                continue;
            }
            let n = grid.index(c as usize, r as usize);
            if labels[n] != NO_LABEL {
                continue;
            }
            let Some(values) = valid[n] else {
                continue;
            };

            let ds = ((c as f64 - centre.x).powi(2) + (r as f64 - centre.y).powi(2)).sqrt();
            if ds > radius {
                continue;
            }
            let dc2: f64 = values
                .iter()
                .zip(&centre.features)
                .map(|(v, m)| (v - m).powi(2))
                .sum();
            let spatial = settings.compactness * ds / spacing;
            let distance = (dc2 + spatial * spatial).sqrt();

            heap.push(Candidate { distance, order, idx: n, cluster });
            order += 1;
        }
    }

    let seeded = clusters.len() as u32;
    let extra = absorb_orphans(&mut labels, &valid, grid.width, grid.height, offsets, seeded);
    info!(clusters = seeded + extra, orphan_clusters = extra, "SNIC finished");

    LabelRaster::new(grid.clone(), labels)
}

/// Give unclaimed valid pixels a neighbouring label, or a fresh label per
/// isolated patch. Returns the number of new labels.
fn absorb_orphans(
    labels: &mut [u32],
    valid: &[Option<[f64; 4]>],
    width: usize,
    height: usize,
    offsets: &[(isize, isize)],
    next_label: u32,
) -> u32 {
    let neighbours = |idx: usize| {
        let (col, row) = ((idx % width) as isize, (idx / width) as isize);
        offsets.iter().filter_map(move |(dc, dr)| {
            let (c, r) = (col + dc, row + dr);
            (c >= 0 && r >= 0 && c < width as isize && r < height as isize)
                .then(|| r as usize * width + c as usize)
        })
    };
    let is_orphan = |labels: &[u32], idx: usize| labels[idx] == NO_LABEL && valid[idx].is_some();

    loop {
        let mut changed = false;
        for idx in 0..labels.len() {
            if !is_orphan(labels, idx) {
                continue;
            }
            if let Some(label) = neighbours(idx).map(|n| labels[n]).find(|&l| l != NO_LABEL) {
                labels[idx] = label;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut created = 0;
    for start in 0..labels.len() {
        if !is_orphan(labels, start) {
            continue;
        }
        created += 1;
        let label = next_label + created;
        labels[start] = label;
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            for n in neighbours(idx) {
                if is_orphan(labels, n) {
                    labels[n] = label;
                    stack.push(n);
                }
            }
        }
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use agriboundary_core::models::{BandLayer, Crs, GeoTransform, GridSpec};

    fn composite(width: usize, height: usize, value: impl Fn(usize, usize) -> f32) -> Composite {
        let grid = GridSpec::new(
            width,
            height,
            GeoTransform { origin_x: 0.0, origin_y: height as f64 * 10.0, pixel_size: 10.0 },
            Crs::from_epsg(32631),
        );
        let values: Vec<f32> =
            (0..height).flat_map(|r| (0..width).map(move |c| (c, r))).map(|(c, r)| value(c, r)).collect();
        let bands = SEGMENTATION_BANDS
            .iter()
            .map(|name| BandLayer { name: name.to_string(), values: values.clone() })
            .collect();
        Composite { grid, bands, scene_count: 1 }
    }

    fn settings(spacing: u32, compactness: f64) -> SnicSettings {
        let params = SegmentationParameters::clustering(spacing, compactness).unwrap();
        SnicSettings::from_params(&params).unwrap()
    }

    #[test]
    fn test_seed_grid() {
        let seeds = seed_grid(10, 10, 5);
        assert_eq!(seeds, vec![(2, 2), (7, 2), (2, 7), (7, 7)]);
        // grid smaller than the spacing still gets one seed
        assert_eq!(seed_grid(3, 2, 30), vec![(2, 1)]);
        assert!(seed_grid(0, 5, 3).is_empty());
    }

    #[test]
    fn test_every_valid_pixel_is_labelled() {
        let c = composite(20, 20, |col, _| if col < 10 { 0.05 } else { 0.3 });
        let labels = snic(&c, &settings(5, 0.5)).unwrap();
        assert!(labels.labels.iter().all(|&l| l != NO_LABEL));
        assert_eq!(labels.unique_labels().len(), 16);
    }

    #[test]
    fn test_spectral_edge_is_respected() {
        // two fields split down the middle; pure spectral clustering must not cross the edge
        let c = composite(10, 4, |col, _| if col < 5 { 0.05 } else { 0.4 });
        let labels = snic(&c, &settings(4, 0.0)).unwrap();
        for row in 0..4 {
            let left = labels.get(1, row);
            let right = labels.get(8, row);
            assert_ne!(left, right);
            for col in 0..5 {
                assert_ne!(labels.get(col, row), right);
            }
        }
    }

    #[test]
    fn test_masked_pixels_stay_unlabelled() {
        let c = composite(6, 6, |col, row| if col == row { f32::NAN } else { 0.1 });
        let labels = snic(&c, &settings(3, 0.5)).unwrap();
        for i in 0..6 {
            assert_eq!(labels.get(i, i), NO_LABEL);
        }
    }

    #[test]
    fn test_unseeded_patch_gets_its_own_label() {
        // masked column isolates the right edge from every seed
        let c = composite(8, 2, |col, _| if col == 6 { f32::NAN } else { 0.1 });
        let labels = snic(&c, &settings(8, 0.5)).unwrap();
        let left = labels.get(4, 0);
        let right = labels.get(7, 0);
        assert_ne!(left, NO_LABEL);
        assert_ne!(right, NO_LABEL);
        assert_ne!(left, right);
    }

    #[test]
    fn test_fully_masked_is_unavailable() {
        let c = composite(4, 4, |_, _| f32::NAN);
        let err = snic(&c, &settings(2, 0.5)).unwrap_err();
        assert!(matches!(err, BoundaryError::ImageryUnavailable { .. }));
    }

    #[test]
    fn test_missing_band_is_segmentation_failure() {
        let mut c = composite(4, 4, |_, _| 0.1);
        c.bands.retain(|b| b.name != "B8");
        let err = snic(&c, &settings(2, 0.5)).unwrap_err();
        assert!(matches!(err, BoundaryError::SegmentationFailure { .. }));
    }

    #[tokio::test]
    async fn test_model_parameters_are_rejected() {
        let c = composite(4, 4, |_, _| 0.1);
        let params = SegmentationParameters::model(Default::default(), Default::default());
        let result = SnicSegmenter::new().segment(&c, &params, Path::new(".")).await;
        assert!(matches!(result, Err(BoundaryError::InvalidRequest { .. })));
    }
}
