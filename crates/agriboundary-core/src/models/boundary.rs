//! Detected field boundaries.

use geo::{MultiPolygon, Polygon};

use crate::models::geometry::Crs;

/// One candidate field, tagged with the cluster or mask it came from
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    pub polygon: Polygon<f64>,
    pub cluster_id: Option<u32>,
}

impl BoundaryPolygon {
    pub fn new(polygon: Polygon<f64>, cluster_id: Option<u32>) -> Self {
        Self { polygon, cluster_id }
    }
}

/// Ordered set of boundary polygons in one CRS
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundarySet {
    pub polygons: Vec<BoundaryPolygon>,
    pub crs: Crs,
}

impl BoundarySet {
    pub fn new(polygons: Vec<BoundaryPolygon>, crs: Crs) -> Self {
        Self { polygons, crs }
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn cluster_ids(&self) -> Vec<Option<u32>> {
        self.polygons.iter().map(|p| p.cluster_id).collect()
    }

    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.polygons.iter().map(|p| p.polygon.clone()).collect())
    }
}
