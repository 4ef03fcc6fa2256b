//! Coordinate reference systems and the area of interest.

use geo::{BoundingRect, Centroid, Coord, GeodesicArea, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into() }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84")
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::new(3857, "Web Mercator")
    }

    /// Crs from a bare EPSG code, naming WGS 84 when it is one
    pub fn from_epsg(epsg: u32) -> Self {
        match epsg {
            4326 => Self::wgs84(),
            3857 => Self::web_mercator(),
            other => Self::new(other, format!("EPSG:{}", other)),
        }
    }

    pub fn is_geographic(&self) -> bool {
        self.epsg == 4326
    }

    /// Authority string understood by PROJ
    pub fn authority(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

/// The user-supplied boundary, always held in WGS 84 longitude/latitude.
///
/// Multi-feature uploads are reduced to the union of their polygons, so the
/// geometry may carry several disjoint parts.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    pub geometry: MultiPolygon<f64>,
    pub crs: Crs,
    pub source_name: String,
    pub feature_count: usize,
}

impl AreaOfInterest {
    pub fn new(geometry: MultiPolygon<f64>, source_name: impl Into<String>, feature_count: usize) -> Self {
        Self {
            geometry,
            crs: Crs::wgs84(),
            source_name: source_name.into(),
            feature_count,
        }
    }

    /// Geodesic area in square metres
    pub fn area_m2(&self) -> f64 {
        self.geometry.geodesic_area_unsigned()
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    pub fn centroid(&self) -> Option<Coord<f64>> {
        self.geometry.centroid().map(|p| p.0)
    }

    pub fn part_count(&self) -> usize {
        self.geometry.0.len()
    }

    /// Vertex count over every ring of every part
    pub fn vertex_count(&self) -> usize {
        self.geometry
            .iter()
            .map(|p| p.exterior().0.len() + p.interiors().iter().map(|r| r.0.len()).sum::<usize>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(size_deg: f64) -> AreaOfInterest {
        let poly = polygon![
            (x: 10.0, y: 50.0),
            (x: 10.0 + size_deg, y: 50.0),
            (x: 10.0 + size_deg, y: 50.0 + size_deg),
            (x: 10.0, y: 50.0 + size_deg),
            (x: 10.0, y: 50.0),
        ];
        AreaOfInterest::new(MultiPolygon::new(vec![poly]), "square.kml", 1)
    }

    #[test]
    fn test_crs_from_epsg() {
        assert_eq!(Crs::from_epsg(4326), Crs::wgs84());
        assert_eq!(Crs::from_epsg(32633).name, "EPSG:32633");
        assert!(!Crs::from_epsg(32633).is_geographic());
        assert_eq!(Crs::web_mercator().authority(), "EPSG:3857");
    }

    #[test]
    fn test_area_is_geodesic_square_metres() {
        let aoi = square(0.01);
        let area = aoi.area_m2();
        // 0.01 deg is ~1113 m of latitude and ~716 m of longitude at 50N
        assert!(area > 700_000.0 && area < 900_000.0, "area was {}", area);
    }

    #[test]
    fn test_centroid_and_bounds() {
        let aoi = square(2.0);
        let c = aoi.centroid().unwrap();
        assert!((c.x - 11.0).abs() < 1e-9);
        assert!((c.y - 51.0).abs() < 1e-9);
        let rect = aoi.bounding_rect().unwrap();
        assert_eq!(rect.min().x, 10.0);
        assert_eq!(rect.max().y, 52.0);
        assert_eq!(aoi.vertex_count(), 5);
        assert_eq!(aoi.part_count(), 1);
    }
}
