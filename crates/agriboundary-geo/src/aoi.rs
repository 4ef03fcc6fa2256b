//! Reduction of uploaded features to one area of interest.
//!
//! Every polygonal feature contributes to the area: the result is the union of
//! all polygons found, reprojected to WGS 84 when the source uses another CRS.
//! Points and lines are skipped with a warning.

use agriboundary_core::error::{BoundaryError, Result};
use agriboundary_core::formats::FormatDataset;
use agriboundary_core::models::{AreaOfInterest, Crs};
use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};
use tracing::{debug, info, warn};

use crate::transform::Transformer;
use crate::validation::{validate_geographic, validate_polygon};

/// Build the area of interest from every polygon in a dataset
pub fn area_from_dataset(dataset: &FormatDataset) -> Result<AreaOfInterest> {
    let source = dataset.name.clone();
    let mut polygons = Vec::new();
    let mut skipped = 0usize;

    for feature in &dataset.features {
        let Some(value) = &feature.geometry else {
            skipped += 1;
            warn!(feature = %feature.id, "Feature has no geometry, skipping");
            continue;
        };

        let geometry = parse_geometry(value).map_err(|reason| {
            BoundaryError::geometry(&source, format!("feature {}: {}", feature.id, reason))
        })?;

        let before = polygons.len();
        collect_polygons(geometry, &mut polygons);
        if polygons.len() == before {
            skipped += 1;
            warn!(feature = %feature.id, "Feature is not polygonal, skipping");
        }
    }

    if polygons.is_empty() {
        return Err(BoundaryError::geometry(
            &source,
            format!(
                "no polygon features found ({} feature(s) read, {} skipped)",
                dataset.features.len(),
                skipped
            ),
        ));
    }

    for (i, polygon) in polygons.iter().enumerate() {
        let result = validate_polygon(polygon);
        if !result.is_valid {
            return Err(BoundaryError::geometry(
                &source,
                format!("polygon {}: {}", i, result.summary()),
            ));
        }
    }

    let source_crs = Crs::from_epsg(dataset.crs);
    let target = Crs::wgs84();
    let transformer = Transformer::new(&source_crs, &target)
        .map_err(|e| BoundaryError::geometry(&source, e.to_string()))?;
    if !transformer.is_identity() {
        info!(from = %source_crs.authority(), "Reprojecting area of interest to EPSG:4326");
        polygons = polygons
            .iter()
            .map(|p| transformer.polygon(p))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| BoundaryError::geometry(&source, e.to_string()))?;
    }

    let geometry = union_polygons(polygons);

    let check = validate_geographic(&geometry, &target);
    if !check.is_valid {
        return Err(BoundaryError::geometry(&source, check.summary()));
    }

    let aoi = AreaOfInterest::new(geometry, source, dataset.features.len());
    info!(
        parts = aoi.part_count(),
        features = aoi.feature_count,
        area_m2 = aoi.area_m2(),
        "Area of interest ready"
    );
    Ok(aoi)
}

/// Convert a GeoJSON geometry value into a `geo` geometry
pub fn parse_geometry(value: &serde_json::Value) -> std::result::Result<Geometry<f64>, String> {
    let geometry: geojson::Geometry = serde_json::from_value(value.clone())
        .map_err(|e| format!("invalid geometry: {}", e))?;
    Geometry::<f64>::try_from(geometry).map_err(|e| format!("unsupported geometry: {}", e))
}

/// Append every polygonal part of `geometry`, descending into collections
pub fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in gc.0 {
                collect_polygons(member, out);
            }
        }
        _ => {}
    }
}

/// Union of all polygons; a single polygon is returned untouched
pub fn union_polygons(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    if polygons.len() == 1 {
        return MultiPolygon::new(polygons);
    }

    debug!(count = polygons.len(), "Merging polygons");
    polygons
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, polygon| {
            if acc.0.is_empty() {
                MultiPolygon::new(vec![polygon])
            } else {
                acc.union(&MultiPolygon::new(vec![polygon]))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agriboundary_core::formats::FormatFeature;
    use serde_json::json;
    use std::collections::HashMap;

    fn feature(id: &str, geometry: Option<serde_json::Value>) -> FormatFeature {
        FormatFeature { id: id.to_string(), geometry, properties: HashMap::new() }
    }

    fn dataset(features: Vec<FormatFeature>, crs: u32) -> FormatDataset {
        FormatDataset {
            name: "fields".to_string(),
            format_name: "GeoJSON".to_string(),
            crs,
            features,
        }
    }

    fn square(x: f64, y: f64, size: f64) -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]]
        })
    }

    #[test]
    fn test_single_polygon() {
        let ds = dataset(vec![feature("0", Some(square(5.0, 52.0, 0.01)))], 4326);
        let aoi = area_from_dataset(&ds).unwrap();
        assert_eq!(aoi.part_count(), 1);
        assert_eq!(aoi.feature_count, 1);
        assert_eq!(aoi.crs, Crs::wgs84());
    }

    #[test]
    fn test_overlapping_polygons_are_merged() {
        let ds = dataset(
            vec![
                feature("a", Some(square(5.0, 52.0, 0.01))),
                feature("b", Some(square(5.005, 52.0, 0.01))),
            ],
            4326,
        );
        let aoi = area_from_dataset(&ds).unwrap();
        assert_eq!(aoi.part_count(), 1);
        let rect = aoi.bounding_rect().unwrap();
        assert!((rect.max().x - 5.015).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_polygons_stay_multi_part() {
        let ds = dataset(
            vec![
                feature("a", Some(square(5.0, 52.0, 0.01))),
                feature("b", Some(square(6.0, 52.0, 0.01))),
            ],
            4326,
        );
        let aoi = area_from_dataset(&ds).unwrap();
        assert_eq!(aoi.part_count(), 2);
    }

    #[test]
    fn test_points_only_is_rejected() {
        let ds = dataset(
            vec![feature("p", Some(json!({"type": "Point", "coordinates": [5.0, 52.0]})))],
            4326,
        );
        let err = area_from_dataset(&ds).unwrap_err();
        assert!(matches!(err, BoundaryError::GeometryParse { .. }));
    }

    #[test]
    fn test_points_are_skipped_next_to_polygons() {
        let ds = dataset(
            vec![
                feature("p", Some(json!({"type": "Point", "coordinates": [5.0, 52.0]}))),
                feature("none", None),
                feature("poly", Some(square(5.0, 52.0, 0.01))),
            ],
            4326,
        );
        let aoi = area_from_dataset(&ds).unwrap();
        assert_eq!(aoi.part_count(), 1);
        assert_eq!(aoi.feature_count, 3);
    }

    #[test]
    fn test_geometry_collection_members() {
        let collection = json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "LineString", "coordinates": [[5.0, 52.0], [5.1, 52.1]]},
                square(5.0, 52.0, 0.01)
            ]
        });
        let ds = dataset(vec![feature("gc", Some(collection))], 4326);
        assert_eq!(area_from_dataset(&ds).unwrap().part_count(), 1);
    }

    #[test]
    fn test_projected_source_is_reprojected() {
        // ~1 km square in UTM 31N near Amsterdam
        let ds = dataset(vec![feature("utm", Some(square(628_000.0, 5_804_000.0, 1000.0)))], 32631);
        let aoi = area_from_dataset(&ds).unwrap();
        let c = aoi.centroid().unwrap();
        assert!(c.x > 4.0 && c.x < 6.0, "lon {}", c.x);
        assert!(c.y > 52.0 && c.y < 53.0, "lat {}", c.y);
        assert!((aoi.area_m2() - 1_000_000.0).abs() < 10_000.0);
    }

    #[test]
    fn test_projected_coordinates_labelled_wgs84_are_rejected() {
        let ds = dataset(vec![feature("bad", Some(square(628_000.0, 5_804_000.0, 1000.0)))], 4326);
        assert!(matches!(
            area_from_dataset(&ds).unwrap_err(),
            BoundaryError::GeometryParse { .. }
        ));
    }

    #[test]
    fn test_unclosed_ring_is_closed() {
        let open = json!({
            "type": "Polygon",
            "coordinates": [[[5.0, 52.0], [5.01, 52.0], [5.01, 52.01], [5.0, 52.01]]]
        });
        let ds = dataset(vec![feature("open", Some(open))], 4326);
        let aoi = area_from_dataset(&ds).unwrap();
        let ring = aoi.geometry.0[0].exterior();
        assert_eq!(ring.0.first(), ring.0.last());
    }
}
