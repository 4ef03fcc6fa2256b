//! Integration tests for CRS handling and format dispatch
//!
//! Verifies that:
//! - GeoJSON legacy `crs` members are honoured
//! - Missing CRS defaults to EPSG:4326
//! - KML always uses EPSG:4326
//! - The registry rejects undeclared extensions before reading

use agriboundary_core::error::BoundaryError;
use agriboundary_core::formats::*;
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_geojson_with_crs() {
    let reader = geojson::GeoJsonReader;
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("field.geojson");

    let content = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::32631" } },
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[628000, 5804000], [629000, 5804000], [629000, 5805000], [628000, 5804000]]]
                },
                "properties": {}
            }
        ]
    }"#;

    fs::write(&file_path, content).unwrap();
    let result = reader.read(&file_path).await.unwrap();

    assert_eq!(result.crs, 32631, "Should extract EPSG:32631 from CRS member");
    assert_eq!(result.features.len(), 1);
}

#[tokio::test]
async fn test_geojson_without_crs_defaults_to_4326() {
    let reader = geojson::GeoJsonReader;
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("field.json");

    let content = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[5.0, 52.0], [5.01, 52.0], [5.01, 52.01], [5.0, 52.0]]]
                },
                "properties": { "crop": "wheat" }
            }
        ]
    }"#;

    fs::write(&file_path, content).unwrap();
    let result = reader.read(&file_path).await.unwrap();

    assert_eq!(result.crs, 4326, "Should default to EPSG:4326 when CRS not specified");
    assert_eq!(result.features[0].properties["crop"], "wheat");
}

#[tokio::test]
async fn test_kml_always_uses_wgs84() {
    let registry = FormatRegistry::with_defaults();
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("farm.kml");

    let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Folder>
      <name>Fields</name>
      <Placemark>
        <name>North</name>
        <Polygon>
          <outerBoundaryIs>
            <LinearRing>
              <coordinates>5.0,52.0,0 5.01,52.0,0 5.01,52.01,0 5.0,52.0,0</coordinates>
            </LinearRing>
          </outerBoundaryIs>
        </Polygon>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

    fs::write(&file_path, content).unwrap();
    let result = registry.read(&file_path).await.unwrap();

    assert_eq!(result.crs, 4326, "KML should always use EPSG:4326");
    assert_eq!(result.format_name, "KML");
    assert_eq!(result.features.len(), 1);
    assert_eq!(result.features[0].properties["name"], "North");
    assert_eq!(result.features[0].properties["folder_path"], "Fields");
    assert_eq!(result.features[0].geometry.as_ref().unwrap()["type"], "Polygon");
}

#[tokio::test]
async fn test_registry_rejects_shapefile() {
    let registry = FormatRegistry::with_defaults();
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("fields.shp");
    fs::write(&file_path, b"not really a shapefile").unwrap();

    let err = registry.read(&file_path).await.unwrap_err();
    match err {
        BoundaryError::UnsupportedFormat { extension, supported } => {
            assert_eq!(extension, "shp");
            assert!(supported.contains(&"kml".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_kml_is_a_geometry_error() {
    let registry = FormatRegistry::with_defaults();
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("broken.kml");
    fs::write(&file_path, "<kml><Document><Placemark></Document></kml>").unwrap();

    let err = registry.read(&file_path).await.unwrap_err();
    assert!(matches!(err, BoundaryError::GeometryParse { .. }));
}
