//! KML (Keyhole Markup Language) format reader implementation
//!
//! Boundaries drawn in Google Earth arrive as KML. Coordinates are always WGS 84
//! longitude/latitude, optionally with an altitude that is dropped here.

use async_trait::async_trait;
use kml::Kml;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{BoundaryError, Result};
use crate::formats::validation::{pre_read_validation, FormatValidator};
use crate::formats::{FormatDataset, FormatFeature, FormatReader, FormatValidation};

/// KML format reader
pub struct KmlReader;

#[async_trait]
impl FormatReader for KmlReader {
    async fn read(&self, path: &Path) -> Result<FormatDataset> {
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let content = fs::read_to_string(path).map_err(|e| {
            BoundaryError::geometry(&source, format!("Failed to open KML file: {}", e))
        })?;

        let kml: Kml = content
            .parse()
            .map_err(|e| BoundaryError::geometry(&source, format!("Failed to parse KML: {}", e)))?;

        let mut features = Vec::new();
        let mut feature_counter = 0;
        self.extract_features_recursive(&kml, &mut features, &mut feature_counter, Vec::new())?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();

        Ok(FormatDataset {
            name,
            format_name: "KML".to_string(),
            crs: 4326,
            features,
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["kml"]
    }

    fn format_name(&self) -> &str {
        "KML"
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = pre_read_validation(path, self.supported_extensions());
        if !validation.is_valid() {
            return Ok(validation);
        }

        let xml_validation = FormatValidator::validate_xml_structure(path);
        Ok(FormatValidator::merge_validations(vec![validation, xml_validation]))
    }
}

impl KmlReader {
    /// Recursively extract features from documents and folders
    fn extract_features_recursive(
        &self,
        kml: &Kml,
        features: &mut Vec<FormatFeature>,
        counter: &mut usize,
        folder_path: Vec<String>,
    ) -> Result<()> {
        match kml {
            Kml::KmlDocument(doc) => {
                for element in &doc.elements {
                    self.extract_features_recursive(element, features, counter, folder_path.clone())?;
                }
            }
            Kml::Folder { attrs, elements } => {
                let mut new_path = folder_path.clone();
                if let Some(name) = attrs.get("name") {
                    new_path.push(name.clone());
                }
                for element in elements {
                    self.extract_features_recursive(element, features, counter, new_path.clone())?;
                }
            }
            Kml::Document { attrs: _, elements } => {
                for element in elements {
                    self.extract_features_recursive(element, features, counter, folder_path.clone())?;
                }
            }
            Kml::Placemark(placemark) => {
                if let Some(feature) = self.extract_placemark(placemark, *counter, &folder_path)? {
                    features.push(feature);
                    *counter += 1;
                }
            }
            _ => {
                // NetworkLink, GroundOverlay, styles: nothing to ingest
            }
        }

        Ok(())
    }

    /// Extract a feature from a KML Placemark
    fn extract_placemark(
        &self,
        placemark: &kml::types::Placemark,
        id: usize,
        folder_path: &[String],
    ) -> Result<Option<FormatFeature>> {
        let geometry = match &placemark.geometry {
            Some(geom) => self.convert_geometry(geom)?,
            None => return Ok(None),
        };

        let mut properties = HashMap::new();
        if let Some(name) = &placemark.name {
            properties.insert("name".to_string(), serde_json::json!(name));
        }
        if let Some(desc) = &placemark.description {
            properties.insert("description".to_string(), serde_json::json!(desc));
        }
        if !folder_path.is_empty() {
            properties.insert("folder_path".to_string(), serde_json::json!(folder_path.join("/")));
        }

        for child in &placemark.children {
            if child.name == "ExtendedData" {
                collect_extended_data(child, &mut properties);
            }
        }

        Ok(Some(FormatFeature {
            id: format!("placemark_{}", id),
            geometry: Some(geometry),
            properties,
        }))
    }

    /// Convert KML geometry to GeoJSON format
    fn convert_geometry(&self, geometry: &kml::types::Geometry) -> Result<serde_json::Value> {
        match geometry {
            kml::types::Geometry::Point(point) => Ok(serde_json::json!({
                "type": "Point",
                "coordinates": [point.coord.x, point.coord.y]
            })),
            kml::types::Geometry::LineString(linestring) => Ok(serde_json::json!({
                "type": "LineString",
                "coordinates": convert_coords(&linestring.coords)
            })),
            kml::types::Geometry::LinearRing(ring) => {
                // A bare LinearRing is a closed boundary; treat it as a polygon shell
                Ok(serde_json::json!({
                    "type": "Polygon",
                    "coordinates": [convert_coords(&ring.coords)]
                }))
            }
            kml::types::Geometry::Polygon(polygon) => {
                let mut rings = vec![convert_coords(&polygon.outer.coords)];
                for inner in &polygon.inner {
                    rings.push(convert_coords(&inner.coords));
                }
                Ok(serde_json::json!({
                    "type": "Polygon",
                    "coordinates": rings
                }))
            }
            kml::types::Geometry::MultiGeometry(multi) => {
                let geometries = multi
                    .geometries
                    .iter()
                    .map(|geom| self.convert_geometry(geom))
                    .collect::<Result<Vec<_>>>()?;
                Ok(serde_json::json!({
                    "type": "GeometryCollection",
                    "geometries": geometries
                }))
            }
            _ => Err(BoundaryError::geometry("KML", "Unsupported geometry type")),
        }
    }
}

/// 2D GeoJSON positions; altitude is not used for area boundaries
fn convert_coords(coords: &[kml::types::Coord]) -> Vec<serde_json::Value> {
    coords.iter().map(|c| serde_json::json!([c.x, c.y])).collect()
}

/// Pull `<Data name=".."><value>..</value></Data>` and
/// `<SimpleData name="..">..</SimpleData>` pairs out of an ExtendedData element.
fn collect_extended_data(
    element: &kml::types::Element,
    properties: &mut HashMap<String, serde_json::Value>,
) {
    for child in &element.children {
        match child.name.as_str() {
            "Data" => {
                let value = child
                    .children
                    .iter()
                    .find(|c| c.name == "value")
                    .and_then(|c| c.content.clone());
                if let (Some(key), Some(value)) = (child.attrs.get("name"), value) {
                    properties.insert(key.clone(), typed_value(&value));
                }
            }
            "SimpleData" => {
                if let (Some(key), Some(value)) = (child.attrs.get("name"), child.content.as_ref()) {
                    properties.insert(key.clone(), typed_value(value));
                }
            }
            _ => collect_extended_data(child, properties),
        }
    }
}

fn typed_value(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .map(|n| serde_json::json!(n))
        .unwrap_or_else(|_| serde_json::json!(trimmed))
}
