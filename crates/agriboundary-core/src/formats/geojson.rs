//! GeoJSON format reader implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{BoundaryError, Result};
use crate::formats::validation::{pre_read_validation, FormatValidator};
use crate::formats::{FormatDataset, FormatFeature, FormatReader, FormatValidation};

/// GeoJSON format reader
pub struct GeoJsonReader;

#[async_trait]
impl FormatReader for GeoJsonReader {
    async fn read(&self, path: &Path) -> Result<FormatDataset> {
        let source = file_label(path);
        let content = fs::read_to_string(path).map_err(BoundaryError::Io)?;

        let geojson: geojson::GeoJson = content
            .parse()
            .map_err(|e| BoundaryError::geometry(&source, format!("Failed to parse GeoJSON: {}", e)))?;

        let (features, crs) = self.extract_features_and_crs(&geojson)?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();

        Ok(FormatDataset {
            name,
            format_name: "GeoJSON".to_string(),
            crs,
            features,
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json", "geojson"]
    }

    fn format_name(&self) -> &str {
        "GeoJSON"
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = pre_read_validation(path, self.supported_extensions());
        if !validation.is_valid() {
            return Ok(validation);
        }

        let json_validation = FormatValidator::validate_json_structure(path);
        Ok(FormatValidator::merge_validations(vec![validation, json_validation]))
    }
}

impl GeoJsonReader {
    /// Extract features and CRS from GeoJSON
    fn extract_features_and_crs(
        &self,
        geojson: &geojson::GeoJson,
    ) -> Result<(Vec<FormatFeature>, u32)> {
        match geojson {
            geojson::GeoJson::FeatureCollection(fc) => {
                let features = fc
                    .features
                    .iter()
                    .enumerate()
                    .map(|(idx, feature)| self.convert_feature(feature, idx))
                    .collect();

                // Legacy "crs" member; RFC 7946 files are always WGS 84
                let crs = fc
                    .foreign_members
                    .as_ref()
                    .and_then(|fm| fm.get("crs"))
                    .and_then(extract_epsg_from_crs)
                    .unwrap_or(4326);

                Ok((features, crs))
            }
            geojson::GeoJson::Feature(feature) => {
                let crs = feature
                    .foreign_members
                    .as_ref()
                    .and_then(|fm| fm.get("crs"))
                    .and_then(extract_epsg_from_crs)
                    .unwrap_or(4326);
                Ok((vec![self.convert_feature(feature, 0)], crs))
            }
            geojson::GeoJson::Geometry(geom) => {
                let geometry_json = serde_json::to_value(geom).map_err(|e| {
                    BoundaryError::Serialization(format!("Failed to serialize geometry: {}", e))
                })?;

                let feature = FormatFeature {
                    id: "0".to_string(),
                    geometry: Some(geometry_json),
                    properties: HashMap::new(),
                };

                Ok((vec![feature], 4326))
            }
        }
    }

    /// Convert a GeoJSON feature to FormatFeature
    fn convert_feature(&self, feature: &geojson::Feature, idx: usize) -> FormatFeature {
        let id = feature
            .id
            .as_ref()
            .map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            })
            .unwrap_or_else(|| idx.to_string());

        let geometry = feature.geometry.as_ref().and_then(|geom| serde_json::to_value(geom).ok());

        let properties = feature
            .properties
            .as_ref()
            .map(|props| props.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        FormatFeature { id, geometry, properties }
    }
}

/// Extract EPSG code from a legacy CRS object such as
/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32633"}}`
fn extract_epsg_from_crs(crs: &serde_json::Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    name.rsplit(':').next()?.parse().ok()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string()
}
