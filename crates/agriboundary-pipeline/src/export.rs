//! Boundary export and re-import
//!
//! Detected boundaries leave the pipeline as a GeoJSON FeatureCollection or a
//! KML document, always in WGS 84. Both carry the cluster id of every polygon so
//! an exported file can be read back into an equivalent [`BoundarySet`].

use std::io::Cursor;
use std::path::Path;

use agriboundary_core::error::{BoundaryError, Result};
use agriboundary_core::formats::FormatRegistry;
use agriboundary_core::models::{BoundaryPolygon, BoundarySet, Crs};
use agriboundary_geo::aoi::{collect_polygons, parse_geometry};
use agriboundary_geo::transform::reproject_boundaries;
use geo::{LineString, Polygon};
use geojson::{Feature, FeatureCollection, Geometry};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

const DOCUMENT_NAME: &str = "detected_boundaries";
const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Export file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    GeoJson,
    Kml,
}

impl ExportFormat {
    /// Pick the format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "geojson" | "json" => Ok(ExportFormat::GeoJson),
            "kml" => Ok(ExportFormat::Kml),
            _ => Err(BoundaryError::Export {
                format: if extension.is_empty() { "file without extension".to_string() } else { extension },
                reason: "unsupported export format".to_string(),
            }),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Kml => "kml",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "GeoJSON",
            ExportFormat::Kml => "KML",
        }
    }
}

/// File name offered for a downloaded export
pub fn download_name(format: ExportFormat) -> String {
    format!("{}.{}", DOCUMENT_NAME, format.extension())
}

/// Serialize a boundary set, reprojecting to WGS 84 first when needed
pub fn export(set: &BoundarySet, format: ExportFormat) -> Result<Vec<u8>> {
    let set = in_wgs84(set, format.label())?;

    let bytes = match format {
        ExportFormat::GeoJson => to_geojson(&set).to_string().into_bytes(),
        ExportFormat::Kml => to_kml(&set)?,
    };

    debug!(format = format.label(), polygons = set.len(), bytes = bytes.len(), "Serialized boundaries");
    Ok(bytes)
}

/// Export to `path`, choosing the format from its extension
pub async fn write_export(set: &BoundarySet, path: &Path) -> Result<ExportFormat> {
    let format = ExportFormat::from_path(path)?;
    let bytes = export(set, format)?;
    tokio::fs::write(path, bytes).await.map_err(|e| BoundaryError::Export {
        format: format.label().to_string(),
        reason: format!("could not write {}: {}", path.display(), e),
    })?;
    info!(path = %path.display(), polygons = set.len(), "Wrote boundary export");
    Ok(format)
}

/// Read an exported file back into a boundary set
pub async fn import_boundaries(path: &Path, registry: &FormatRegistry) -> Result<BoundarySet> {
    let dataset = registry.read(path).await?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut polygons = Vec::new();
    for feature in &dataset.features {
        let Some(value) = &feature.geometry else {
            continue;
        };
        let geometry = parse_geometry(value).map_err(|e| BoundaryError::geometry(&source, e))?;

        let cluster_id = feature
            .properties
            .get("cluster_id")
            .and_then(cluster_value)
            .or_else(|| feature.properties.get("name").and_then(cluster_value));

        let mut parts = Vec::new();
        collect_polygons(geometry, &mut parts);
        if parts.is_empty() {
            warn!(feature = %feature.id, "Skipping non-polygon feature in export");
        }
        polygons.extend(parts.into_iter().map(|p| BoundaryPolygon::new(p, cluster_id)));
    }

    Ok(BoundarySet::new(polygons, Crs::from_epsg(dataset.crs)))
}

/// The set in WGS 84, reprojected when it is on a projected grid
pub(crate) fn in_wgs84(set: &BoundarySet, format: &str) -> Result<BoundarySet> {
    if set.crs.is_geographic() {
        return Ok(set.clone());
    }
    reproject_boundaries(set, &Crs::wgs84()).map_err(|e| BoundaryError::Export {
        format: format.to_string(),
        reason: e.to_string(),
    })
}

fn cluster_value(value: &JsonValue) -> Option<u32> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn to_geojson(set: &BoundarySet) -> FeatureCollection {
    let features = set
        .polygons
        .iter()
        .map(|boundary| {
            let mut properties = Map::new();
            properties.insert(
                "cluster_id".to_string(),
                boundary.cluster_id.map(JsonValue::from).unwrap_or(JsonValue::Null),
            );
            Feature {
                geometry: Some(Geometry::new(geojson::Value::from(&boundary.polygon))),
                properties: Some(properties),
                id: None,
                bbox: None,
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    }
}

fn to_kml(set: &BoundarySet) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(&mut writer, Event::Start(BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)])))?;
    emit(&mut writer, Event::Start(BytesStart::new("Document")))?;
    text_element(&mut writer, "name", DOCUMENT_NAME)?;

    for (index, boundary) in set.polygons.iter().enumerate() {
        let name = boundary
            .cluster_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("boundary_{}", index + 1));

        emit(&mut writer, Event::Start(BytesStart::new("Placemark")))?;
        text_element(&mut writer, "name", &name)?;

        if let Some(id) = boundary.cluster_id {
            emit(&mut writer, Event::Start(BytesStart::new("ExtendedData")))?;
            emit(
                &mut writer,
                Event::Start(BytesStart::new("Data").with_attributes([("name", "cluster_id")])),
            )?;
            text_element(&mut writer, "value", &id.to_string())?;
            emit(&mut writer, Event::End(BytesEnd::new("Data")))?;
            emit(&mut writer, Event::End(BytesEnd::new("ExtendedData")))?;
        }

        write_polygon(&mut writer, &boundary.polygon)?;
        emit(&mut writer, Event::End(BytesEnd::new("Placemark")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("Document")))?;
    emit(&mut writer, Event::End(BytesEnd::new("kml")))?;
    Ok(writer.into_inner().into_inner())
}

fn write_polygon(writer: &mut Writer<Cursor<Vec<u8>>>, polygon: &Polygon<f64>) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new("Polygon")))?;
    write_ring(writer, "outerBoundaryIs", polygon.exterior())?;
    for hole in polygon.interiors() {
        write_ring(writer, "innerBoundaryIs", hole)?;
    }
    emit(writer, Event::End(BytesEnd::new("Polygon")))
}

fn write_ring(writer: &mut Writer<Cursor<Vec<u8>>>, boundary: &str, ring: &LineString<f64>) -> Result<()> {
    let coordinates = ring
        .coords()
        .map(|c| format!("{},{}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(" ");

    emit(writer, Event::Start(BytesStart::new(boundary)))?;
    emit(writer, Event::Start(BytesStart::new("LinearRing")))?;
    text_element(writer, "coordinates", &coordinates)?;
    emit(writer, Event::End(BytesEnd::new("LinearRing")))?;
    emit(writer, Event::End(BytesEnd::new(boundary)))
}

fn text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(tag)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(tag)))
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(|e| BoundaryError::Export {
        format: "KML".to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn field(x: f64, y: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + 0.01, y: y),
            (x: x + 0.01, y: y + 0.01),
            (x: x, y: y + 0.01),
            (x: x, y: y),
        ]
    }

    fn two_fields() -> BoundarySet {
        BoundarySet::new(
            vec![
                BoundaryPolygon::new(field(5.0, 52.0), Some(3)),
                BoundaryPolygon::new(field(5.02, 52.0), Some(7)),
            ],
            Crs::wgs84(),
        )
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.KML")).unwrap(), ExportFormat::Kml);
        assert_eq!(ExportFormat::from_path(Path::new("out.geojson")).unwrap(), ExportFormat::GeoJson);
        assert!(matches!(
            ExportFormat::from_path(Path::new("out.shp")),
            Err(BoundaryError::Export { .. })
        ));
        assert_eq!(download_name(ExportFormat::Kml), "detected_boundaries.kml");
    }

    #[test]
    fn test_geojson_carries_cluster_ids() {
        let bytes = export(&two_fields(), ExportFormat::GeoJson).unwrap();
        let json: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().unwrap().len(), 2);
        assert_eq!(json["features"][1]["properties"]["cluster_id"], 7);
        assert_eq!(json["features"][0]["geometry"]["type"], "Polygon");
    }

    #[test]
    fn test_kml_document_structure() {
        let bytes = export(&two_fields(), ExportFormat::Kml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<name>detected_boundaries</name>"));
        assert_eq!(text.matches("<Placemark>").count(), 2);
        assert!(text.contains("<Data name=\"cluster_id\">"));
        assert!(text.contains("<name>3</name>"));
        assert!(text.contains("<coordinates>5,52 "));
    }

    #[test]
    fn test_projected_set_is_exported_in_wgs84() {
        let utm = BoundarySet::new(
            vec![BoundaryPolygon::new(
                polygon![
                    (x: 628000.0, y: 5804000.0),
                    (x: 629000.0, y: 5804000.0),
                    (x: 629000.0, y: 5805000.0),
                    (x: 628000.0, y: 5805000.0),
                    (x: 628000.0, y: 5804000.0),
                ],
                Some(1),
            )],
            Crs::from_epsg(32631),
        );
        let bytes = export(&utm, ExportFormat::GeoJson).unwrap();
        let json: JsonValue = serde_json::from_slice(&bytes).unwrap();
        let lon = json["features"][0]["geometry"]["coordinates"][0][0][0].as_f64().unwrap();
        let lat = json["features"][0]["geometry"]["coordinates"][0][0][1].as_f64().unwrap();
        assert!((4.0..6.0).contains(&lon), "lon was {}", lon);
        assert!((52.0..53.0).contains(&lat), "lat was {}", lat);
    }

    #[tokio::test]
    async fn test_kml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detected_boundaries.kml");
        let set = two_fields();

        assert_eq!(write_export(&set, &path).await.unwrap(), ExportFormat::Kml);
        let back = import_boundaries(&path, &FormatRegistry::default()).await.unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back.cluster_ids(), vec![Some(3), Some(7)]);
        assert_eq!(back.polygons[0].polygon, set.polygons[0].polygon);
    }

    #[tokio::test]
    async fn test_geojson_round_trip_without_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");
        let set = BoundarySet::new(vec![BoundaryPolygon::new(field(1.0, 1.0), None)], Crs::wgs84());

        write_export(&set, &path).await.unwrap();
        let back = import_boundaries(&path, &FormatRegistry::default()).await.unwrap();
        assert_eq!(back.cluster_ids(), vec![None]);
        assert_eq!(back.crs, Crs::wgs84());
    }
}
