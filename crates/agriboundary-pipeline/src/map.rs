//! Interactive map output
//!
//! A finished run is shown on a standalone Leaflet page: satellite basemap with
//! labels, the uploaded area outline, a preview of the composite and the detected
//! boundaries. Everything the page needs except the basemap tiles is inlined.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::io::Cursor;
use std::path::Path;

use agriboundary_core::error::{BoundaryError, Result};
use agriboundary_core::models::{
    AreaOfInterest, BoundarySet, Composite, Crs, GridSpec, VISUAL_BANDS,
};
use agriboundary_geo::transform::Transformer;
use agriboundary_segment::tile::{render_rgba, STRETCH_MAX, STRETCH_MIN};
use base64::Engine;
use geo::{Coord, Rect};
use geojson::Geometry;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use crate::export::{in_wgs84, to_geojson};

const MAP_FORMAT: &str = "HTML map";
const DEFAULT_ZOOM: u8 = 13;
const AREA_COLOR: &str = "yellow";
const LEAFLET_VERSION: &str = "1.9.4";

/// How a composite is drawn
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStyle {
    pub bands: [String; 3],
    pub min: f32,
    pub max: f32,
}

impl Default for RasterStyle {
    fn default() -> Self {
        Self {
            bands: VISUAL_BANDS.map(String::from),
            min: STRETCH_MIN,
            max: STRETCH_MAX,
        }
    }
}

/// How polygons are outlined
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStyle {
    pub color: String,
    pub width: u32,
}

impl Default for VectorStyle {
    fn default() -> Self {
        Self {
            color: "red".to_string(),
            width: 2,
        }
    }
}

#[derive(Debug, Clone)]
enum MapLayer {
    Vector {
        name: String,
        geojson: JsonValue,
        style: VectorStyle,
    },
    Raster {
        name: String,
        data_url: String,
        bounds: Rect<f64>,
    },
}

/// Map centred on an area with layers stacked in insertion order
#[derive(Debug, Clone)]
pub struct MapView {
    center: (f64, f64),
    zoom: u8,
    layers: Vec<MapLayer>,
}

impl MapView {
    /// Centre on the area's centroid and draw its outline
    pub fn for_area(aoi: &AreaOfInterest) -> Result<Self> {
        let center = aoi.centroid().map(|c| (c.y, c.x)).unwrap_or((0.0, 0.0));
        let mut view = Self {
            center,
            zoom: DEFAULT_ZOOM,
            layers: Vec::new(),
        };
        view.add_area(aoi)?;
        Ok(view)
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn add_area(&mut self, aoi: &AreaOfInterest) -> Result<()> {
        let geometry = Geometry::new(geojson::Value::from(&aoi.geometry));
        let geojson = serde_json::to_value(&geometry).map_err(map_error)?;
        self.layers.push(MapLayer::Vector {
            name: format!("Area of interest ({})", aoi.source_name),
            geojson,
            style: VectorStyle {
                color: AREA_COLOR.to_string(),
                width: 2,
            },
        });
        Ok(())
    }

    /// Add a PNG preview of the composite, resampled onto its WGS 84 footprint
    pub fn add_composite(&mut self, composite: &Composite, style: &RasterStyle) -> Result<()> {
        let bands = [style.bands[0].as_str(), style.bands[1].as_str(), style.bands[2].as_str()];
        let image = render_rgba(composite, bands, style.min, style.max).ok_or_else(|| BoundaryError::Export {
            format: MAP_FORMAT.to_string(),
            reason: format!("composite lacks one of the bands {}", bands.join(", ")),
        })?;

        let (image, bounds) = warp_to_wgs84(&image, &composite.grid).map_err(map_error)?;

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(map_error)?;

        debug!(bytes = png.len(), "Encoded composite preview");
        self.layers.push(MapLayer::Raster {
            name: "Sentinel-2 Imagery".to_string(),
            data_url: format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(&png)
            ),
            bounds,
        });
        Ok(())
    }

    pub fn add_boundaries(&mut self, set: &BoundarySet, style: &VectorStyle) -> Result<()> {
        let set = in_wgs84(set, MAP_FORMAT)?;
        let geojson = serde_json::to_value(to_geojson(&set)).map_err(map_error)?;
        self.layers.push(MapLayer::Vector {
            name: "Detected Boundaries".to_string(),
            geojson,
            style: style.clone(),
        });
        Ok(())
    }

    /// Standalone Leaflet page
    pub fn render_html(&self) -> Result<String> {
        let mut layer_js = String::new();
        for layer in &self.layers {
            let script = match layer {
                MapLayer::Vector { name, geojson, style } => format!(
                    "overlays[{name}] = L.geoJSON({data}, {{ style: {{ color: {color}, weight: {width}, fill: false }} }}).addTo(map);\n",
                    name = script_literal(&json!(name))?,
                    data = script_literal(geojson)?,
                    color = script_literal(&json!(style.color))?,
                    width = style.width,
                ),
                MapLayer::Raster { name, data_url, bounds } => format!(
                    "overlays[{name}] = L.imageOverlay({url}, [[{south}, {west}], [{north}, {east}]]).addTo(map);\n",
                    name = script_literal(&json!(name))?,
                    url = script_literal(&json!(data_url))?,
                    south = bounds.min().y,
                    west = bounds.min().x,
                    north = bounds.max().y,
                    east = bounds.max().x,
                ),
            };
            layer_js.push_str(&script);
        }

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Field Boundaries</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@{version}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{version}/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map('map').setView([{lat}, {lon}], {zoom});
var imagery = L.tileLayer('https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{{z}}/{{y}}/{{x}}', {{ attribution: 'Esri World Imagery', maxZoom: 19 }}).addTo(map);
var labels = L.tileLayer('https://server.arcgisonline.com/ArcGIS/rest/services/Reference/World_Boundaries_and_Places/MapServer/tile/{{z}}/{{y}}/{{x}}', {{ maxZoom: 19 }}).addTo(map);
var overlays = {{}};
{layers}L.control.layers({{ 'Hybrid': L.layerGroup([imagery, labels]) }}, overlays).addTo(map);
</script>
</body>
</html>
"#,
            version = LEAFLET_VERSION,
            lat = self.center.0,
            lon = self.center.1,
            zoom = self.zoom,
            layers = layer_js,
        ))
    }

    pub async fn write_html(&self, path: &Path) -> Result<()> {
        let html = self.render_html()?;
        tokio::fs::write(path, html).await.map_err(|e| BoundaryError::Export {
            format: MAP_FORMAT.to_string(),
            reason: format!("could not write {}: {}", path.display(), e),
        })?;
        info!(path = %path.display(), layers = self.layers.len(), "Wrote map");
        Ok(())
    }
}

/// Resample a grid-aligned image onto the Web Mercator raster Leaflet stretches an
/// image overlay across, returning it with its WGS 84 bounds.
///
/// Nearest neighbour; output pixels outside the source grid are transparent.
pub fn warp_to_wgs84(image: &RgbaImage, grid: &GridSpec) -> Result<(RgbaImage, Rect<f64>)> {
    let bounds = Transformer::new(&grid.crs, &Crs::wgs84())?.rect(grid.bounds())?;
    let inverse = Transformer::new(&Crs::wgs84(), &grid.crs)?;
    let (width, height) = image.dimensions();
    let t = &grid.transform;

    let (west, east) = (bounds.min().x, bounds.max().x);
    let (north, south) = (mercator_y(bounds.max().y), mercator_y(bounds.min().y));

    let mut warped = RgbaImage::new(width, height);
    for row in 0..height {
        let y = north - (row as f64 + 0.5) / height as f64 * (north - south);
        let lat = inverse_mercator_y(y);
        for col in 0..width {
            let lon = west + (col as f64 + 0.5) / width as f64 * (east - west);
            let source = inverse.coord(Coord { x: lon, y: lat })?;
            let src_col = ((source.x - t.origin_x) / t.pixel_size).floor();
            let src_row = ((t.origin_y - source.y) / t.pixel_size).floor();
            if src_col >= 0.0 && src_row >= 0.0 && src_col < width as f64 && src_row < height as f64 {
                warped.put_pixel(col, row, *image.get_pixel(src_col as u32, src_row as u32));
            }
        }
    }
    Ok((warped, bounds))
}

fn mercator_y(lat: f64) -> f64 {
    (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln()
}

fn inverse_mercator_y(y: f64) -> f64 {
    (2.0 * y.exp().atan() - FRAC_PI_2).to_degrees()
}

/// JSON text that is safe inside a `<script>` element
fn script_literal(value: &JsonValue) -> Result<String> {
    let text = serde_json::to_string(value).map_err(map_error)?;
    Ok(text.replace("</", "<\\/"))
}

fn map_error(e: impl std::fmt::Display) -> BoundaryError {
    BoundaryError::Export {
        format: MAP_FORMAT.to_string(),
        reason: e.to_string(),
    }
}
