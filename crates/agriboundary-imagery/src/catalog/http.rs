//! Remote compute-service catalog

use agriboundary_core::auth::Session;
use agriboundary_core::error::{BoundaryError, Result, Stage};
use agriboundary_core::models::{BandLayer, Composite, GridSpec, ImageryRequest};
use agriboundary_core::ports::ImageryCatalog;
use agriboundary_geo::transform::utm_crs_for;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on establishing the connection, within the overall timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Catalog backed by a remote geospatial compute service.
///
/// The service runs filtering, QA masking and median reduction next to the
/// archive and returns the finished composite on a UTM grid chosen here.
pub struct HttpCatalog {
    /// Base URL of the service (e.g., "https://compute.example.org")
    base_url: String,

    session: Session,

    client: reqwest::Client,

    timeout: Duration,
}

impl HttpCatalog {
    /// Catalog whose calls are abandoned after `timeout`
    pub fn new(base_url: impl Into<String>, session: Session, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(CONNECT_TIMEOUT))
            .build()
            .map_err(|e| {
                BoundaryError::service(
                    Stage::Acquisition,
                    "compute service",
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            client,
            timeout,
        })
    }

    fn transport_error(&self, e: reqwest::Error, action: &str) -> BoundaryError {
        let reason = if e.is_timeout() {
            warn!(timeout_secs = self.timeout.as_secs_f64(), "Compute service timed out");
            format!(
                "{} timed out after {:.1}s waiting on {}",
                action,
                self.timeout.as_secs_f64(),
                self.base_url
            )
        } else {
            format!("{} failed against {}: {}", action, self.base_url, e)
        };
        BoundaryError::service(Stage::Acquisition, self.name(), reason)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/composite", self.base_url)
    }

    /// Request body for one composite
    pub fn request_body(&self, request: &ImageryRequest) -> Result<CompositeRequestBody> {
        let centroid = request.area.centroid().ok_or_else(|| {
            BoundaryError::invalid("area", "area of interest has no centroid")
        })?;
        let geometry = geojson::Geometry::new(geojson::Value::from(&request.area.geometry));
        let area = serde_json::to_value(&geometry)
            .map_err(|e| BoundaryError::Serialization(format!("Failed to encode area: {}", e)))?;

        Ok(CompositeRequestBody {
            collection: request.collection.clone(),
            area,
            start: request.start,
            end: request.end,
            cloud_max_pct: request.cloud_max_pct,
            bands: request.bands.clone(),
            scale: request.scale_m,
            crs: utm_crs_for(centroid.x, centroid.y).authority(),
            project: self.session.project_id().map(str::to_string),
        })
    }
}

#[async_trait]
impl ImageryCatalog for HttpCatalog {
    async fn composite(&self, request: &ImageryRequest) -> Result<Composite> {
        let bearer = self.session.authorize()?;

        let body = self.request_body(request)?;
        info!(url = %self.endpoint(), crs = %body.crs, "Requesting composite");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "Request"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BoundaryError::ImageryUnavailable { filters: request.filter_summary() });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BoundaryError::service(
                Stage::Acquisition,
                self.name(),
                format!("Credentials rejected ({}): {}", status, error_text),
            ));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BoundaryError::service(
                Stage::Acquisition,
                self.name(),
                format!("Compute service error ({}): {}", status, error_text),
            ));
        }

        let payload: CompositeResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e, "Reading the composite")
            } else {
                BoundaryError::service(
                    Stage::Acquisition,
                    self.name(),
                    format!("Failed to parse composite response: {}", e),
                )
            }
        })?;
        debug!(scenes = payload.scene_count, "Composite received");

        decode_composite(payload, request)
    }

    fn name(&self) -> &str {
        "compute service"
    }
}

/// Body of `POST /v1/composite`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositeRequestBody {
    pub collection: String,
    /// GeoJSON geometry in WGS 84
    pub area: serde_json::Value,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cloud_max_pct: f64,
    pub bands: Vec<String>,
    pub scale: f64,
    /// Output grid CRS
    pub crs: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Response of `POST /v1/composite`; masked pixels are `null`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResponse {
    pub scene_count: usize,
    pub grid: GridSpec,
    #[serde(default)]
    pub bands: Vec<WireBand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireBand {
    pub name: String,
    pub values: Vec<Option<f32>>,
}

/// Validate a service response and turn it into a composite
pub fn decode_composite(payload: CompositeResponse, request: &ImageryRequest) -> Result<Composite> {
    if payload.scene_count == 0 {
        return Err(BoundaryError::ImageryUnavailable { filters: request.filter_summary() });
    }

    let expected = payload.grid.len();
    let mut bands = Vec::with_capacity(payload.bands.len());
    for band in payload.bands {
        if band.values.len() != expected {
            return Err(BoundaryError::service(
                Stage::Acquisition,
                "compute service",
                format!(
                    "band {} has {} pixels, expected {}x{}",
                    band.name,
                    band.values.len(),
                    payload.grid.width,
                    payload.grid.height
                ),
            ));
        }
        let values = band.values.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect();
        bands.push(BandLayer { name: band.name, values });
    }

    for name in &request.bands {
        if !bands.iter().any(|b| &b.name == name) {
            return Err(BoundaryError::service(
                Stage::Acquisition,
                "compute service",
                format!("response is missing band {}", name),
            ));
        }
    }

    Ok(Composite { grid: payload.grid, bands, scene_count: payload.scene_count })
}
