//! Remote bulk-compute service client.
//!
//! - Health: `GET {base}/v1/health`
//! - Reduce: `POST {base}/v1/projects/{project}/reduce`
//! - Maps: `POST {base}/v1/projects/{project}/maps`
//!
//! Geometries are sent as `GeoJSON` polygons. Failed requests answer with
//! `{"error": {"message": "..."}}`.

use std::time::Duration;

use serde::Serialize;
use solar_siting_suitability_models::{AreaOfInterest, LayerName};

use crate::{
    BackendError, LayerSource, RasterBackend, RasterImage, ReduceParams, Reducer, Statistics,
    Visualization, catalog::Catalog,
};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for [`HttpBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBackendSettings {
    /// Service root, without a trailing slash.
    pub base_url: String,
    /// Project the computation is billed to.
    pub project: String,
    /// Bearer token, if the service requires one.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpBackendSettings {
    /// Reads settings from `RASTER_BACKEND_URL`, `RASTER_BACKEND_PROJECT`,
    /// `RASTER_BACKEND_TOKEN` and `RASTER_BACKEND_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if the URL or project is unset, or
    /// the timeout is not a whole number of seconds.
    pub fn from_env() -> Result<Self, BackendError> {
        let base_url = required_env("RASTER_BACKEND_URL")?;
        let project = required_env("RASTER_BACKEND_PROJECT")?;
        let token = std::env::var("RASTER_BACKEND_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        let timeout_secs = match std::env::var("RASTER_BACKEND_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|e| BackendError::Config {
                message: format!("Invalid RASTER_BACKEND_TIMEOUT_SECS '{raw}': {e}"),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project,
            token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn required_env(key: &str) -> Result<String, BackendError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(BackendError::Config {
            message: format!("{key} is not set"),
        }),
    }
}

/// A [`RasterBackend`] backed by the remote compute service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    settings: HttpBackendSettings,
    catalog: Catalog,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReduceRequest<'a> {
    expression: &'a RasterImage,
    geometry: geojson::Geometry,
    reducer: Reducer,
    #[serde(flatten)]
    params: &'a ReduceParams,
}

#[derive(Serialize)]
struct MapRequest<'a> {
    expression: &'a RasterImage,
    visualization: &'a Visualization,
}

impl HttpBackend {
    /// Creates a client without contacting the service.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: HttpBackendSettings, catalog: Catalog) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            settings,
            catalog,
        })
    }

    /// Creates a client and verifies the service is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the client cannot be built or the health
    /// check fails.
    pub async fn connect(
        settings: HttpBackendSettings,
        catalog: Catalog,
    ) -> Result<Self, BackendError> {
        let backend = Self::new(settings, catalog)?;
        backend.health().await?;
        log::info!(
            "Connected to raster compute service at {} (project {})",
            backend.settings.base_url,
            backend.settings.project
        );
        Ok(backend)
    }

    /// Checks the service health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the request fails or the service reports
    /// an error status.
    pub async fn health(&self) -> Result<(), BackendError> {
        let url = format!("{}/v1/health", self.settings.base_url);
        let resp = self.authorize(self.client.get(&url)).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        check_status(status, &body)
    }

    fn project_url(&self, endpoint: &str) -> String {
        format!(
            "{}/v1/projects/{}/{endpoint}",
            self.settings.base_url, self.settings.project
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<serde_json::Value, BackendError> {
        let url = self.project_url(endpoint);
        log::debug!("POST {url}");
        let resp = self
            .authorize(self.client.post(&url))
            .json(payload)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        check_status(status, &body)?;
        serde_json::from_str(&body).map_err(|e| BackendError::Parse {
            message: format!("Invalid JSON from {endpoint}: {e}"),
        })
    }
}

#[async_trait::async_trait]
impl RasterBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    fn layer_source(&self, name: LayerName) -> Result<LayerSource, BackendError> {
        self.catalog.source(name)
    }

    async fn reduce_region(
        &self,
        image: &RasterImage,
        aoi: &AreaOfInterest,
        reducer: Reducer,
        params: &ReduceParams,
    ) -> Result<Statistics, BackendError> {
        let request = ReduceRequest {
            expression: image,
            geometry: to_geometry(aoi),
            reducer,
            params,
        };
        let body = self.post_json("reduce", &request).await?;
        parse_reduce_response(&body)
    }

    async fn tile_url(
        &self,
        image: &RasterImage,
        visualization: &Visualization,
    ) -> Result<String, BackendError> {
        let request = MapRequest {
            expression: image,
            visualization,
        };
        let body = self.post_json("maps", &request).await?;
        parse_map_response(&body)
    }
}

/// Converts an area of interest into a `GeoJSON` polygon geometry.
#[must_use]
pub fn to_geometry(aoi: &AreaOfInterest) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(&aoi.to_polygon()))
}

/// Maps a non-success status and its body to [`BackendError::Remote`].
fn check_status(status: u16, body: &str) -> Result<(), BackendError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(BackendError::Remote {
        status,
        message: parse_error_message(body),
    })
}

/// Extracts `error.message` from an error body, falling back to the raw
/// text.
fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match &v["error"] {
            serde_json::Value::String(s) => Some(s.clone()),
            other => other["message"].as_str().map(String::from),
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parses `{"values": {key: number | null}}`.
fn parse_reduce_response(body: &serde_json::Value) -> Result<Statistics, BackendError> {
    let values = body["values"]
        .as_object()
        .ok_or_else(|| BackendError::Parse {
            message: "Missing values object".to_string(),
        })?;

    values
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::Null => Ok((key.clone(), None)),
            other => other
                .as_f64()
                .map(|v| (key.clone(), Some(v)))
                .ok_or_else(|| BackendError::Parse {
                    message: format!("Statistic '{key}' is not a number: {other}"),
                }),
        })
        .collect()
}

/// Parses `{"urlFormat": "..."}`.
fn parse_map_response(body: &serde_json::Value) -> Result<String, BackendError> {
    body["urlFormat"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| BackendError::Parse {
            message: "Missing urlFormat".to_string(),
        })
}
