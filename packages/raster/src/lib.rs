#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raster source adapter for the solar siting pipeline.
//!
//! Rasters are never materialised by the caller. The pipeline builds lazy
//! [`RasterExpr`] trees over named layers and hands them to a
//! [`RasterBackend`], which evaluates them remotely (or in memory) and
//! returns only scalar statistics and tile URL templates.
//!
//! Two backends are provided:
//!
//! - [`http::HttpBackend`]: a remote bulk-compute service reached over
//!   HTTP. Used in production.
//! - [`memory::MemoryBackend`]: evaluates expressions over registered
//!   in-memory grids. Used for offline runs and tests.

pub mod catalog;
pub mod expr;
pub mod http;
pub mod memory;

use std::collections::BTreeMap;

use geo::Centroid as _;
use serde::{Deserialize, Serialize};
use solar_siting_suitability_models::{AreaOfInterest, BoundingBox, LayerName, Position};
use thiserror::Error;

pub use expr::{BinaryOp, LayerSource, RasterExpr};

/// Errors from raster backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request to the compute service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The compute service answered with a non-success status.
    #[error("Compute service error ({status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Message reported by the service.
        message: String,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Backend configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// A reduction would touch more pixels than allowed and best-effort
    /// down-sampling was not requested.
    #[error("Too many pixels in region: {pixels} > {max_pixels}")]
    TooManyPixels {
        /// Pixels the reduction would touch.
        pixels: u64,
        /// The configured cap.
        max_pixels: u64,
    },

    /// The backend has no data for a requested layer.
    #[error("Layer not available: {layer}")]
    MissingLayer {
        /// The requested layer.
        layer: LayerName,
    },

    /// The expression uses a construct this backend cannot evaluate.
    #[error("Unsupported expression: {message}")]
    Unsupported {
        /// Description.
        message: String,
    },
}

/// A named raster layer clipped to an area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayer {
    /// Which layer this is.
    pub name: LayerName,
    /// Lazy expression producing the clipped layer.
    pub expr: RasterExpr,
}

/// A named output band of a [`RasterImage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Band {
    /// Band name, used as the statistic key prefix.
    pub name: String,
    /// Expression producing the band.
    pub expression: RasterExpr,
}

/// A multi-band image submitted for reduction or tiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterImage {
    /// Bands, in output order.
    pub bands: Vec<Band>,
}

impl RasterImage {
    /// A single-band image.
    #[must_use]
    pub fn single(name: impl Into<String>, expression: RasterExpr) -> Self {
        Self {
            bands: vec![Band {
                name: name.into(),
                expression,
            }],
        }
    }
}

/// Zonal reducer applied over a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Minimum and maximum (`<band>_min`, `<band>_max`).
    MinMax,
    /// Minimum, maximum and mean (`<band>_min`, `<band>_max`, `<band>_mean`).
    MinMaxMean,
    /// Sum (`<band>`).
    Sum,
}

impl Reducer {
    /// Returns the statistic keys this reducer produces for a band.
    #[must_use]
    pub fn keys(self, band: &str) -> Vec<String> {
        match self {
            Self::MinMax => vec![format!("{band}_min"), format!("{band}_max")],
            Self::MinMaxMean => vec![
                format!("{band}_min"),
                format!("{band}_max"),
                format!("{band}_mean"),
            ],
            Self::Sum => vec![band.to_string()],
        }
    }
}

/// Resolution and size controls for a zonal reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceParams {
    /// Nominal pixel pitch in metres.
    pub scale: f64,
    /// Maximum number of pixels the reduction may touch.
    pub max_pixels: u64,
    /// Whether to coarsen the resolution instead of failing when the pixel
    /// cap would be exceeded.
    pub best_effort: bool,
}

/// Colour ramp used to render a raster into map tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    /// Value mapped to the first palette colour.
    pub min: f64,
    /// Value mapped to the last palette colour.
    pub max: f64,
    /// CSS colour names or hex codes.
    pub palette: Vec<String>,
}

/// Scalar statistics returned by a reduction.
///
/// Keys follow [`Reducer::keys`]. A key may be absent, or present with a
/// `None` value, when the region contained no unmasked pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statistics {
    values: BTreeMap<String, Option<f64>>,
}

impl Statistics {
    /// Records a statistic.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<f64>) {
        self.values.insert(key.into(), value);
    }

    /// Returns a statistic, or `None` if it is absent or null.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied().flatten()
    }

    /// Whether no statistics were returned at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Option<f64>)> for Statistics {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A geospatial compute backend able to evaluate raster expressions.
///
/// Implementations are shared across requests and must not keep
/// per-request state.
#[async_trait::async_trait]
pub trait RasterBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Resolves a stored (non-derived) layer to its source.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MissingLayer`] if the backend has no data for
    /// the layer.
    fn layer_source(&self, name: LayerName) -> Result<LayerSource, BackendError>;

    /// Returns a layer clipped to the given area of interest.
    ///
    /// Slope is derived from elevation; every other layer is read from
    /// [`RasterBackend::layer_source`].
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if a source layer is unavailable.
    fn fetch_layer(
        &self,
        name: LayerName,
        aoi: &AreaOfInterest,
    ) -> Result<RasterLayer, BackendError> {
        let base = match name {
            LayerName::Slope => {
                RasterExpr::source(self.layer_source(LayerName::Elevation)?).slope()
            }
            other => RasterExpr::source(self.layer_source(other)?),
        };
        Ok(RasterLayer {
            name,
            expr: base.clip(aoi.clone()),
        })
    }

    /// Reduces every band of `image` over `aoi`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if evaluation fails.
    async fn reduce_region(
        &self,
        image: &RasterImage,
        aoi: &AreaOfInterest,
        reducer: Reducer,
        params: &ReduceParams,
    ) -> Result<Statistics, BackendError>;

    /// Returns an `{z}/{x}/{y}` tile URL template rendering `image`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the map cannot be created.
    async fn tile_url(
        &self,
        image: &RasterImage,
        visualization: &Visualization,
    ) -> Result<String, BackendError>;

    /// Returns the `(lon, lat)` centroid of the area of interest.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Parse`] if the geometry has no centroid.
    async fn centroid(&self, aoi: &AreaOfInterest) -> Result<(f64, f64), BackendError> {
        if let Some(point) = aoi.to_polygon().centroid() {
            return Ok((point.x(), point.y()));
        }
        // Zero-area rings have no polygon centroid; fall back to the
        // mean of the distinct exterior positions.
        let exterior = aoi.exterior();
        let distinct = &exterior[..exterior.len() - 1];
        if distinct.is_empty() {
            return Err(BackendError::Parse {
                message: "AOI has no positions".to_string(),
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let n = distinct.len() as f64;
        let (lon, lat) = distinct
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p[0], y + p[1]));
        Ok((lon / n, lat / n))
    }

    /// Returns the corner rings of the area's bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Parse`] if the geometry has no positions.
    async fn bounding_box(&self, aoi: &AreaOfInterest) -> Result<Vec<Vec<Position>>, BackendError> {
        let bbox = BoundingBox::from_rings(aoi.rings()).ok_or_else(|| BackendError::Parse {
            message: "AOI has no positions".to_string(),
        })?;
        Ok(vec![bbox.to_ring()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reducer_key_naming() {
        assert_eq!(
            Reducer::MinMax.keys("elevation"),
            ["elevation_min", "elevation_max"]
        );
        assert_eq!(
            Reducer::MinMaxMean.keys("slope"),
            ["slope_min", "slope_max", "slope_mean"]
        );
        assert_eq!(Reducer::Sum.keys("Most Suitable"), ["Most Suitable"]);
    }

    #[test]
    fn statistics_treat_null_as_missing() {
        let mut stats = Statistics::default();
        stats.insert("a", Some(1.5));
        stats.insert("b", None);
        assert_eq!(stats.get("a"), Some(1.5));
        assert_eq!(stats.get("b"), None);
        assert_eq!(stats.get("c"), None);
    }

    #[test]
    fn statistics_deserialize_from_json_object() {
        let stats: Statistics =
            serde_json::from_value(serde_json::json!({ "x_min": 2.0, "x_max": null })).unwrap();
        assert_eq!(stats.get("x_min"), Some(2.0));
        assert_eq!(stats.get("x_max"), None);
    }
}
