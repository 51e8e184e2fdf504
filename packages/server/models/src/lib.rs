#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the solar siting server.
//!
//! Field names follow the JSON contract consumed by the map client, which
//! is why the chart rows use capitalised keys.

use serde::{Deserialize, Serialize};
use solar_siting_suitability::pipeline::AnalysisReport;
use solar_siting_suitability_models::SuitabilityClass;

/// Body of `POST /perform_analysis`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// `GeoJSON` polygon coordinates: rings of `[lon, lat]` positions.
    #[serde(default)]
    pub aoi_coordinates: Option<Vec<Vec<Vec<f64>>>>,
}

/// One bar of the per-class area chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    /// Class display name.
    #[serde(rename = "Suitability")]
    pub suitability: SuitabilityClass,
    /// Area in km², rounded to 2 decimals.
    #[serde(rename = "Area")]
    pub area: f64,
    /// Series key (same as the class name).
    #[serde(rename = "Type")]
    pub kind: SuitabilityClass,
}

/// Successful analysis response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Always `"success"`.
    pub status: String,
    /// Suitability tile URL template.
    pub suitability_tile_url: String,
    /// Solar radiation tile URL template.
    pub solar_radiation_tile_url: String,
    /// Area per class, most suitable first.
    pub chart_data: Vec<ChartRow>,
    /// Lowest elevation in metres.
    pub elevation_min: f64,
    /// Highest elevation in metres.
    pub elevation_max: f64,
    /// Lowest slope in degrees.
    pub slope_min: f64,
    /// Highest slope in degrees.
    pub slope_max: f64,
    /// Mean slope in degrees.
    pub slope_mean: f64,
    /// Estimated annual energy in MWh.
    pub power_generation_mwh: f64,
    /// Estimated panel count.
    pub num_panels: u64,
    /// `[lat, lon]`
    pub map_center: [f64; 2],
    /// Web-map zoom level.
    pub map_zoom: u8,
}

impl From<AnalysisReport> for AnalysisResponse {
    fn from(report: AnalysisReport) -> Self {
        Self {
            status: "success".to_string(),
            chart_data: report
                .areas
                .iter()
                .map(|(class, area)| ChartRow {
                    suitability: class,
                    area,
                    kind: class,
                })
                .collect(),
            suitability_tile_url: report.suitability_tile_url,
            solar_radiation_tile_url: report.solar_radiation_tile_url,
            elevation_min: report.elevation_min,
            elevation_max: report.elevation_max,
            slope_min: report.slope_min,
            slope_max: report.slope_max,
            slope_mean: report.slope_mean,
            power_generation_mwh: report.yield_estimate.power_generation_mwh,
            num_panels: report.yield_estimate.num_panels,
            map_center: [report.frame.center_lat, report.frame.center_lon],
            map_zoom: report.frame.zoom,
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// `"ready"` or `"unavailable"`.
    pub backend: String,
}

/// One entry of the suitability legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClass {
    /// Raster value (1-4).
    pub value: u8,
    /// Display name.
    pub name: String,
    /// Palette colour.
    pub color: String,
}

impl From<SuitabilityClass> for ApiClass {
    fn from(class: SuitabilityClass) -> Self {
        Self {
            value: class.value(),
            name: class.to_string(),
            color: class.color().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use solar_siting_suitability::estimate::YieldEstimate;
    use solar_siting_suitability_models::{AreaByClass, ViewportFrame};

    use super::*;

    #[test]
    fn response_uses_client_field_names() {
        let report = AnalysisReport {
            suitability_tile_url: "https://t/s/{z}/{x}/{y}".to_string(),
            solar_radiation_tile_url: "https://t/r/{z}/{x}/{y}".to_string(),
            areas: AreaByClass::from_fn(|c| f64::from(c.value())),
            elevation_min: 31.0,
            elevation_max: 120.0,
            slope_min: 0.0,
            slope_max: 12.5,
            slope_mean: 3.25,
            yield_estimate: YieldEstimate {
                power_generation_mwh: 433.5,
                num_panels: 1_445_000,
            },
            frame: ViewportFrame {
                center_lat: 20.5,
                center_lon: 10.5,
                zoom: 8,
            },
        };

        let json = serde_json::to_value(AnalysisResponse::from(report)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["chart_data"][0]["Suitability"], "Most Suitable");
        assert_eq!(json["chart_data"][0]["Type"], "Most Suitable");
        assert_eq!(json["chart_data"][3]["Area"], 4.0);
        assert_eq!(json["map_center"], serde_json::json!([20.5, 10.5]));
        assert_eq!(json["map_zoom"], 8);
        assert_eq!(json["num_panels"], 1_445_000);
        assert_eq!(json["slope_mean"], 3.25);
    }

    #[test]
    fn request_tolerates_missing_coordinates() {
        let request: AnalysisRequest = serde_json::from_str("{}").unwrap();
        assert!(request.aoi_coordinates.is_none());
    }

    #[test]
    fn legend_entry() {
        let class = ApiClass::from(SuitabilityClass::LessSuitable);
        assert_eq!(class.value, 3);
        assert_eq!(class.name, "Less Suitable");
        assert_eq!(class.color, "#AB2103");
    }
}
