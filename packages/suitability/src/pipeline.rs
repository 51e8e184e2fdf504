//! End-to-end suitability analysis for one area of interest.
//!
//! Stage order:
//!
//! 1. Fetch elevation, slope and land cover clipped to the AOI.
//! 2. Reduce elevation and slope summary statistics (concurrently).
//! 3. Classify, combine and reclassify into the suitability raster.
//! 4. Render the suitability tile layer.
//! 5. Sum per-class areas and derive the yield estimate.
//! 6. Render the solar radiation tile layer.
//! 7. Frame the viewport.
//!
//! Any backend failure aborts the analysis; nothing partial is returned.

use solar_siting_raster::{RasterBackend, RasterImage, Reducer, Statistics};
use solar_siting_suitability_models::{
    AreaByClass, AreaOfInterest, InvalidAoiError, LayerName, SuitabilityClass, ViewportFrame,
};

use crate::classify::{Inputs, classify};
use crate::combine::combine;
use crate::config::PipelineConfig;
use crate::estimate::{
    YieldEstimate, area_image, areas_from_statistics, estimate_yield, rounded_areas,
};
use crate::{BackendHandle, SuitabilityError, viewport};

/// Characters of a tile URL shown in debug logs.
const URL_LOG_PREFIX: usize = 70;

/// Everything computed for one area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    /// Tile URL template for the suitability classes.
    pub suitability_tile_url: String,
    /// Tile URL template for mean solar radiation.
    pub solar_radiation_tile_url: String,
    /// Per-class area in km², rounded to 2 decimals.
    pub areas: AreaByClass,
    /// Lowest elevation, metres.
    pub elevation_min: f64,
    /// Highest elevation, metres.
    pub elevation_max: f64,
    /// Lowest slope, degrees.
    pub slope_min: f64,
    /// Highest slope, degrees.
    pub slope_max: f64,
    /// Mean slope, degrees.
    pub slope_mean: f64,
    /// Energy and panel estimates from the unrounded Most Suitable area.
    pub yield_estimate: YieldEstimate,
    /// Display framing.
    pub frame: ViewportFrame,
}

/// Validates client-supplied polygon coordinates.
///
/// # Errors
///
/// Returns [`SuitabilityError::Validation`] if the coordinates are absent,
/// empty or do not form a valid polygon.
pub fn parse_aoi(
    coordinates: Option<&[Vec<Vec<f64>>]>,
) -> Result<AreaOfInterest, SuitabilityError> {
    let coordinates = coordinates
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SuitabilityError::Validation {
            message: InvalidAoiError::Empty.to_string(),
        })?;
    AreaOfInterest::from_coordinates(coordinates).map_err(|e| SuitabilityError::Validation {
        message: e.to_string(),
    })
}

fn statistic(stats: &Statistics, key: &str) -> f64 {
    stats.get(key).unwrap_or_else(|| {
        log::warn!("Statistic {key} missing from reduction, defaulting to 0");
        0.0
    })
}

fn url_prefix(url: &str) -> String {
    url.chars().take(URL_LOG_PREFIX).collect()
}

/// Runs suitability analyses with a fixed configuration.
#[derive(Debug, Clone)]
pub struct SuitabilityPipeline {
    config: PipelineConfig,
}

impl SuitabilityPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        log::info!("Slope rule precedence: {}", config.rules.precedence);
        Self { config }
    }

    /// Checks the backend and the request, then runs the analysis.
    ///
    /// No backend call is made unless both checks pass.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::BackendUnavailable`] if the backend never
    /// initialised, [`SuitabilityError::Validation`] for a bad AOI, or
    /// [`SuitabilityError::Compute`] if a backend call fails.
    pub async fn analyze(
        &self,
        handle: &BackendHandle,
        coordinates: Option<&[Vec<Vec<f64>>]>,
    ) -> Result<AnalysisReport, SuitabilityError> {
        let backend = handle.backend()?;
        let aoi = parse_aoi(coordinates)?;
        self.run(backend, &aoi).await
    }

    /// Runs the analysis for a validated area of interest.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::Compute`] if any backend call fails.
    pub async fn run(
        &self,
        backend: &dyn RasterBackend,
        aoi: &AreaOfInterest,
    ) -> Result<AnalysisReport, SuitabilityError> {
        log::debug!(
            "Analysing AOI with {} positions on {} backend",
            aoi.position_count(),
            backend.name()
        );

        let elevation = backend.fetch_layer(LayerName::Elevation, aoi)?;
        let slope = backend.fetch_layer(LayerName::Slope, aoi)?;
        let landcover = backend.fetch_layer(LayerName::LandCover, aoi)?;

        let stats_params = self.config.stats.params();
        let elevation_image = RasterImage::single("elevation", elevation.expr.clone());
        let slope_image = RasterImage::single("slope", slope.expr.clone());
        let (elevation_stats, slope_stats) = futures::try_join!(
            backend.reduce_region(&elevation_image, aoi, Reducer::MinMax, &stats_params),
            backend.reduce_region(&slope_image, aoi, Reducer::MinMaxMean, &stats_params),
        )?;

        let inputs = Inputs {
            elevation: elevation.expr,
            slope: slope.expr,
            landcover: landcover.expr,
        };
        let suitability = combine(classify(&inputs, self.config.rules.precedence), aoi);

        let visualization = &self.config.visualization;
        let suitability_tile_url = backend
            .tile_url(
                &RasterImage::single("suitability", suitability.clone()),
                &visualization.suitability,
            )
            .await?;
        log::debug!(
            "Suitability tiles: {}...",
            url_prefix(&suitability_tile_url)
        );

        let area_stats = backend
            .reduce_region(
                &area_image(&suitability),
                aoi,
                Reducer::Sum,
                &self.config.area.params(),
            )
            .await?;
        let areas = areas_from_statistics(&area_stats);
        let yield_estimate = estimate_yield(areas.get(SuitabilityClass::MostSuitable));
        log::debug!(
            "Areas {:?} km2, {} MWh, {} panels",
            areas,
            yield_estimate.power_generation_mwh,
            yield_estimate.num_panels
        );

        let radiation = backend.fetch_layer(LayerName::SolarRadiation, aoi)?;
        let solar_radiation_tile_url = backend
            .tile_url(
                &RasterImage::single("solar_radiation", radiation.expr),
                &visualization.solar_radiation,
            )
            .await?;
        log::debug!(
            "Solar radiation tiles: {}...",
            url_prefix(&solar_radiation_tile_url)
        );

        let frame = viewport::frame(backend, aoi).await?;
        log::debug!(
            "Viewport centre ({}, {}) zoom {}",
            frame.center_lat,
            frame.center_lon,
            frame.zoom
        );

        Ok(AnalysisReport {
            suitability_tile_url,
            solar_radiation_tile_url,
            areas: rounded_areas(&areas),
            elevation_min: statistic(&elevation_stats, "elevation_min"),
            elevation_max: statistic(&elevation_stats, "elevation_max"),
            slope_min: statistic(&slope_stats, "slope_min"),
            slope_max: statistic(&slope_stats, "slope_max"),
            slope_mean: statistic(&slope_stats, "slope_mean"),
            yield_estimate,
            frame,
        })
    }
}
