//! Pipeline tuning parameters.
//!
//! Defaults are embedded at compile time from `pipeline.toml`. Setting
//! `SOLAR_SITING_CONFIG` to a file path replaces them at startup.

use std::path::Path;

use serde::Deserialize;
use solar_siting_raster::{ReduceParams, Visualization};

use crate::SuitabilityError;
use crate::classify::RulePrecedence;

const EMBEDDED_CONFIG: &str = include_str!("../pipeline.toml");

/// Environment variable holding an override config path.
pub const CONFIG_ENV: &str = "SOLAR_SITING_CONFIG";

/// Resolution and pixel-cap settings for one kind of reduction.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ReductionSettings {
    /// Nominal pixel pitch in metres.
    pub scale_m: f64,
    /// Maximum pixels a reduction may touch.
    pub max_pixels: u64,
    /// Coarsen instead of failing when the cap is exceeded.
    pub best_effort: bool,
}

impl ReductionSettings {
    /// Returns the backend reduction parameters.
    #[must_use]
    pub const fn params(&self) -> ReduceParams {
        ReduceParams {
            scale: self.scale_m,
            max_pixels: self.max_pixels,
            best_effort: self.best_effort,
        }
    }
}

/// Classification rule settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RuleSettings {
    /// How overlapping rules resolve.
    #[serde(default)]
    pub precedence: RulePrecedence,
}

/// Colour ramps for the two map layers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisualizationSettings {
    /// Suitability class ramp (index 0 is the masked value).
    pub suitability: Visualization,
    /// Solar radiation ramp.
    pub solar_radiation: Visualization,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// Elevation and slope summary statistics.
    pub stats: ReductionSettings,
    /// Per-class area aggregation.
    pub area: ReductionSettings,
    /// Classification rules.
    #[serde(default)]
    pub rules: RuleSettings,
    /// Map tile colour ramps.
    pub visualization: VisualizationSettings,
}

impl PipelineConfig {
    /// Returns the compile-time embedded configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed.
    #[must_use]
    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_CONFIG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded pipeline.toml: {e}"))
    }

    /// Loads the file named by `SOLAR_SITING_CONFIG`, or the embedded
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::Config`] if the override file cannot be
    /// read or parsed.
    pub fn load() -> Result<Self, SuitabilityError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Ok(Self::embedded()),
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::Config`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: &Path) -> Result<Self, SuitabilityError> {
        let content = std::fs::read_to_string(path).map_err(|e| SuitabilityError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        let config = Self::parse(&content)?;
        log::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration TOML.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::Config`] on malformed TOML, a
    /// non-positive scale, or an empty palette.
    pub fn parse(content: &str) -> Result<Self, SuitabilityError> {
        let config: Self = toml::de::from_str(content).map_err(|e| SuitabilityError::Config {
            message: format!("Invalid pipeline config: {e}"),
        })?;

        for (name, settings) in [("stats", &config.stats), ("area", &config.area)] {
            if settings.scale_m.is_nan() || settings.scale_m <= 0.0 {
                return Err(SuitabilityError::Config {
                    message: format!("{name}.scale_m must be positive"),
                });
            }
        }
        for (name, vis) in [
            ("suitability", &config.visualization.suitability),
            ("solar_radiation", &config.visualization.solar_radiation),
        ] {
            if vis.palette.is_empty() {
                return Err(SuitabilityError::Config {
                    message: format!("visualization.{name}.palette is empty"),
                });
            }
        }

        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::embedded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults() {
        let config = PipelineConfig::embedded();
        assert!((config.stats.scale_m - 500.0).abs() < f64::EPSILON);
        assert!((config.area.scale_m - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.area.max_pixels, 100_000_000_000);
        assert!(config.area.best_effort);
        assert_eq!(config.rules.precedence, RulePrecedence::LastMatch);
        assert_eq!(
            config.visualization.suitability.palette,
            ["#FFFFFF", "#52E929", "#F5A742", "#AB2103", "#FF0000"]
        );
        assert!((config.visualization.solar_radiation.min - 1e7).abs() < f64::EPSILON);
    }

    #[test]
    fn precedence_override() {
        let toml = EMBEDDED_CONFIG.replace("\"last_match\"", "\"first_match\"");
        let config = PipelineConfig::parse(&toml).unwrap();
        assert_eq!(config.rules.precedence, RulePrecedence::FirstMatch);
    }

    #[test]
    fn rejects_zero_scale() {
        let toml = EMBEDDED_CONFIG.replace("scale_m = 100.0", "scale_m = 0.0");
        assert!(matches!(
            PipelineConfig::parse(&toml),
            Err(SuitabilityError::Config { .. })
        ));
    }

    #[test]
    fn rejects_unknown_precedence() {
        let toml = EMBEDDED_CONFIG.replace("\"last_match\"", "\"random\"");
        assert!(PipelineConfig::parse(&toml).is_err());
    }
}
