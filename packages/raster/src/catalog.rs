//! Dataset catalog mapping layer names to remote sources.
//!
//! The default catalog is embedded at compile time from `catalog.toml`.
//! Setting `RASTER_CATALOG` to a file path replaces it at runtime.

use std::path::Path;

use serde::Deserialize;
use solar_siting_suitability_models::LayerName;

use crate::{BackendError, LayerSource};

const EMBEDDED_CATALOG: &str = include_str!("../catalog.toml");

/// Environment variable holding an override catalog path.
pub const CATALOG_ENV: &str = "RASTER_CATALOG";

/// Source datasets for every stored layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Catalog {
    /// Terrain elevation in metres.
    pub elevation: LayerSource,
    /// Land-cover class codes.
    pub landcover: LayerSource,
    /// Downward surface solar radiation.
    pub solar_radiation: LayerSource,
}

impl Catalog {
    /// Returns the compile-time embedded catalog.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (a compile-time guarantee
    /// since the file ships with the crate).
    #[must_use]
    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_CATALOG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded raster catalog: {e}"))
    }

    /// Loads the catalog named by `RASTER_CATALOG`, or the embedded one.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if the override file cannot be read
    /// or parsed.
    pub fn load() -> Result<Self, BackendError> {
        match std::env::var(CATALOG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Ok(Self::embedded()),
        }
    }

    /// Loads a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let content = std::fs::read_to_string(path).map_err(|e| BackendError::Config {
            message: format!("Failed to read catalog {}: {e}", path.display()),
        })?;
        log::info!("Loaded raster catalog from {}", path.display());
        Self::parse(&content)
    }

    /// Parses and validates catalog TOML.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] on malformed TOML or an inverted
    /// date window.
    pub fn parse(content: &str) -> Result<Self, BackendError> {
        let catalog: Self = toml::de::from_str(content).map_err(|e| BackendError::Config {
            message: format!("Invalid raster catalog: {e}"),
        })?;

        for source in [
            &catalog.elevation,
            &catalog.landcover,
            &catalog.solar_radiation,
        ] {
            if let LayerSource::CollectionMean {
                start,
                end,
                collection,
                ..
            } = source
            {
                if start > end {
                    return Err(BackendError::Config {
                        message: format!("Date window for {collection} ends before it starts"),
                    });
                }
            }
        }

        Ok(catalog)
    }

    /// Resolves a stored layer to its source.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MissingLayer`] for derived layers (slope).
    pub fn source(&self, name: LayerName) -> Result<LayerSource, BackendError> {
        match name {
            LayerName::Elevation => Ok(self.elevation.clone()),
            LayerName::LandCover => Ok(self.landcover.clone()),
            LayerName::SolarRadiation => Ok(self.solar_radiation.clone()),
            LayerName::Slope => Err(BackendError::MissingLayer { layer: name }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn embedded_catalog_parses() {
        let catalog = Catalog::embedded();
        assert_eq!(
            catalog.elevation,
            LayerSource::Image {
                asset: "USGS/SRTMGL1_003".to_string(),
                band: "elevation".to_string(),
            }
        );
        assert!(matches!(
            catalog.landcover,
            LayerSource::CollectionFirst { .. }
        ));
    }

    #[test]
    fn radiation_window_defaults_to_2024() {
        let LayerSource::CollectionMean { start, end, .. } = Catalog::embedded().solar_radiation
        else {
            panic!("solar radiation should be a collection mean");
        };
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn rejects_inverted_window() {
        let toml = EMBEDDED_CATALOG.replace("start = \"2024-01-01\"", "start = \"2025-06-01\"");
        assert!(matches!(
            Catalog::parse(&toml),
            Err(BackendError::Config { .. })
        ));
    }

    #[test]
    fn slope_is_not_a_stored_layer() {
        assert!(matches!(
            Catalog::embedded().source(LayerName::Slope),
            Err(BackendError::MissingLayer { .. })
        ));
    }
}
