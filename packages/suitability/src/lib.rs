#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Solar site suitability scoring pipeline.
//!
//! Elevation, slope and land-cover layers are classified into contribution
//! rasters ([`classify`]), summed and reclassified into four ordinal
//! suitability classes ([`combine`]), and aggregated into per-class areas
//! with derived energy and panel estimates ([`estimate`]). The map
//! viewport is framed independently ([`viewport`]). [`pipeline`] wires the
//! stages together against a [`RasterBackend`].

pub mod classify;
pub mod combine;
pub mod config;
pub mod estimate;
pub mod pipeline;
pub mod viewport;

use std::sync::Arc;

use solar_siting_raster::{BackendError, RasterBackend};
use thiserror::Error;

/// Message returned while the raster backend is unavailable.
pub const BACKEND_UNAVAILABLE_MESSAGE: &str = "Raster backend not initialized on the server.";

/// Errors from a suitability analysis.
#[derive(Debug, Error)]
pub enum SuitabilityError {
    /// The request's area of interest is missing or malformed.
    #[error("{message}")]
    Validation {
        /// Description shown to the client.
        message: String,
    },

    /// The raster backend failed to initialise at startup.
    #[error("{message}")]
    BackendUnavailable {
        /// Description shown to the client.
        message: String,
    },

    /// A backend call failed mid-pipeline.
    #[error(transparent)]
    Compute(#[from] BackendError),

    /// Pipeline configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

impl SuitabilityError {
    /// Whether the error is the caller's fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// The process-wide raster backend, initialised once at startup.
#[derive(Clone)]
pub enum BackendHandle {
    /// The backend initialised successfully.
    Ready(Arc<dyn RasterBackend>),
    /// Initialisation failed. Every analysis fails fast.
    Unavailable {
        /// Why initialisation failed, for logs and health checks.
        reason: String,
    },
}

impl BackendHandle {
    /// Wraps an initialised backend.
    #[must_use]
    pub fn ready(backend: impl RasterBackend + 'static) -> Self {
        Self::Ready(Arc::new(backend))
    }

    /// Records a failed initialisation.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether the backend initialised successfully.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns the backend.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::BackendUnavailable`] if initialisation
    /// failed.
    pub fn backend(&self) -> Result<&dyn RasterBackend, SuitabilityError> {
        match self {
            Self::Ready(backend) => Ok(backend.as_ref()),
            Self::Unavailable { .. } => Err(SuitabilityError::BackendUnavailable {
                message: BACKEND_UNAVAILABLE_MESSAGE.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(backend) => f.debug_tuple("Ready").field(&backend.name()).finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}
