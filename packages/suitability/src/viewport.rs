//! Map centre and zoom for displaying an area of interest.

use solar_siting_raster::{BackendError, RasterBackend};
use solar_siting_suitability_models::{AreaOfInterest, BoundingBox, Position, ViewportFrame};

/// Zoom used when the extent is degenerate.
pub const DEFAULT_ZOOM: u8 = 10;
/// Lowest zoom returned.
pub const MIN_ZOOM: u8 = 1;
/// Highest zoom returned.
pub const MAX_ZOOM: u8 = 16;

/// Zoom level that fits an extent of `delta_lon` by `delta_lat` degrees.
///
/// Either extent being zero, negative or NaN yields [`DEFAULT_ZOOM`].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn zoom_for_extent(delta_lon: f64, delta_lat: f64) -> u8 {
    if !(delta_lon > 0.0 && delta_lat > 0.0) {
        return DEFAULT_ZOOM;
    }
    let zoom_lon = (360.0 / delta_lon).log2();
    let zoom_lat = (180.0 / delta_lat).log2();
    let zoom = zoom_lon.min(zoom_lat).floor() + 1.0;
    zoom.clamp(f64::from(MIN_ZOOM), f64::from(MAX_ZOOM)) as u8
}

/// Zoom level for the bounding rings returned by a backend.
#[must_use]
pub fn zoom_for_rings(rings: &[Vec<Position>]) -> u8 {
    BoundingBox::from_rings(rings).map_or(DEFAULT_ZOOM, |bbox| {
        zoom_for_extent(bbox.delta_lon(), bbox.delta_lat())
    })
}

/// Frames `aoi` using the backend's centroid and bounding box.
///
/// # Errors
///
/// Returns [`BackendError`] if either geometry call fails.
pub async fn frame(
    backend: &dyn RasterBackend,
    aoi: &AreaOfInterest,
) -> Result<ViewportFrame, BackendError> {
    let (lon, lat) = backend.centroid(aoi).await?;
    let rings = backend.bounding_box(aoi).await?;
    Ok(ViewportFrame {
        center_lat: lat,
        center_lon: lon,
        zoom: zoom_for_rings(&rings),
    })
}
