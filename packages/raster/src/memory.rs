//! In-memory raster backend.
//!
//! Evaluates [`RasterExpr`] trees over regular lat/lon grids registered per
//! layer. All layers share one grid geometry; a pixel is in a region when
//! its cell centre lies strictly inside the region polygon (holes
//! excluded).

use std::collections::BTreeMap;

use geo::{Contains as _, Point};
use solar_siting_suitability_models::{AreaOfInterest, BoundingBox, LayerName};

use crate::{
    BackendError, BinaryOp, LayerSource, RasterBackend, RasterExpr, RasterImage, ReduceParams,
    Reducer, Statistics, Visualization,
};

/// Mean Earth radius in metres (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per degree of latitude.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// A north-up regular grid of `f64` cells. `NaN` marks no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    west: f64,
    north: f64,
    cell_size: f64,
    cols: usize,
    rows: usize,
    values: Vec<f64>,
}

impl Grid {
    /// Creates a grid from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if the value count does not match
    /// `cols * rows` or the cell size is not positive.
    pub fn new(
        west: f64,
        north: f64,
        cell_size: f64,
        cols: usize,
        rows: usize,
        values: Vec<f64>,
    ) -> Result<Self, BackendError> {
        if values.len() != cols * rows {
            return Err(BackendError::Config {
                message: format!(
                    "Grid has {} values, expected {cols}x{rows}",
                    values.len()
                ),
            });
        }
        if cell_size.is_nan() || cell_size <= 0.0 {
            return Err(BackendError::Config {
                message: format!("Grid cell size must be positive, got {cell_size}"),
            });
        }
        Ok(Self {
            west,
            north,
            cell_size,
            cols,
            rows,
            values,
        })
    }

    /// Creates a grid by sampling `f(lon, lat)` at every cell centre.
    #[must_use]
    pub fn from_fn(
        west: f64,
        north: f64,
        cell_size: f64,
        cols: usize,
        rows: usize,
        mut f: impl FnMut(f64, f64) -> f64,
    ) -> Self {
        let mut values = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let (lon, lat) = cell_center(west, north, cell_size, row, col);
                values.push(f(lon, lat));
            }
        }
        Self {
            west,
            north,
            cell_size,
            cols,
            rows,
            values,
        }
    }

    /// The `(lon, lat)` centre of a cell.
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        cell_center(self.west, self.north, self.cell_size, row, col)
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        let v = self.values[row * self.cols + col];
        if v.is_nan() { None } else { Some(v) }
    }

    fn same_geometry(&self, other: &Self) -> bool {
        self.cols == other.cols
            && self.rows == other.rows
            && (self.west - other.west).abs() < f64::EPSILON
            && (self.north - other.north).abs() < f64::EPSILON
            && (self.cell_size - other.cell_size).abs() < f64::EPSILON
    }

    /// Geodesic area of a cell on a spherical Earth, in m².
    fn cell_area_m2(&self, row: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let lat_north = self.north - row as f64 * self.cell_size;
        let lat_south = lat_north - self.cell_size;
        EARTH_RADIUS_M.powi(2)
            * self.cell_size.to_radians()
            * (lat_north.to_radians().sin() - lat_south.to_radians().sin()).abs()
    }

    /// Marks every cell whose centre lies inside `aoi`.
    fn region_mask(&self, aoi: &AreaOfInterest) -> Vec<bool> {
        let polygon = aoi.to_polygon();
        let bbox = BoundingBox::from_rings(aoi.rings());
        let mut mask = Vec::with_capacity(self.values.len());
        for row in 0..self.rows {
            for col in 0..self.cols {
                let (lon, lat) = self.cell_center(row, col);
                let in_bbox = bbox.is_some_and(|b| {
                    lon >= b.west && lon <= b.east && lat >= b.south && lat <= b.north
                });
                mask.push(in_bbox && polygon.contains(&Point::new(lon, lat)));
            }
        }
        mask
    }
}

#[allow(clippy::cast_precision_loss)]
fn cell_center(west: f64, north: f64, cell_size: f64, row: usize, col: usize) -> (f64, f64) {
    (
        west + (col as f64 + 0.5) * cell_size,
        north - (row as f64 + 0.5) * cell_size,
    )
}

/// Expression with sources resolved to grids and clip regions rasterised.
enum Node<'a> {
    Constant(f64),
    Layer(&'a Grid),
    Slope(Box<Self>),
    PixelArea,
    Binary(BinaryOp, Box<Self>, Box<Self>),
    Where {
        input: Box<Self>,
        condition: Box<Self>,
        value: f64,
    },
    UpdateMask {
        input: Box<Self>,
        mask: Box<Self>,
    },
    Clip {
        input: Box<Self>,
        region: usize,
    },
}

struct Evaluator<'a> {
    grid: &'a Grid,
    regions: Vec<Vec<bool>>,
}

impl Evaluator<'_> {
    fn eval(&self, node: &Node<'_>, row: usize, col: usize) -> Option<f64> {
        match node {
            Node::Constant(v) => Some(*v),
            Node::Layer(grid) => grid.value(row, col),
            Node::Slope(input) => self.slope(input, row, col),
            Node::PixelArea => Some(self.grid.cell_area_m2(row)),
            Node::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs, row, col)?;
                let r = self.eval(rhs, row, col)?;
                Some(op.apply(l, r))
            }
            Node::Where {
                input,
                condition,
                value,
            } => {
                let base = self.eval(input, row, col)?;
                match self.eval(condition, row, col) {
                    Some(c) if c != 0.0 => Some(*value),
                    _ => Some(base),
                }
            }
            Node::UpdateMask { input, mask } => match self.eval(mask, row, col) {
                Some(m) if m != 0.0 => self.eval(input, row, col),
                _ => None,
            },
            Node::Clip { input, region } => {
                if self.regions[*region][row * self.grid.cols + col] {
                    self.eval(input, row, col)
                } else {
                    None
                }
            }
        }
    }

    /// Horn 3x3 slope in degrees. Edges replicate the border cell and
    /// masked neighbours take the centre value.
    fn slope(&self, input: &Node<'_>, row: usize, col: usize) -> Option<f64> {
        let center = self.eval(input, row, col)?;
        let at = |dr: isize, dc: isize| {
            let r = row.saturating_add_signed(dr).min(self.grid.rows - 1);
            let c = col.saturating_add_signed(dc).min(self.grid.cols - 1);
            self.eval(input, r, c).unwrap_or(center)
        };

        let (a, b, c) = (at(-1, -1), at(-1, 0), at(-1, 1));
        let (d, f) = (at(0, -1), at(0, 1));
        let (g, h, i) = (at(1, -1), at(1, 0), at(1, 1));

        let (_, lat) = self.grid.cell_center(row, col);
        let dx = self.grid.cell_size * METRES_PER_DEGREE * lat.to_radians().cos();
        let dy = self.grid.cell_size * METRES_PER_DEGREE;

        let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
        let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);

        Some(dz_dx.hypot(dz_dy).atan().to_degrees())
    }
}

/// Running statistics for one band.
#[derive(Default)]
struct Accumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn push(&mut self, v: f64) {
        if self.count == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.sum += v;
        self.count += 1;
    }
}

/// A [`RasterBackend`] over in-memory grids.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    layers: BTreeMap<LayerName, Grid>,
}

impl MemoryBackend {
    /// Creates a backend with no layers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stored layer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if the layer is derived (slope) or
    /// its grid geometry differs from already registered layers.
    pub fn with_layer(mut self, name: LayerName, grid: Grid) -> Result<Self, BackendError> {
        if name == LayerName::Slope {
            return Err(BackendError::Config {
                message: "Slope is derived from elevation and cannot be registered".to_string(),
            });
        }
        if let Some(existing) = self.layers.values().next() {
            if !existing.same_geometry(&grid) {
                return Err(BackendError::Config {
                    message: format!("Grid for {name} does not match registered layers"),
                });
            }
        }
        self.layers.insert(name, grid);
        Ok(self)
    }

    fn reference(&self) -> Result<&Grid, BackendError> {
        self.layers
            .values()
            .next()
            .ok_or(BackendError::MissingLayer {
                layer: LayerName::Elevation,
            })
    }

    fn compile<'a>(
        &'a self,
        expr: &RasterExpr,
        grid: &Grid,
        regions: &mut Vec<(AreaOfInterest, Vec<bool>)>,
    ) -> Result<Node<'a>, BackendError> {
        Ok(match expr {
            RasterExpr::Constant { value } => Node::Constant(*value),
            RasterExpr::Source { source } => match source {
                LayerSource::Named { name } => Node::Layer(
                    self.layers
                        .get(name)
                        .ok_or(BackendError::MissingLayer { layer: *name })?,
                ),
                other => {
                    return Err(BackendError::Unsupported {
                        message: format!("memory backend cannot read {other:?}"),
                    });
                }
            },
            RasterExpr::Slope { input } => {
                Node::Slope(Box::new(self.compile(input, grid, regions)?))
            }
            RasterExpr::PixelArea => Node::PixelArea,
            RasterExpr::Binary { operator, lhs, rhs } => Node::Binary(
                *operator,
                Box::new(self.compile(lhs, grid, regions)?),
                Box::new(self.compile(rhs, grid, regions)?),
            ),
            RasterExpr::Where {
                input,
                condition,
                value,
            } => Node::Where {
                input: Box::new(self.compile(input, grid, regions)?),
                condition: Box::new(self.compile(condition, grid, regions)?),
                value: *value,
            },
            RasterExpr::UpdateMask { input, mask } => Node::UpdateMask {
                input: Box::new(self.compile(input, grid, regions)?),
                mask: Box::new(self.compile(mask, grid, regions)?),
            },
            RasterExpr::Clip { input, aoi } => {
                let input = Box::new(self.compile(input, grid, regions)?);
                let region = if let Some(idx) = regions.iter().position(|(a, _)| a == aoi) {
                    idx
                } else {
                    regions.push((aoi.clone(), grid.region_mask(aoi)));
                    regions.len() - 1
                };
                Node::Clip { input, region }
            }
        })
    }

    fn reduce(
        &self,
        image: &RasterImage,
        aoi: &AreaOfInterest,
        reducer: Reducer,
        params: &ReduceParams,
    ) -> Result<Statistics, BackendError> {
        let grid = self.reference()?;
        let mut regions = Vec::new();
        let mut bands = Vec::with_capacity(image.bands.len());
        for band in &image.bands {
            bands.push((
                band.name.as_str(),
                self.compile(&band.expression, grid, &mut regions)?,
            ));
        }

        let region = grid.region_mask(aoi);
        let pixels = region.iter().filter(|inside| **inside).count() as u64;
        let stride = sampling_stride(pixels, params)?;
        #[allow(clippy::cast_precision_loss)]
        let weight = (stride * stride) as f64;

        let evaluator = Evaluator {
            grid,
            regions: regions.into_iter().map(|(_, mask)| mask).collect(),
        };

        let mut stats = Statistics::default();
        for (name, node) in &bands {
            let mut acc = Accumulator::default();
            for row in (0..grid.rows).step_by(stride) {
                for col in (0..grid.cols).step_by(stride) {
                    if !region[row * grid.cols + col] {
                        continue;
                    }
                    if let Some(v) = evaluator.eval(node, row, col) {
                        acc.push(v);
                    }
                }
            }
            write_statistics(&mut stats, name, reducer, &acc, weight);
        }

        Ok(stats)
    }
}

/// Picks the row/column step that keeps a reduction under the pixel cap.
fn sampling_stride(pixels: u64, params: &ReduceParams) -> Result<usize, BackendError> {
    let max_pixels = params.max_pixels.max(1);
    if pixels <= max_pixels {
        return Ok(1);
    }
    if !params.best_effort {
        return Err(BackendError::TooManyPixels { pixels, max_pixels });
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let stride = (pixels as f64 / max_pixels as f64).sqrt().ceil() as usize;
    log::debug!("Best-effort reduction over {pixels} pixels using stride {stride}");
    Ok(stride.max(1))
}

#[allow(clippy::cast_precision_loss)]
fn write_statistics(
    stats: &mut Statistics,
    band: &str,
    reducer: Reducer,
    acc: &Accumulator,
    weight: f64,
) {
    let has_pixels = acc.count > 0;
    match reducer {
        Reducer::Sum => {
            if has_pixels {
                stats.insert(band, Some(acc.sum * weight));
            }
        }
        Reducer::MinMax | Reducer::MinMaxMean => {
            stats.insert(format!("{band}_min"), has_pixels.then_some(acc.min));
            stats.insert(format!("{band}_max"), has_pixels.then_some(acc.max));
            if reducer == Reducer::MinMaxMean {
                stats.insert(
                    format!("{band}_mean"),
                    has_pixels.then(|| acc.sum / acc.count as f64),
                );
            }
        }
    }
}

#[async_trait::async_trait]
impl RasterBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn layer_source(&self, name: LayerName) -> Result<LayerSource, BackendError> {
        if self.layers.contains_key(&name) {
            Ok(LayerSource::Named { name })
        } else {
            Err(BackendError::MissingLayer { layer: name })
        }
    }

    async fn reduce_region(
        &self,
        image: &RasterImage,
        aoi: &AreaOfInterest,
        reducer: Reducer,
        params: &ReduceParams,
    ) -> Result<Statistics, BackendError> {
        self.reduce(image, aoi, reducer, params)
    }

    async fn tile_url(
        &self,
        image: &RasterImage,
        visualization: &Visualization,
    ) -> Result<String, BackendError> {
        let grid = self.reference()?;
        let mut regions = Vec::new();
        for band in &image.bands {
            self.compile(&band.expression, grid, &mut regions)?;
        }
        let names: Vec<&str> = image.bands.iter().map(|b| b.name.as_str()).collect();
        Ok(format!(
            "memory://tiles/{}/{{z}}/{{x}}/{{y}}?min={}&max={}",
            names.join("+"),
            visualization.min,
            visualization.max
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: ReduceParams = ReduceParams {
        scale: 100.0,
        max_pixels: 1_000_000,
        best_effort: false,
    };

    fn aoi(west: f64, south: f64, east: f64, north: f64) -> AreaOfInterest {
        let ring = BoundingBox::new(west, south, east, north).to_ring();
        AreaOfInterest::from_coordinates(&[ring.iter().map(|p| p.to_vec()).collect()]).unwrap()
    }

    fn backend(elevation: impl FnMut(f64, f64) -> f64) -> MemoryBackend {
        MemoryBackend::new()
            .with_layer(
                LayerName::Elevation,
                Grid::from_fn(0.0, 0.01, 0.001, 10, 10, elevation),
            )
            .unwrap()
    }

    fn elevation_expr() -> RasterExpr {
        RasterExpr::source(LayerSource::Named {
            name: LayerName::Elevation,
        })
    }

    #[test]
    fn rejects_mismatched_value_count() {
        assert!(Grid::new(0.0, 0.0, 1.0, 2, 2, vec![0.0; 3]).is_err());
        assert!(Grid::new(0.0, 0.0, 0.0, 1, 1, vec![0.0]).is_err());
    }

    #[test]
    fn rejects_mismatched_layer_geometry() {
        let result = backend(|_, _| 1.0).with_layer(
            LayerName::LandCover,
            Grid::from_fn(0.0, 0.01, 0.001, 5, 5, |_, _| 20.0),
        );
        assert!(matches!(result, Err(BackendError::Config { .. })));
    }

    #[test]
    fn pixel_area_matches_spherical_cell() {
        let grid = Grid::from_fn(0.0, 0.005, 0.01, 1, 1, |_, _| 0.0);
        // ~1.1119 km on each side at the equator.
        let area_km2 = grid.cell_area_m2(0) / 1e6;
        assert!((area_km2 - 1.2364).abs() < 1e-3, "area was {area_km2}");
    }

    #[tokio::test]
    async fn min_max_mean_over_region() {
        let backend = backend(|lon, _| (lon * 1000.0).floor());
        let stats = backend
            .reduce_region(
                &RasterImage::single("elevation", elevation_expr()),
                &aoi(0.0, 0.0, 0.01, 0.01),
                Reducer::MinMaxMean,
                &PARAMS,
            )
            .await
            .unwrap();
        assert_eq!(stats.get("elevation_min"), Some(0.0));
        assert_eq!(stats.get("elevation_max"), Some(9.0));
        assert_eq!(stats.get("elevation_mean"), Some(4.5));
    }

    #[tokio::test]
    async fn empty_region_yields_missing_statistics() {
        let backend = backend(|_, _| 1.0);
        let image = RasterImage::single("elevation", elevation_expr());
        let far_away = aoi(50.0, 50.0, 51.0, 51.0);

        let min_max = backend
            .reduce_region(&image, &far_away, Reducer::MinMax, &PARAMS)
            .await
            .unwrap();
        assert_eq!(min_max.get("elevation_min"), None);

        let sum = backend
            .reduce_region(&image, &far_away, Reducer::Sum, &PARAMS)
            .await
            .unwrap();
        assert!(sum.is_empty());
    }

    #[tokio::test]
    async fn flat_terrain_has_zero_slope() {
        let backend = backend(|_, _| 100.0);
        let stats = backend
            .reduce_region(
                &RasterImage::single("slope", elevation_expr().slope()),
                &aoi(0.0, 0.0, 0.01, 0.01),
                Reducer::MinMax,
                &PARAMS,
            )
            .await
            .unwrap();
        assert_eq!(stats.get("slope_max"), Some(0.0));
    }

    #[tokio::test]
    async fn unit_gradient_ramp_is_45_degrees() {
        // Rises one cell width (in metres) per cell eastward near the equator.
        let backend = backend(|lon, _| lon * METRES_PER_DEGREE);
        let stats = backend
            .reduce_region(
                &RasterImage::single("slope", elevation_expr().slope()),
                &aoi(0.002, 0.002, 0.008, 0.008),
                Reducer::MinMax,
                &PARAMS,
            )
            .await
            .unwrap();
        let max = stats.get("slope_max").unwrap();
        assert!((max - 45.0).abs() < 0.01, "slope was {max}");
    }

    #[tokio::test]
    async fn clip_and_mask_exclude_cells() {
        let backend = backend(|_, _| 1.0);
        let inner = aoi(0.0, 0.0, 0.005, 0.01);
        let expr = elevation_expr()
            .clip(inner)
            .update_mask(elevation_expr().gte(1.0));
        let stats = backend
            .reduce_region(
                &RasterImage::single("count", expr),
                &aoi(0.0, 0.0, 0.01, 0.01),
                Reducer::Sum,
                &PARAMS,
            )
            .await
            .unwrap();
        assert_eq!(stats.get("count"), Some(50.0));
    }

    #[tokio::test]
    async fn pixel_cap_fails_without_best_effort() {
        let backend = backend(|_, _| 1.0);
        let params = ReduceParams {
            max_pixels: 10,
            ..PARAMS
        };
        let result = backend
            .reduce_region(
                &RasterImage::single("elevation", elevation_expr()),
                &aoi(0.0, 0.0, 0.01, 0.01),
                Reducer::Sum,
                &params,
            )
            .await;
        assert!(matches!(
            result,
            Err(BackendError::TooManyPixels {
                pixels: 100,
                max_pixels: 10
            })
        ));
    }

    #[tokio::test]
    async fn best_effort_reweights_sampled_sum() {
        let backend = backend(|_, _| 1.0);
        let params = ReduceParams {
            max_pixels: 25,
            best_effort: true,
            ..PARAMS
        };
        let stats = backend
            .reduce_region(
                &RasterImage::single("elevation", elevation_expr()),
                &aoi(0.0, 0.0, 0.01, 0.01),
                Reducer::Sum,
                &params,
            )
            .await
            .unwrap();
        // Stride 2 samples 25 of 100 cells, each weighted by 4.
        assert_eq!(stats.get("elevation"), Some(100.0));
    }

    #[tokio::test]
    async fn remote_sources_are_unsupported() {
        let backend = backend(|_, _| 1.0);
        let expr = RasterExpr::source(LayerSource::Image {
            asset: "dem".to_string(),
            band: "elevation".to_string(),
        });
        let result = backend
            .tile_url(
                &RasterImage::single("dem", expr),
                &Visualization {
                    min: 0.0,
                    max: 1.0,
                    palette: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(BackendError::Unsupported { .. })));
    }
}
