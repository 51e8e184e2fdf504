#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Core value types for solar site suitability analysis.
//!
//! Defines the area of interest submitted by a client, the four ordinal
//! suitability classes, the named raster layers the pipeline consumes, and
//! the map framing returned alongside the analysis. Everything here is
//! request-scoped and never persisted.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A single `[longitude, latitude]` position.
pub type Position = [f64; 2];

/// A polygon area of interest in WGS84 coordinates.
///
/// The first ring is the outer boundary, any following rings are holes.
/// Every ring is closed (first position equals last) and has at least four
/// positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AreaOfInterest {
    rings: Vec<Vec<Position>>,
}

impl AreaOfInterest {
    /// Minimum number of positions in a closed linear ring.
    pub const MIN_RING_POSITIONS: usize = 4;

    /// Builds an area of interest from `GeoJSON`-style polygon coordinates.
    ///
    /// Positions may carry extra ordinates (altitude); only the first two
    /// are kept. Rings that are not closed are closed by repeating their
    /// first position.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidAoiError`] if there are no rings, a ring is empty or
    /// too short, or a position is not a finite in-range lon/lat pair.
    pub fn from_coordinates(coordinates: &[Vec<Vec<f64>>]) -> Result<Self, InvalidAoiError> {
        if coordinates.is_empty() {
            return Err(InvalidAoiError::Empty);
        }

        let mut rings = Vec::with_capacity(coordinates.len());

        for (ring_idx, raw_ring) in coordinates.iter().enumerate() {
            if raw_ring.is_empty() {
                return Err(InvalidAoiError::EmptyRing { ring: ring_idx });
            }

            let mut ring = Vec::with_capacity(raw_ring.len() + 1);
            for (idx, raw) in raw_ring.iter().enumerate() {
                let [lon, lat] = match raw.as_slice() {
                    [lon, lat, ..] => [*lon, *lat],
                    _ => {
                        return Err(InvalidAoiError::MalformedPosition {
                            ring: ring_idx,
                            index: idx,
                        });
                    }
                };
                if !lon.is_finite()
                    || !lat.is_finite()
                    || !(-180.0..=180.0).contains(&lon)
                    || !(-90.0..=90.0).contains(&lat)
                {
                    return Err(InvalidAoiError::OutOfRange {
                        ring: ring_idx,
                        index: idx,
                    });
                }
                ring.push([lon, lat]);
            }

            if ring.first() != ring.last() {
                ring.push(ring[0]);
            }

            if ring.len() < Self::MIN_RING_POSITIONS {
                return Err(InvalidAoiError::TooFewPositions {
                    ring: ring_idx,
                    positions: ring.len(),
                });
            }

            rings.push(ring);
        }

        Ok(Self { rings })
    }

    /// All rings, outer boundary first.
    #[must_use]
    pub fn rings(&self) -> &[Vec<Position>] {
        &self.rings
    }

    /// The outer boundary ring.
    #[must_use]
    pub fn exterior(&self) -> &[Position] {
        &self.rings[0]
    }

    /// Total number of positions across every ring.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }

    /// Converts to a [`geo::Polygon`] with holes.
    #[must_use]
    pub fn to_polygon(&self) -> geo::Polygon<f64> {
        let to_line = |ring: &Vec<Position>| {
            geo::LineString::from(ring.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>())
        };
        geo::Polygon::new(
            to_line(&self.rings[0]),
            self.rings[1..].iter().map(to_line).collect(),
        )
    }
}

/// Error returned when client coordinates do not form a valid
/// [`AreaOfInterest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAoiError {
    /// No rings were supplied.
    Empty,
    /// A ring has no positions.
    EmptyRing {
        /// Index of the offending ring.
        ring: usize,
    },
    /// A position has fewer than two ordinates.
    MalformedPosition {
        /// Index of the offending ring.
        ring: usize,
        /// Index of the position within the ring.
        index: usize,
    },
    /// A position is not finite or lies outside the WGS84 range.
    OutOfRange {
        /// Index of the offending ring.
        ring: usize,
        /// Index of the position within the ring.
        index: usize,
    },
    /// A closed ring has fewer than four positions.
    TooFewPositions {
        /// Index of the offending ring.
        ring: usize,
        /// Number of positions after closing.
        positions: usize,
    },
}

impl std::fmt::Display for InvalidAoiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "AOI coordinates are required."),
            Self::EmptyRing { ring } => write!(f, "AOI ring {ring} has no positions"),
            Self::MalformedPosition { ring, index } => {
                write!(
                    f,
                    "AOI ring {ring} position {index} is not a [lon, lat] pair"
                )
            }
            Self::OutOfRange { ring, index } => {
                write!(
                    f,
                    "AOI ring {ring} position {index} is outside WGS84 bounds"
                )
            }
            Self::TooFewPositions { ring, positions } => write!(
                f,
                "AOI ring {ring} has {positions} positions: expected at least {}",
                AreaOfInterest::MIN_RING_POSITIONS
            ),
        }
    }
}

impl std::error::Error for InvalidAoiError {}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest box covering every position of every ring.
    ///
    /// Returns `None` when there are no positions at all.
    #[must_use]
    pub fn from_rings(rings: &[Vec<Position>]) -> Option<Self> {
        let mut positions = rings.iter().flatten();
        let first = positions.next()?;
        let init = Self::new(first[0], first[1], first[0], first[1]);
        Some(positions.fold(init, |b, p| {
            Self::new(
                b.west.min(p[0]),
                b.south.min(p[1]),
                b.east.max(p[0]),
                b.north.max(p[1]),
            )
        }))
    }

    /// East-west extent in degrees.
    #[must_use]
    pub fn delta_lon(&self) -> f64 {
        self.east - self.west
    }

    /// North-south extent in degrees.
    #[must_use]
    pub fn delta_lat(&self) -> f64 {
        self.north - self.south
    }

    /// The closed corner ring of this box, counter-clockwise from south-west.
    #[must_use]
    pub fn to_ring(&self) -> Vec<Position> {
        vec![
            [self.west, self.south],
            [self.east, self.south],
            [self.east, self.north],
            [self.west, self.north],
            [self.west, self.south],
        ]
    }
}

/// Ordinal suitability of a location for solar deployment, 1 = best.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum SuitabilityClass {
    /// Meets the elevation, slope and land-cover criteria fully.
    #[serde(rename = "Most Suitable")]
    #[strum(serialize = "Most Suitable")]
    MostSuitable = 1,
    /// Full elevation and land-cover, low-lying moderate slope.
    #[serde(rename = "Medium Suitable")]
    #[strum(serialize = "Medium Suitable")]
    MediumSuitable = 2,
    /// Full elevation and land-cover, steep slope.
    #[serde(rename = "Less Suitable")]
    #[strum(serialize = "Less Suitable")]
    LessSuitable = 3,
    /// Everything else.
    #[serde(rename = "Not Suitable")]
    #[strum(serialize = "Not Suitable")]
    NotSuitable = 4,
}

impl SuitabilityClass {
    /// Returns the numeric class value (1-4) as written to the raster.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Returns the display colour used in the suitability tile palette.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::MostSuitable => "#52E929",
            Self::MediumSuitable => "#F5A742",
            Self::LessSuitable => "#AB2103",
            Self::NotSuitable => "#FF0000",
        }
    }

    /// Creates a class from its raster value.
    ///
    /// Returns `None` for anything outside 1-4 (masked cells).
    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::MostSuitable),
            2 => Some(Self::MediumSuitable),
            3 => Some(Self::LessSuitable),
            4 => Some(Self::NotSuitable),
            _ => None,
        }
    }

    /// Returns all classes, most suitable first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::MostSuitable,
            Self::MediumSuitable,
            Self::LessSuitable,
            Self::NotSuitable,
        ]
    }

    const fn index(self) -> usize {
        self as usize - 1
    }
}

/// Area in square kilometres for each [`SuitabilityClass`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AreaByClass {
    areas_km2: [f64; 4],
}

impl AreaByClass {
    /// Builds the mapping by asking `f` for each class's area.
    #[must_use]
    pub fn from_fn(mut f: impl FnMut(SuitabilityClass) -> f64) -> Self {
        let mut areas_km2 = [0.0; 4];
        for class in SuitabilityClass::all() {
            areas_km2[class.index()] = f(*class);
        }
        Self { areas_km2 }
    }

    /// Area of one class in km².
    #[must_use]
    pub const fn get(&self, class: SuitabilityClass) -> f64 {
        self.areas_km2[class.index()]
    }

    /// Iterates `(class, km²)` pairs, most suitable first.
    pub fn iter(&self) -> impl Iterator<Item = (SuitabilityClass, f64)> + '_ {
        SuitabilityClass::all()
            .iter()
            .map(|class| (*class, self.get(*class)))
    }

    /// Sum over every class.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.areas_km2.iter().sum()
    }
}

/// A raster layer the pipeline can request from a backend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LayerName {
    /// Terrain height in metres.
    Elevation,
    /// Terrain slope in degrees, derived from elevation.
    Slope,
    /// Land-cover class code.
    #[serde(rename = "landcover")]
    #[strum(serialize = "landcover")]
    LandCover,
    /// Mean daily downward surface solar radiation (J/m²).
    SolarRadiation,
}

/// Map centre and zoom that frame an area of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportFrame {
    /// Centre latitude.
    pub center_lat: f64,
    /// Centre longitude.
    pub center_lon: f64,
    /// Integer web-map zoom level (1-16).
    pub zoom: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec<Vec<f64>>> {
        vec![vec![
            vec![10.0, 20.0],
            vec![11.0, 20.0],
            vec![11.0, 21.0],
            vec![10.0, 21.0],
            vec![10.0, 20.0],
        ]]
    }

    #[test]
    fn accepts_closed_square() {
        let aoi = AreaOfInterest::from_coordinates(&square()).unwrap();
        assert_eq!(aoi.rings().len(), 1);
        assert_eq!(aoi.position_count(), 5);
    }

    #[test]
    fn closes_open_ring() {
        let mut coords = square();
        coords[0].pop();
        let aoi = AreaOfInterest::from_coordinates(&coords).unwrap();
        assert_eq!(aoi.exterior().first(), aoi.exterior().last());
        assert_eq!(aoi.exterior().len(), 5);
    }

    #[test]
    fn drops_altitude_ordinate() {
        let coords = vec![vec![
            vec![0.0, 0.0, 5.0],
            vec![1.0, 0.0, 5.0],
            vec![1.0, 1.0, 5.0],
            vec![0.0, 0.0, 5.0],
        ]];
        let aoi = AreaOfInterest::from_coordinates(&coords).unwrap();
        assert_eq!(aoi.exterior()[1], [1.0, 0.0]);
    }

    #[test]
    fn rejects_bad_coordinates() {
        assert_eq!(
            AreaOfInterest::from_coordinates(&[]),
            Err(InvalidAoiError::Empty)
        );
        assert_eq!(
            AreaOfInterest::from_coordinates(&[vec![]]),
            Err(InvalidAoiError::EmptyRing { ring: 0 })
        );
        assert_eq!(
            AreaOfInterest::from_coordinates(&[vec![vec![0.0, 0.0], vec![1.0, 1.0]]]),
            Err(InvalidAoiError::TooFewPositions {
                ring: 0,
                positions: 3
            })
        );
        assert_eq!(
            AreaOfInterest::from_coordinates(&[vec![vec![0.0]]]),
            Err(InvalidAoiError::MalformedPosition { ring: 0, index: 0 })
        );
        assert_eq!(
            AreaOfInterest::from_coordinates(&[vec![vec![200.0, 0.0]]]),
            Err(InvalidAoiError::OutOfRange { ring: 0, index: 0 })
        );
    }

    #[test]
    fn bounding_box_covers_rings() {
        let aoi = AreaOfInterest::from_coordinates(&square()).unwrap();
        let bbox = BoundingBox::from_rings(aoi.rings()).unwrap();
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 11.0, 21.0));
        assert!((bbox.delta_lon() - 1.0).abs() < f64::EPSILON);
        assert_eq!(BoundingBox::from_rings(&[]), None);
    }

    #[test]
    fn class_values_roundtrip() {
        for class in SuitabilityClass::all() {
            assert_eq!(SuitabilityClass::from_value(class.value()), Some(*class));
        }
        assert_eq!(SuitabilityClass::from_value(0), None);
        assert_eq!(SuitabilityClass::MostSuitable.to_string(), "Most Suitable");
        assert_eq!(
            "Not Suitable".parse::<SuitabilityClass>().unwrap(),
            SuitabilityClass::NotSuitable
        );
    }

    #[test]
    fn layer_names_match_catalog_keys() {
        assert_eq!(LayerName::LandCover.as_ref(), "landcover");
        assert_eq!(LayerName::SolarRadiation.as_ref(), "solar_radiation");
    }

    #[test]
    fn area_by_class_in_fixed_order() {
        let areas = AreaByClass::from_fn(|c| f64::from(c.value()));
        let names: Vec<String> = areas.iter().map(|(c, _)| c.to_string()).collect();
        assert_eq!(
            names,
            [
                "Most Suitable",
                "Medium Suitable",
                "Less Suitable",
                "Not Suitable",
            ]
        );
        assert!((areas.total() - 10.0).abs() < f64::EPSILON);
    }
}
