//! Lazy raster expression trees.
//!
//! A [`RasterExpr`] describes a per-pixel computation over source layers.
//! The builder methods mirror the usual image algebra (`lt`, `add`,
//! `where_`, `update_mask`, ...) so classification rules read the way they
//! would in a raster calculator. Comparisons and boolean operators produce
//! `1.0` for true and `0.0` for false; any masked operand masks the result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use solar_siting_suitability_models::{AreaOfInterest, LayerName};

/// Where a source layer's pixels come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSource {
    /// A single catalog image.
    Image {
        /// Asset identifier.
        asset: String,
        /// Band to read.
        band: String,
    },
    /// The first image of a collection, in the collection's own order.
    CollectionFirst {
        /// Collection identifier.
        collection: String,
        /// Band to read.
        band: String,
    },
    /// The per-pixel mean of a collection over a date window.
    CollectionMean {
        /// Collection identifier.
        collection: String,
        /// Band to read.
        band: String,
        /// First day of the window (inclusive).
        start: NaiveDate,
        /// Last day of the window.
        end: NaiveDate,
    },
    /// A layer registered directly with an in-memory backend.
    Named {
        /// Layer name.
        name: LayerName,
    },
}

/// Binary pixel operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// `lhs + rhs`
    Add,
    /// `lhs * rhs`
    Multiply,
    /// `lhs / rhs`
    Divide,
    /// `lhs < rhs`
    Lt,
    /// `lhs > rhs`
    Gt,
    /// `lhs == rhs`
    Eq,
    /// `lhs >= rhs`
    Gte,
    /// Both operands non-zero.
    And,
    /// Either operand non-zero.
    Or,
}

impl BinaryOp {
    /// Applies the operator to two unmasked pixel values.
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        let truth = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Self::Add => lhs + rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide => lhs / rhs,
            Self::Lt => truth(lhs < rhs),
            Self::Gt => truth(lhs > rhs),
            #[allow(clippy::float_cmp)]
            Self::Eq => truth(lhs == rhs),
            Self::Gte => truth(lhs >= rhs),
            Self::And => truth(lhs != 0.0 && rhs != 0.0),
            Self::Or => truth(lhs != 0.0 || rhs != 0.0),
        }
    }
}

/// A lazy per-pixel raster computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RasterExpr {
    /// The same value everywhere.
    Constant {
        /// Pixel value.
        value: f64,
    },
    /// Pixels of a source layer.
    Source {
        /// Where the pixels come from.
        source: LayerSource,
    },
    /// Terrain slope in degrees of an elevation input.
    Slope {
        /// Elevation in metres.
        input: Box<Self>,
    },
    /// Area of each pixel in square metres.
    PixelArea,
    /// A binary operator.
    Binary {
        /// Operator.
        operator: BinaryOp,
        /// Left operand.
        lhs: Box<Self>,
        /// Right operand.
        rhs: Box<Self>,
    },
    /// Replaces `input` with `value` wherever `condition` is non-zero.
    Where {
        /// The raster being overwritten.
        input: Box<Self>,
        /// Cells to overwrite.
        condition: Box<Self>,
        /// Replacement value.
        value: f64,
    },
    /// Masks `input` wherever `mask` is zero or masked.
    UpdateMask {
        /// The raster being masked.
        input: Box<Self>,
        /// Mask raster.
        mask: Box<Self>,
    },
    /// Masks every pixel outside an area of interest.
    Clip {
        /// The raster being clipped.
        input: Box<Self>,
        /// Region to keep.
        aoi: AreaOfInterest,
    },
}

#[allow(clippy::should_implement_trait)]
impl RasterExpr {
    /// A constant raster.
    #[must_use]
    pub const fn constant(value: f64) -> Self {
        Self::Constant { value }
    }

    /// A source layer.
    #[must_use]
    pub const fn source(source: LayerSource) -> Self {
        Self::Source { source }
    }

    /// The pixel-area raster in square metres.
    #[must_use]
    pub const fn pixel_area() -> Self {
        Self::PixelArea
    }

    /// Applies any binary operator.
    #[must_use]
    pub fn binary(self, operator: BinaryOp, rhs: Self) -> Self {
        Self::Binary {
            operator,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    /// Slope in degrees of this elevation raster.
    #[must_use]
    pub fn slope(self) -> Self {
        Self::Slope {
            input: Box::new(self),
        }
    }

    /// `self + rhs`
    #[must_use]
    pub fn add(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    /// `self * rhs`
    #[must_use]
    pub fn multiply(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Multiply, rhs)
    }

    /// `self / value`
    #[must_use]
    pub fn divide(self, value: f64) -> Self {
        self.binary(BinaryOp::Divide, Self::constant(value))
    }

    /// `self < value`
    #[must_use]
    pub fn lt(self, value: f64) -> Self {
        self.binary(BinaryOp::Lt, Self::constant(value))
    }

    /// `self > value`
    #[must_use]
    pub fn gt(self, value: f64) -> Self {
        self.binary(BinaryOp::Gt, Self::constant(value))
    }

    /// `self == value`
    #[must_use]
    pub fn eq(self, value: f64) -> Self {
        self.binary(BinaryOp::Eq, Self::constant(value))
    }

    /// `self >= value`
    #[must_use]
    pub fn gte(self, value: f64) -> Self {
        self.binary(BinaryOp::Gte, Self::constant(value))
    }

    /// Logical and.
    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    /// Logical or.
    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    /// Overwrites cells where `condition` holds with `value`.
    #[must_use]
    pub fn where_(self, condition: Self, value: f64) -> Self {
        Self::Where {
            input: Box::new(self),
            condition: Box::new(condition),
            value,
        }
    }

    /// Masks cells where `mask` is zero.
    #[must_use]
    pub fn update_mask(self, mask: Self) -> Self {
        Self::UpdateMask {
            input: Box::new(self),
            mask: Box::new(mask),
        }
    }

    /// Masks cells outside `aoi`.
    #[must_use]
    pub fn clip(self, aoi: AreaOfInterest) -> Self {
        Self::Clip {
            input: Box::new(self),
            aoi,
        }
    }
}
