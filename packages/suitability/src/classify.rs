//! Threshold classification of raw layers into contribution rasters.
//!
//! Each criterion is an ordered list of [`OverwriteRule`]s applied to a
//! zero raster. A cell keeps `0` unless a rule's predicate holds, in which
//! case the rule's value is written. When several rules match the same
//! cell, [`RulePrecedence`] decides which write survives.
//!
//! Predicates on masked cells never hold, so cells without data score `0`
//! here and are removed later by the final clip.

use serde::{Deserialize, Serialize};
use solar_siting_raster::{BinaryOp, RasterExpr};
use strum_macros::{AsRefStr, Display, EnumString};

/// Lower elevation bound (exclusive), metres.
pub const MIN_ELEVATION_M: f64 = 30.0;
/// Upper elevation bound (exclusive), metres.
pub const MAX_ELEVATION_M: f64 = 2000.0;
/// Land-cover code for shrubland.
pub const SHRUBLAND: f64 = 20.0;
/// Land-cover code for bare or sparse vegetation.
pub const BARREN: f64 = 60.0;

/// Resolution order for overlapping overwrite rules.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RulePrecedence {
    /// Rules are written in order; the last matching rule wins.
    #[default]
    LastMatch,
    /// The first matching rule wins.
    FirstMatch,
}

/// The per-cell inputs a predicate can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    /// Elevation in metres.
    Elevation,
    /// Slope in degrees.
    Slope,
    /// Land-cover class code.
    LandCover,
}

/// Clipped input rasters for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    /// Elevation layer.
    pub elevation: RasterExpr,
    /// Slope layer.
    pub slope: RasterExpr,
    /// Land-cover layer.
    pub landcover: RasterExpr,
}

impl Inputs {
    fn get(&self, input: Input) -> &RasterExpr {
        match input {
            Input::Elevation => &self.elevation,
            Input::Slope => &self.slope,
            Input::LandCover => &self.landcover,
        }
    }
}

/// Values of every input at one cell. `None` means masked.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellValues {
    /// Elevation in metres.
    pub elevation: Option<f64>,
    /// Slope in degrees.
    pub slope: Option<f64>,
    /// Land-cover class code.
    pub landcover: Option<f64>,
}

impl CellValues {
    /// A fully populated cell.
    #[must_use]
    pub const fn new(elevation: f64, slope: f64, landcover: f64) -> Self {
        Self {
            elevation: Some(elevation),
            slope: Some(slope),
            landcover: Some(landcover),
        }
    }

    const fn get(&self, input: Input) -> Option<f64> {
        match input {
            Input::Elevation => self.elevation,
            Input::Slope => self.slope,
            Input::LandCover => self.landcover,
        }
    }
}

/// A boolean condition over cell inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `input <operator> threshold`
    Compare {
        /// Input tested.
        input: Input,
        /// Comparison operator.
        operator: BinaryOp,
        /// Threshold.
        threshold: f64,
    },
    /// Both hold.
    And(Box<Self>, Box<Self>),
    /// Either holds.
    Or(Box<Self>, Box<Self>),
}

impl Predicate {
    /// `input < threshold`
    #[must_use]
    pub const fn lt(input: Input, threshold: f64) -> Self {
        Self::Compare {
            input,
            operator: BinaryOp::Lt,
            threshold,
        }
    }

    /// `input > threshold`
    #[must_use]
    pub const fn gt(input: Input, threshold: f64) -> Self {
        Self::Compare {
            input,
            operator: BinaryOp::Gt,
            threshold,
        }
    }

    /// `input == threshold`
    #[must_use]
    pub const fn eq(input: Input, threshold: f64) -> Self {
        Self::Compare {
            input,
            operator: BinaryOp::Eq,
            threshold,
        }
    }

    /// Logical and.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Logical or.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the predicate at one cell. Masked inputs never match.
    #[must_use]
    pub fn holds(&self, cell: &CellValues) -> bool {
        self.value(cell).is_some_and(|v| v != 0.0)
    }

    fn value(&self, cell: &CellValues) -> Option<f64> {
        match self {
            Self::Compare {
                input,
                operator,
                threshold,
            } => Some(operator.apply(cell.get(*input)?, *threshold)),
            Self::And(lhs, rhs) => Some(BinaryOp::And.apply(lhs.value(cell)?, rhs.value(cell)?)),
            Self::Or(lhs, rhs) => Some(BinaryOp::Or.apply(lhs.value(cell)?, rhs.value(cell)?)),
        }
    }

    /// Builds the indicator raster for this predicate.
    #[must_use]
    pub fn to_expr(&self, inputs: &Inputs) -> RasterExpr {
        match self {
            Self::Compare {
                input,
                operator,
                threshold,
            } => inputs
                .get(*input)
                .clone()
                .binary(*operator, RasterExpr::constant(*threshold)),
            Self::And(lhs, rhs) => lhs.to_expr(inputs).and(rhs.to_expr(inputs)),
            Self::Or(lhs, rhs) => lhs.to_expr(inputs).or(rhs.to_expr(inputs)),
        }
    }
}

/// Writes `value` wherever `predicate` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct OverwriteRule {
    /// Cells to overwrite.
    pub predicate: Predicate,
    /// Contribution written.
    pub value: f64,
}

/// An ordered list of overwrite rules over a zero raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<OverwriteRule>,
}

impl RuleSet {
    /// Creates a rule set from `(predicate, value)` pairs in order.
    #[must_use]
    pub fn new(rules: impl IntoIterator<Item = (Predicate, f64)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(predicate, value)| OverwriteRule { predicate, value })
                .collect(),
        }
    }

    /// Rules in write order. The winning write is the last one applied.
    fn write_order(
        &self,
        precedence: RulePrecedence,
    ) -> Box<dyn Iterator<Item = &OverwriteRule> + '_> {
        match precedence {
            RulePrecedence::LastMatch => Box::new(self.rules.iter()),
            RulePrecedence::FirstMatch => Box::new(self.rules.iter().rev()),
        }
    }

    /// Contribution of one cell.
    #[must_use]
    pub fn evaluate(&self, cell: &CellValues, precedence: RulePrecedence) -> f64 {
        self.write_order(precedence).fold(0.0, |acc, rule| {
            if rule.predicate.holds(cell) {
                rule.value
            } else {
                acc
            }
        })
    }

    /// Builds the contribution raster.
    #[must_use]
    pub fn to_expr(&self, inputs: &Inputs, precedence: RulePrecedence) -> RasterExpr {
        self.write_order(precedence)
            .fold(RasterExpr::constant(0.0), |acc, rule| {
                acc.where_(rule.predicate.to_expr(inputs), rule.value)
            })
    }
}

/// 1 where `30 < elevation < 2000`.
#[must_use]
pub fn elevation_rules() -> RuleSet {
    RuleSet::new([(
        Predicate::lt(Input::Elevation, MAX_ELEVATION_M)
            .and(Predicate::gt(Input::Elevation, MIN_ELEVATION_M)),
        1.0,
    )])
}

/// Gentle slopes score 1, low-lying moderate slopes 0.6, steep slopes 0.4.
///
/// The bands overlap: a cell with slope above 10 and elevation below 10
/// matches both the second and third rule.
#[must_use]
pub fn slope_rules() -> RuleSet {
    RuleSet::new([
        (Predicate::lt(Input::Slope, 5.0), 1.0),
        (
            Predicate::gt(Input::Slope, 5.0).and(Predicate::lt(Input::Elevation, 10.0)),
            0.6,
        ),
        (Predicate::gt(Input::Slope, 10.0), 0.4),
    ])
}

/// 1 for shrubland or barren land.
#[must_use]
pub fn landcover_rules() -> RuleSet {
    RuleSet::new([(
        Predicate::eq(Input::LandCover, SHRUBLAND).or(Predicate::eq(Input::LandCover, BARREN)),
        1.0,
    )])
}

/// The three contribution rasters for a set of inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Contributions {
    /// Elevation contribution.
    pub elevation: RasterExpr,
    /// Slope contribution.
    pub slope: RasterExpr,
    /// Land-cover contribution.
    pub landcover: RasterExpr,
}

/// Classifies every criterion.
#[must_use]
pub fn classify(inputs: &Inputs, precedence: RulePrecedence) -> Contributions {
    Contributions {
        elevation: elevation_rules().to_expr(inputs, precedence),
        slope: slope_rules().to_expr(inputs, precedence),
        landcover: landcover_rules().to_expr(inputs, precedence),
    }
}
