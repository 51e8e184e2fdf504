//! Combination of contributions into ordinal suitability classes.

use solar_siting_raster::{BinaryOp, RasterExpr};
use solar_siting_suitability_models::{AreaOfInterest, SuitabilityClass};

use crate::classify::Contributions;

/// Raw score to class rules, applied as overwrites of a zero raster in
/// this order. Thresholds are compared with exact floating-point equality.
pub const RECLASS_RULES: [(BinaryOp, f64, SuitabilityClass); 4] = [
    (BinaryOp::Eq, 3.0, SuitabilityClass::MostSuitable),
    (BinaryOp::Eq, 2.6, SuitabilityClass::MediumSuitable),
    (BinaryOp::Eq, 2.4, SuitabilityClass::LessSuitable),
    (BinaryOp::Lt, 2.4, SuitabilityClass::NotSuitable),
];

/// Sums the contributions as `elevation + slope + landcover`.
#[must_use]
pub fn raw_score(contributions: Contributions) -> RasterExpr {
    contributions
        .elevation
        .add(contributions.slope)
        .add(contributions.landcover)
}

/// Reclassifies a raw score raster, masks cells below class 1 and clips
/// the result to `aoi`.
#[must_use]
pub fn reclassify(raw: &RasterExpr, aoi: &AreaOfInterest) -> RasterExpr {
    let classes = RECLASS_RULES
        .iter()
        .fold(RasterExpr::constant(0.0), |acc, (op, threshold, class)| {
            acc.where_(
                raw.clone().binary(*op, RasterExpr::constant(*threshold)),
                f64::from(class.value()),
            )
        });
    classes
        .clone()
        .update_mask(classes.gte(1.0))
        .clip(aoi.clone())
}

/// Class of one raw score, or `None` when no rule matches (masked).
#[must_use]
pub fn reclassify_value(raw: f64) -> Option<SuitabilityClass> {
    RECLASS_RULES
        .iter()
        .fold(None, |acc, (op, threshold, class)| {
            if op.apply(raw, *threshold) == 0.0 {
                acc
            } else {
                Some(*class)
            }
        })
}

/// Builds the clipped suitability raster from contributions.
#[must_use]
pub fn combine(contributions: Contributions, aoi: &AreaOfInterest) -> RasterExpr {
    reclassify(&raw_score(contributions), aoi)
}
