//! Per-class area aggregation and derived energy and panel estimates.

use solar_siting_raster::{Band, RasterExpr, RasterImage, Statistics};
use solar_siting_suitability_models::{AreaByClass, SuitabilityClass};

/// Peak irradiance factor, kW/m².
pub const IRRADIANCE_FACTOR: f64 = 1.7;
/// Conversion efficiency.
pub const EFFICIENCY: f64 = 0.85;
/// Generation days per year used for the energy estimate.
pub const GENERATION_DAYS: f64 = 300.0;
/// Scale applied to the Most Suitable area for the panel count.
pub const PANEL_SCALE: f64 = 1_000_000.0;

const SQUARE_METRES_PER_KM2: f64 = 1_000_000.0;

/// Energy and panel estimates for the Most Suitable area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldEstimate {
    /// Annual energy in MWh, rounded to 3 decimals.
    pub power_generation_mwh: f64,
    /// Panel count, rounded to the nearest integer.
    pub num_panels: u64,
}

/// One indicator band per class, weighted by pixel area in km².
///
/// Band names are the class display names so the summed statistics are
/// keyed by class.
#[must_use]
pub fn area_image(suitability: &RasterExpr) -> RasterImage {
    let km2 = || RasterExpr::pixel_area().divide(SQUARE_METRES_PER_KM2);
    RasterImage {
        bands: SuitabilityClass::all()
            .iter()
            .map(|class| Band {
                name: class.to_string(),
                expression: suitability
                    .clone()
                    .eq(f64::from(class.value()))
                    .multiply(km2()),
            })
            .collect(),
    }
}

/// Reads unrounded per-class areas from summed statistics. Missing keys
/// count as zero.
#[must_use]
pub fn areas_from_statistics(stats: &Statistics) -> AreaByClass {
    AreaByClass::from_fn(|class| {
        stats.get(class.as_ref()).unwrap_or_else(|| {
            log::warn!("No area statistic for {class}, defaulting to 0");
            0.0
        })
    })
}

/// Rounds to `decimals` places, ties to even.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_count(value: f64) -> u64 {
    value.round_ties_even() as u64
}

/// Rounds every class area to 2 decimals for reporting.
#[must_use]
pub fn rounded_areas(areas: &AreaByClass) -> AreaByClass {
    AreaByClass::from_fn(|class| round_to(areas.get(class), 2))
}

/// Derives energy and panel estimates from the unrounded Most Suitable
/// area in km².
#[must_use]
pub fn estimate_yield(most_suitable_km2: f64) -> YieldEstimate {
    let area = if most_suitable_km2.is_finite() {
        most_suitable_km2.max(0.0)
    } else {
        0.0
    };
    let base = area * IRRADIANCE_FACTOR * EFFICIENCY;

    YieldEstimate {
        power_generation_mwh: round_to(base * GENERATION_DAYS, 3),
        num_panels: round_count(base * PANEL_SCALE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_square_kilometre() {
        let estimate = estimate_yield(1.0);
        assert!((estimate.power_generation_mwh - 433.5).abs() < 1e-9);
        assert_eq!(estimate.num_panels, 1_445_000);
    }

    #[test]
    fn zero_area_yields_nothing() {
        let estimate = estimate_yield(0.0);
        assert!(estimate.power_generation_mwh.abs() < f64::EPSILON);
        assert_eq!(estimate.num_panels, 0);
        assert_eq!(estimate_yield(f64::NAN).num_panels, 0);
    }

    #[test]
    fn ties_round_to_even() {
        assert!((round_to(0.125, 2) - 0.12).abs() < f64::EPSILON);
        assert!((round_to(0.625, 2) - 0.62).abs() < f64::EPSILON);
        assert!((round_to(0.135, 2) - 0.14).abs() < f64::EPSILON);
        assert!((round_to(2.0625, 3) - 2.062).abs() < f64::EPSILON);
        assert_eq!(round_count(2.5), 2);
        assert_eq!(round_count(3.5), 4);
        assert_eq!(round_count(2.6), 3);
    }

    #[test]
    fn yield_is_monotonic_in_area() {
        let mut previous = estimate_yield(0.0);
        for step in 1..=200 {
            let next = estimate_yield(f64::from(step) * 0.037);
            assert!(next.power_generation_mwh >= previous.power_generation_mwh);
            assert!(next.num_panels >= previous.num_panels);
            previous = next;
        }
    }

    #[test]
    fn missing_statistics_default_to_zero() {
        let mut stats = Statistics::default();
        stats.insert("Most Suitable", Some(1.234_56));
        stats.insert("Less Suitable", None);
        let areas = areas_from_statistics(&stats);
        assert!((areas.get(SuitabilityClass::MostSuitable) - 1.234_56).abs() < f64::EPSILON);
        assert!(areas.get(SuitabilityClass::LessSuitable).abs() < f64::EPSILON);
        assert!(areas.get(SuitabilityClass::NotSuitable).abs() < f64::EPSILON);

        let rounded = rounded_areas(&areas);
        assert!((rounded.get(SuitabilityClass::MostSuitable) - 1.23).abs() < f64::EPSILON);
    }

    #[test]
    fn area_bands_named_by_class() {
        let image = area_image(&RasterExpr::constant(1.0));
        let names: Vec<&str> = image.bands.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Most Suitable",
                "Medium Suitable",
                "Less Suitable",
                "Not Suitable",
            ]
        );
    }
}
