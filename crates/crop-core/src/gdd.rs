//! Temperature efficiency, daily modified Growing-Degree-Day accumulation,
//! and the temperature-stress yield factor (component C1).
//!
//! `temperature_efficiency` implements the trapezoidal viability curve: zero
//! below `base_temperature` or at/above `max_temperature`, ramping linearly
//! through the sub-optimal band, flat at `1.0` across the optimal band, and
//! ramping back down through the supra-optimal band. `daily_modified_gdd`
//! multiplies the raw degree-day excess by that efficiency so days outside
//! the crop's viable range stop contributing heat units entirely rather than
//! contributing negative or unbounded amounts.

use crate::{StageRequirement, TemperatureProfile, WeatherDay};

/// Floor applied to the accumulated yield factor; see
/// [`clamp_yield_factor`].
pub const YIELD_FACTOR_FLOOR: f64 = 0.3;

/// Trapezoidal temperature-efficiency curve `E(T) in [0, 1]` for one stage's
/// [`TemperatureProfile`].
pub fn temperature_efficiency(profile: &TemperatureProfile, t: f64) -> f64 {
    if t <= profile.base_temperature || t >= profile.max_temperature {
        0.0
    } else if t < profile.optimal_min {
        (t - profile.base_temperature) / (profile.optimal_min - profile.base_temperature)
    } else if t <= profile.optimal_max {
        1.0
    } else {
        (profile.max_temperature - t) / (profile.max_temperature - profile.optimal_max)
    }
}

/// `daily_gdd = max(T - base, 0) * E(T)`.
pub fn daily_modified_gdd(profile: &TemperatureProfile, t: f64) -> f64 {
    let excess = (t - profile.base_temperature).max(0.0);
    excess * temperature_efficiency(profile, t)
}

/// Per-day multiplicative stress factor applied to the running yield
/// accumulation. `1.0` on a day with no stress condition.
///
/// Sterility risk only fires within a stage marked
/// [`StageRequirement::is_reproductive`]; it stacks with the high-stress
/// multiplier rather than replacing it.
pub fn daily_yield_multiplier(profile: &TemperatureProfile, t: f64, is_reproductive: bool) -> f64 {
    let mut multiplier = 1.0;
    if t >= profile.high_stress_threshold {
        multiplier *= 0.98;
        if is_reproductive {
            if let Some(threshold) = profile.sterility_risk_threshold {
                if t >= threshold {
                    multiplier *= 0.95;
                }
            }
        }
    }
    if t <= profile.low_stress_threshold {
        multiplier *= 0.99;
    }
    multiplier
}

/// Convenience wrapper reading the day's effective mean temperature and
/// computing its yield multiplier for one stage.
pub fn daily_yield_multiplier_for_stage(stage: &StageRequirement, day: &WeatherDay) -> f64 {
    match day.effective_mean() {
        Some(t) => daily_yield_multiplier(&stage.profile, t, stage.is_reproductive),
        None => 1.0,
    }
}

/// Clamps a running product of daily yield multipliers into the documented
/// `[0.3, 1.0]` yield-factor range.
pub fn clamp_yield_factor(raw_product: f64) -> f64 {
    raw_product.max(YIELD_FACTOR_FLOOR).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> TemperatureProfile {
        TemperatureProfile {
            base_temperature: 10.0,
            optimal_min: 25.0,
            optimal_max: 30.0,
            low_stress_threshold: 15.0,
            high_stress_threshold: 35.0,
            frost_threshold: 2.0,
            max_temperature: 42.0,
            sterility_risk_threshold: Some(38.0),
        }
    }

    #[test]
    fn test_efficiency_zero_at_or_below_base() {
        let p = profile();
        assert_eq!(temperature_efficiency(&p, 10.0), 0.0);
        assert_eq!(temperature_efficiency(&p, 5.0), 0.0);
    }

    #[test]
    fn test_efficiency_zero_at_or_above_max() {
        let p = profile();
        assert_eq!(temperature_efficiency(&p, 42.0), 0.0);
        assert_eq!(temperature_efficiency(&p, 50.0), 0.0);
    }

    #[test]
    fn test_efficiency_one_in_optimal_band() {
        let p = profile();
        assert_eq!(temperature_efficiency(&p, 25.0), 1.0);
        assert_eq!(temperature_efficiency(&p, 27.5), 1.0);
        assert_eq!(temperature_efficiency(&p, 30.0), 1.0);
    }

    #[test]
    fn test_efficiency_ramps_linearly_below_optimal() {
        let p = profile();
        // Midpoint between base (10) and optimal_min (25) should be 0.5.
        assert!((temperature_efficiency(&p, 17.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_ramps_linearly_above_optimal() {
        let p = profile();
        // Midpoint between optimal_max (30) and max_temperature (42) should be 0.5.
        assert!((temperature_efficiency(&p, 36.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_daily_modified_gdd_in_optimal_band() {
        let p = profile();
        // spec.md scenario 1: T=25, base=10, E=1 => 15.0
        assert_eq!(daily_modified_gdd(&p, 25.0), 15.0);
    }

    #[test]
    fn test_daily_modified_gdd_zero_outside_band() {
        let p = profile();
        assert_eq!(daily_modified_gdd(&p, 5.0), 0.0);
        assert_eq!(daily_modified_gdd(&p, 42.0), 0.0);
    }

    #[test]
    fn test_yield_multiplier_no_stress() {
        let p = profile();
        assert_eq!(daily_yield_multiplier(&p, 25.0, false), 1.0);
    }

    #[test]
    fn test_yield_multiplier_high_stress() {
        let p = profile();
        assert_eq!(daily_yield_multiplier(&p, 35.0, false), 0.98);
    }

    #[test]
    fn test_yield_multiplier_sterility_risk_only_when_reproductive() {
        let p = profile();
        assert_eq!(daily_yield_multiplier(&p, 38.0, false), 0.98);
        assert!((daily_yield_multiplier(&p, 38.0, true) - (0.98 * 0.95)).abs() < 1e-9);
    }

    #[test]
    fn test_yield_multiplier_low_stress() {
        let p = profile();
        assert_eq!(daily_yield_multiplier(&p, 15.0, false), 0.99);
    }

    #[test]
    fn test_clamp_yield_factor_floors_at_point_three() {
        assert_eq!(clamp_yield_factor(0.01), YIELD_FACTOR_FLOOR);
        assert_eq!(clamp_yield_factor(1.5), 1.0);
        assert!((clamp_yield_factor(0.5) - 0.5).abs() < 1e-12);
    }
}
