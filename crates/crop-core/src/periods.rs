//! Sliding-window period generator (component C2).
//!
//! [`generate_periods`] produces, for a single crop and a single weather
//! series, one [`CandidatePeriod`] per admissible start date in the
//! requested horizon: the earliest completion date at which the crop's
//! total required GDD has accumulated, the resulting growth-day count, and
//! the window's yield factor.
//!
//! The window advances with a two-pointer sweep: the end pointer `j` only
//! ever moves forward, and the start pointer `i` removes exactly one day's
//! contribution per step, so every day is added to the running totals at
//! most once and removed at most once — `O(M)` in the horizon length `M`,
//! not `O(M * growth_days)`.
//!
//! **Stage assignment.** Which of a crop's stages governs a given calendar
//! day (and therefore which `TemperatureProfile` gates that day's
//! efficiency, and whether sterility-risk stress can apply) is computed once
//! per crop in a single forward pass starting at the horizon's earliest
//! admissible start date, as if cultivation began on that date. This keeps
//! the whole generator linear; re-deriving the exact stage boundary for
//! every one of the `O(M)` candidate start dates independently would not be.
//! See `DESIGN.md` for the reasoning.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::gdd::{clamp_yield_factor, daily_modified_gdd, daily_yield_multiplier};
use crate::{Crop, CropId, WeatherSeries};

/// One admissible (crop, start_date) window, field-independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePeriod {
    pub crop_id: CropId,
    pub start_date: NaiveDate,
    pub completion_date: NaiveDate,
    pub growth_days: u32,
    pub accumulated_gdd: f64,
    pub yield_factor: f64,
}

/// Per-day precomputed stage assignment and contribution, built once per
/// crop over the full weather series starting at `horizon_start`.
struct DailyContribution {
    gdd: f64,
    yield_multiplier: f64,
}

fn precompute_daily_contributions(crop: &Crop, weather: &WeatherSeries, start_idx: usize) -> Vec<DailyContribution> {
    let mut contributions = Vec::with_capacity(weather.len().saturating_sub(start_idx));
    let mut stage_idx = 0usize;
    let mut stage_accumulated = 0.0f64;

    for day in &weather.days()[start_idx..] {
        let stage = &crop.stage_requirements[stage_idx];
        let t = day.effective_mean();
        let gdd = t.map(|t| daily_modified_gdd(&stage.profile, t)).unwrap_or(0.0);
        let yield_multiplier = t
            .map(|t| daily_yield_multiplier(&stage.profile, t, stage.is_reproductive))
            .unwrap_or(1.0);

        contributions.push(DailyContribution { gdd, yield_multiplier });

        stage_accumulated += gdd;
        while stage_accumulated >= stage.required_gdd && stage_idx + 1 < crop.stage_requirements.len() {
            stage_accumulated -= crop.stage_requirements[stage_idx].required_gdd;
            stage_idx += 1;
        }
    }

    contributions
}

/// Generates every admissible (crop, start_date) period in
/// `[horizon_start, horizon_end]`, in start-date order.
///
/// `weather` must cover at least `horizon_start`; if the window for the
/// latest admissible start date cannot close within the available weather,
/// returns [`CoreError::WeatherRangeInsufficient`] rather than truncating
/// the result silently.
pub fn generate_periods(
    crop: &Crop,
    weather: &WeatherSeries,
    horizon_start: NaiveDate,
    horizon_end: NaiveDate,
) -> CoreResult<Vec<CandidatePeriod>> {
    if horizon_end < horizon_start {
        return Err(CoreError::Input(format!(
            "horizon is inverted: start {} is after end {}",
            horizon_start, horizon_end
        )));
    }

    let start_idx = weather.index_of(horizon_start).ok_or_else(|| {
        CoreError::Input(format!(
            "horizon_start {} is outside the weather series [{}, {}]",
            horizon_start,
            weather.start_date(),
            weather.end_date()
        ))
    })?;

    let required_total = crop.required_total_gdd();
    let contributions = precompute_daily_contributions(crop, weather, start_idx);

    let mut periods = Vec::new();
    let mut window_gdd = 0.0f64;
    let mut running_product = 1.0f64;
    let mut j = 0usize; // index into `contributions`, i.e. absolute index `start_idx + j`
    let mut i = 0usize; // index into `contributions` for the window start

    loop {
        let absolute_i = start_idx + i;
        let day_i = match weather.day_at(absolute_i) {
            Some(d) => d,
            None => break,
        };
        if day_i.date > horizon_end {
            break;
        }

        if i > 0 {
            let removed = &contributions[i - 1];
            window_gdd -= removed.gdd;
            running_product /= removed.yield_multiplier;
        }

        while window_gdd < required_total {
            if j >= contributions.len() {
                return Err(CoreError::WeatherRangeInsufficient(format!(
                    "crop '{}' cannot close a growth window starting {}: weather series ends {} without reaching required GDD {}",
                    crop.crop_id,
                    day_i.date,
                    weather.end_date(),
                    required_total
                )));
            }
            window_gdd += contributions[j].gdd;
            running_product *= contributions[j].yield_multiplier;
            j += 1;
        }

        let completion_idx = start_idx + j - 1;
        let completion_date = weather
            .day_at(completion_idx)
            .expect("completion index was just grown within bounds")
            .date;
        let growth_days = (j - i) as u32;

        periods.push(CandidatePeriod {
            crop_id: crop.crop_id.clone(),
            start_date: day_i.date,
            completion_date,
            growth_days,
            accumulated_gdd: window_gdd,
            yield_factor: clamp_yield_factor(running_product),
        });

        i += 1;
    }

    log::debug!(
        "generated {} period(s) for crop '{}' over horizon [{}, {}]",
        periods.len(),
        crop.crop_id,
        horizon_start,
        horizon_end
    );

    Ok(periods)
}

/// Sorts and truncates generated periods to `max_templates_per_crop`,
/// ranking by the caller-supplied proxy. `period_template::PeriodRanking`
/// callers typically prefer shorter growth windows or higher yield factors;
/// this helper stays generic over the key so either (or a combination) can
/// be used without duplicating the sort/truncate logic.
pub fn rank_and_truncate<K: Ord>(
    mut periods: Vec<CandidatePeriod>,
    max_templates_per_crop: usize,
    mut key_fn: impl FnMut(&CandidatePeriod) -> K,
) -> Vec<CandidatePeriod> {
    periods.sort_by(|a, b| key_fn(a).cmp(&key_fn(b)));
    periods.truncate(max_templates_per_crop);
    periods
}
