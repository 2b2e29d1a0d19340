//! Candidate generation: builds the field-independent [`TemplatePool`] (C3)
//! from the crop catalog and weather series, then expands it into concrete
//! per-(field, crop, template, area_level) [`AllocationCandidate`]s (C5) for
//! a solver to consume.
//!
//! Building the pool is the one place `enable_parallel_candidate_generation`
//! (spec.md §5/§6.3) takes effect: each crop's [`generate_periods`] call is
//! independent of every other crop's, so with the `parallel` feature the
//! per-crop generation runs via `rayon`'s `par_iter`. Results are collected
//! in the caller-supplied crop order regardless of which thread finishes
//! first — `Vec::collect` over a parallel iterator preserves input order —
//! so the merge is the stable `(crop_id, start_date)` key spec.md §5
//! requires, never completion order.

use std::collections::HashMap;

use crop_core::error::CoreResult;
use crop_core::periods::{generate_periods, rank_and_truncate};
use crop_core::templates::{PeriodTemplate, TemplatePool};
use crop_core::{Crop, CropId, Field, WeatherSeries};

use crate::candidate::AllocationCandidate;
use crate::config::OptimizerConfig;

fn build_one_crop_pool(crop: &Crop, weather: &WeatherSeries, horizon_start: chrono::NaiveDate, horizon_end: chrono::NaiveDate, max_templates_per_crop: usize) -> CoreResult<(CropId, Vec<PeriodTemplate>)> {
    let periods = generate_periods(crop, weather, horizon_start, horizon_end)?;
    // Rank by ascending growth_days: shorter cycles admit more cultivation
    // rounds within the horizon, the objective proxy spec.md §4.2 names
    // first ("e.g., ascending growth_days").
    let ranked = rank_and_truncate(periods, max_templates_per_crop, |p| p.growth_days);
    let templates = ranked.into_iter().map(PeriodTemplate::from_candidate).collect();
    Ok((crop.crop_id.clone(), templates))
}

/// Builds the per-crop [`TemplatePool`] (component C3) once per plan.
pub fn build_template_pool(
    crops: &[Crop],
    weather: &WeatherSeries,
    horizon_start: chrono::NaiveDate,
    horizon_end: chrono::NaiveDate,
    config: &OptimizerConfig,
) -> CoreResult<TemplatePool> {
    let results: Vec<CoreResult<(CropId, Vec<PeriodTemplate>)>> = if config.enable_parallel_candidate_generation {
        build_crop_pools_parallel(crops, weather, horizon_start, horizon_end, config.max_templates_per_crop)
    } else {
        crops
            .iter()
            .map(|crop| build_one_crop_pool(crop, weather, horizon_start, horizon_end, config.max_templates_per_crop))
            .collect()
    };

    let mut pool = TemplatePool::new();
    for result in results {
        let (crop_id, templates) = result?;
        pool.insert_crop(crop_id, templates);
    }
    log::info!("template pool built for {} crop(s)", crops.len());
    Ok(pool)
}

#[cfg(feature = "parallel")]
fn build_crop_pools_parallel(
    crops: &[Crop],
    weather: &WeatherSeries,
    horizon_start: chrono::NaiveDate,
    horizon_end: chrono::NaiveDate,
    max_templates_per_crop: usize,
) -> Vec<CoreResult<(CropId, Vec<PeriodTemplate>)>> {
    use rayon::prelude::*;
    crops
        .par_iter()
        .map(|crop| build_one_crop_pool(crop, weather, horizon_start, horizon_end, max_templates_per_crop))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn build_crop_pools_parallel(
    crops: &[Crop],
    weather: &WeatherSeries,
    horizon_start: chrono::NaiveDate,
    horizon_end: chrono::NaiveDate,
    max_templates_per_crop: usize,
) -> Vec<CoreResult<(CropId, Vec<PeriodTemplate>)>> {
    crops
        .iter()
        .map(|crop| build_one_crop_pool(crop, weather, horizon_start, horizon_end, max_templates_per_crop))
        .collect()
}

/// Expands the pool into concrete candidates: every (field, crop,
/// top-`top_k` template, area_level) combination. `fields` may be the full
/// field catalog (greedy) or a single-element slice (DP, solved per field).
pub fn generate_candidates<'a>(
    fields: &'a [Field],
    crops_by_id: &HashMap<CropId, &'a Crop>,
    pool: &'a TemplatePool,
    top_k: usize,
    area_levels: &[f64],
) -> Vec<AllocationCandidate<'a>> {
    let mut candidates = Vec::new();
    for crop_id in pool.crop_ids() {
        let Some(&crop) = crops_by_id.get(crop_id) else { continue };
        let templates = pool.top(crop_id, top_k);
        for field in fields {
            for template in templates {
                for &level in area_levels {
                    candidates.push(AllocationCandidate::new(field, crop, template, field.area * level));
                }
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crop_core::{CropId as CCropId, FieldId, StageRequirement, TemperatureProfile, WeatherDay};

    fn profile() -> TemperatureProfile {
        TemperatureProfile {
            base_temperature: 10.0,
            optimal_min: 25.0,
            optimal_max: 30.0,
            low_stress_threshold: 15.0,
            high_stress_threshold: 35.0,
            frost_threshold: 2.0,
            max_temperature: 42.0,
            sterility_risk_threshold: None,
        }
    }

    fn crop(id: &str) -> Crop {
        Crop {
            crop_id: CCropId::new(id),
            variety: None,
            area_per_unit: 0.25,
            revenue_per_area: Some(2.0),
            max_revenue: None,
            crop_family: "Poaceae".into(),
            stage_requirements: vec![StageRequirement::new(1, profile(), 500.0)],
        }
    }

    fn weather(days: i64) -> WeatherSeries {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = (0..days)
            .map(|offset| WeatherDay {
                date: start + chrono::Duration::days(offset),
                temperature_mean: Some(25.0),
                temperature_max: None,
                temperature_min: None,
            })
            .collect();
        WeatherSeries::new(series).unwrap()
    }

    #[test]
    fn test_build_template_pool_populates_every_crop() {
        let crops = vec![crop("rice"), crop("maize")];
        let weather = weather(60);
        let config = OptimizerConfig::default();
        let pool = build_template_pool(&crops, &weather, weather.start_date(), weather.end_date(), &config).unwrap();
        assert!(pool.template_count(&CCropId::new("rice")) > 0);
        assert!(pool.template_count(&CCropId::new("maize")) > 0);
    }

    #[test]
    fn test_generate_candidates_covers_field_crop_area_level_cross_product() {
        let crops = vec![crop("rice")];
        let weather = weather(60);
        let config = OptimizerConfig::default();
        let pool = build_template_pool(&crops, &weather, weather.start_date(), weather.end_date(), &config).unwrap();

        let fields = vec![
            Field::new(FieldId::new("f1"), "Field 1", 1000.0, 5000.0),
            Field::new(FieldId::new("f2"), "Field 2", 2000.0, 8000.0),
        ];
        let crops_by_id: HashMap<CropId, &Crop> = crops.iter().map(|c| (c.crop_id.clone(), c)).collect();

        let top_k = 5;
        let area_levels = vec![0.5, 1.0];
        let candidates = generate_candidates(&fields, &crops_by_id, &pool, top_k, &area_levels);

        let template_count = pool.template_count(&CCropId::new("rice")).min(top_k);
        assert_eq!(candidates.len(), fields.len() * template_count * area_levels.len());
    }
}
