//! Greedy solver (component C6).
//!
//! Profit-rate-descending selection with feasibility gating and demand-cap
//! re-ranking (spec.md §4.6):
//!
//! 1. Score every candidate under the current (initially empty) context.
//! 2. Repeatedly take the best-ranked candidate that still fits its field
//!    and accept it.
//! 3. When the accepted crop carries a `max_revenue` cap, re-score every
//!    remaining candidate of that crop (its headroom just shrank) and
//!    re-sort — a candidate whose revenue has clamped to zero sinks to the
//!    bottom instead of being accepted for no benefit.
//! 4. Stop when no remaining candidate fits anywhere, or the wall-clock
//!    deadline passes.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use crop_core::templates::TemplatePool;
use crop_core::{Crop, CropId, Field, FieldId, InteractionRule};

use crate::candidate::AllocationCandidate;
use crate::config::OptimizerConfig;
use crate::generation::generate_candidates;
use crate::metrics::{OptimizationMetrics, PlanningContext};
use crate::result::CropAllocation;

fn compare_scored(a: &(AllocationCandidate, OptimizationMetrics), b: &(AllocationCandidate, OptimizationMetrics)) -> Ordering {
    b.1.profit_rate
        .total_cmp(&a.1.profit_rate)
        .then_with(|| b.1.profit.total_cmp(&a.1.profit))
        .then_with(|| a.0.template.start_date.cmp(&b.0.template.start_date))
        .then_with(|| a.0.field.field_id.cmp(&b.0.field.field_id))
}

fn allocations_for<'a>(allocations_by_field: &'a HashMap<FieldId, Vec<CropAllocation>>, field_id: &FieldId) -> &'a [CropAllocation] {
    allocations_by_field.get(field_id).map(Vec::as_slice).unwrap_or(&[])
}

/// Runs the greedy solver to completion (or until `deadline`).
///
/// Returns the committed allocations per field and whether the wall-clock
/// deadline was hit before the candidate list was exhausted.
pub fn solve_greedy<'a>(
    fields: &'a [Field],
    crops_by_id: &HashMap<CropId, &'a Crop>,
    pool: &'a TemplatePool,
    interaction_rules: &'a [InteractionRule],
    config: &OptimizerConfig,
    deadline: Instant,
) -> (HashMap<FieldId, Vec<CropAllocation>>, bool) {
    let raw_candidates = generate_candidates(fields, crops_by_id, pool, config.template_limits.greedy, &config.area_levels);

    let mut allocations_by_field: HashMap<FieldId, Vec<CropAllocation>> = HashMap::new();

    let mut scored: Vec<(AllocationCandidate, OptimizationMetrics)> = {
        let empty = HashMap::new();
        let ctx = PlanningContext::new(&empty, crops_by_id, interaction_rules);
        raw_candidates
            .into_iter()
            .map(|candidate| {
                let metrics = candidate.get_metrics(&ctx);
                (candidate, metrics)
            })
            .filter(|(_, metrics)| !config.enable_candidate_filtering || metrics.profit_rate >= config.min_profit_rate_threshold)
            .collect()
    };
    scored.sort_by(compare_scored);

    let mut time_limit_reached = false;
    loop {
        if Instant::now() >= deadline {
            time_limit_reached = true;
            break;
        }

        let accepted_idx = scored
            .iter()
            .position(|(candidate, _)| candidate.fits_on_field(allocations_for(&allocations_by_field, &candidate.field.field_id)));
        let Some(idx) = accepted_idx else { break };

        let (candidate, _) = scored.remove(idx);
        let crop_id = candidate.crop.crop_id.clone();
        let field_id = candidate.field.field_id.clone();

        let metrics = {
            let ctx = PlanningContext::new(&allocations_by_field, crops_by_id, interaction_rules);
            candidate.get_metrics(&ctx)
        };
        let allocation = candidate.into_allocation(metrics);
        allocations_by_field.entry(field_id).or_default().push(allocation);

        let crop_has_cap = crops_by_id.get(&crop_id).and_then(|crop| crop.max_revenue).is_some();
        if crop_has_cap {
            let ctx = PlanningContext::new(&allocations_by_field, crops_by_id, interaction_rules);
            for (candidate, metrics) in scored.iter_mut() {
                if candidate.crop.crop_id == crop_id {
                    *metrics = candidate.get_metrics(&ctx);
                }
            }
            scored.sort_by(compare_scored);
        }
    }

    (allocations_by_field, time_limit_reached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crop_core::templates::PeriodTemplate;
    use crop_core::{CropId as CCropId, FieldId as CFieldId, StageRequirement, TemperatureProfile, TemplateId};
    use std::time::Duration;

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

    fn crop(id: &str, revenue_per_area: f64, max_revenue: Option<f64>) -> Crop {
        Crop {
            crop_id: CCropId::new(id),
            variety: None,
            area_per_unit: 0.25,
            revenue_per_area: Some(revenue_per_area),
            max_revenue,
            crop_family: "Poaceae".into(),
            stage_requirements: vec![StageRequirement::new(1, profile(), 1000.0)],
        }
    }

    fn template(crop_id: &CropId, start: chrono::NaiveDate) -> PeriodTemplate {
        PeriodTemplate {
            template_id: TemplateId::new(crop_id, start),
            crop_id: crop_id.clone(),
            start_date: start,
            completion_date: start + chrono::Duration::days(60),
            growth_days: 60,
            accumulated_gdd: 1000.0,
            yield_factor: 1.0,
        }
    }

    #[test]
    fn test_greedy_fills_non_overlapping_field_with_best_crop() {
        let fields = vec![Field::new(CFieldId::new("f1"), "Field 1", 1000.0, 100.0)];
        let crop_a = crop("rice", 2.0, None);
        let crop_b = crop("wheat", 1.0, None);
        let crops = vec![crop_a.clone(), crop_b.clone()];
        let crops_by_id: HashMap<CropId, &Crop> = crops.iter().map(|c| (c.crop_id.clone(), c)).collect();

        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut pool = TemplatePool::new();
        pool.insert_crop(crop_a.crop_id.clone(), vec![template(&crop_a.crop_id, start)]);
        pool.insert_crop(crop_b.crop_id.clone(), vec![template(&crop_b.crop_id, start)]);

        let config = OptimizerConfig { area_levels: vec![1.0], ..OptimizerConfig::default() };
        let deadline = Instant::now() + Duration::from_secs(5);
        let (allocations_by_field, time_limit_reached) = solve_greedy(&fields, &crops_by_id, &pool, &[], &config, deadline);

        assert!(!time_limit_reached);
        let field_allocations = &allocations_by_field[&FieldId::new("f1")];
        assert_eq!(field_allocations.len(), 1);
        assert_eq!(field_allocations[0].crop_id, crop_a.crop_id);
    }

    #[test]
    fn test_greedy_respects_demand_cap_via_resort() {
        let fields = vec![
            Field::new(CFieldId::new("f1"), "Field 1", 100.0, 10.0),
            Field::new(CFieldId::new("f2"), "Field 2", 100.0, 10.0),
        ];
        let crop_capped = crop("tomato", 10.0, Some(50.0));
        let crops = vec![crop_capped.clone()];
        let crops_by_id: HashMap<CropId, &Crop> = crops.iter().map(|c| (c.crop_id.clone(), c)).collect();

        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut pool = TemplatePool::new();
        pool.insert_crop(crop_capped.crop_id.clone(), vec![template(&crop_capped.crop_id, start)]);

        let config = OptimizerConfig {
            area_levels: vec![1.0],
            enable_candidate_filtering: false,
            ..OptimizerConfig::default()
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        let (allocations_by_field, _) = solve_greedy(&fields, &crops_by_id, &pool, &[], &config, deadline);

        let total_revenue: f64 = allocations_by_field.values().flatten().filter_map(|a| a.revenue).sum();
        assert!(total_revenue <= 50.0 + 1e-9);
        assert_eq!(total_revenue, 50.0);
    }
}
