//! DP solver (component C7): per-field weighted interval scheduling.
//!
//! Each field is solved independently (spec.md §4.7): candidates for that
//! field are sorted by `completion_date`, and a standard weighted-interval-
//! scheduling recurrence picks the subset maximizing total context-free
//! profit (no interaction adjustment, no demand-cap clamp — those depend on
//! what other fields pick, which this per-field pass cannot see). The
//! predecessor of each candidate — the latest earlier one whose
//! fallow-extended interval doesn't reach into this one's start — is located
//! by binary search on the completion-date-sorted slice.
//!
//! Once every field has an independent optimum, allocations are repriced
//! together (interaction + demand-cap, in global start-date order) and any
//! crop whose `max_revenue` cap left a clamped-to-zero, net-negative
//! allocation in the plan has that allocation dropped and the solution
//! repriced again, repeating until no such allocation remains (spec.md
//! §4.7's cross-field demand-cap cleanup). This is a monotone process — each
//! iteration strictly shrinks the allocation count — so it terminates in
//! `O(allocations)` iterations.

use std::collections::HashMap;
use std::time::Instant;

use crop_core::templates::TemplatePool;
use crop_core::{Crop, CropId, Field, FieldId, InteractionRule};

use crate::candidate::AllocationCandidate;
use crate::config::OptimizerConfig;
use crate::generation::generate_candidates;
use crate::metrics::PlanningContext;
use crate::result::CropAllocation;
use crate::solution::reprice_solution;

/// Solves the weighted-interval-scheduling recurrence for one field's
/// candidates, returning the selected subset (unordered relative to input,
/// but internally consistent).
fn solve_field<'a>(field: &'a Field, mut candidates: Vec<AllocationCandidate<'a>>, crops_by_id: &HashMap<CropId, &'a Crop>) -> Vec<AllocationCandidate<'a>> {
    if candidates.is_empty() {
        return Vec::new();
    }

    candidates.sort_by(|a, b| {
        a.template
            .completion_date
            .cmp(&b.template.completion_date)
            .then_with(|| a.template.start_date.cmp(&b.template.start_date))
    });

    let weights: Vec<f64> = {
        let empty = HashMap::new();
        let ctx = PlanningContext::new(&empty, crops_by_id, &[]);
        candidates.iter().map(|c| c.get_metrics(&ctx).profit).collect()
    };

    let fallow_days = field.fallow_period_days;
    let n = candidates.len();

    // predecessor[k] = the largest index j < k whose occupied_until doesn't
    // reach candidates[k]'s start_date, or None if no such j exists.
    let mut predecessor: Vec<Option<usize>> = Vec::with_capacity(n);
    for k in 0..n {
        let target_start = candidates[k].template.start_date;
        let idx = candidates[..k].partition_point(|c| c.occupied_until(fallow_days) < target_start);
        predecessor.push(if idx == 0 { None } else { Some(idx - 1) });
    }

    // opt[k] = best total weight achievable using candidates[..k].
    let mut opt = vec![0.0f64; n + 1];
    let mut include = vec![false; n];
    for k in 0..n {
        let with_k = weights[k] + predecessor[k].map(|j| opt[j + 1]).unwrap_or(0.0);
        let without_k = opt[k];
        if with_k > without_k {
            opt[k + 1] = with_k;
            include[k] = true;
        } else {
            opt[k + 1] = without_k;
        }
    }

    let mut selected_indices = Vec::new();
    let mut k = n;
    while k > 0 {
        if include[k - 1] {
            selected_indices.push(k - 1);
            k = predecessor[k - 1].map(|j| j + 1).unwrap_or(0);
        } else {
            k -= 1;
        }
    }
    selected_indices.reverse();

    // Remove from the back so earlier indices stay valid as we pull items out.
    let mut selected = Vec::with_capacity(selected_indices.len());
    for &idx in selected_indices.iter().rev() {
        selected.push(candidates.swap_remove(idx));
    }
    selected.reverse();
    selected
}

/// Finds the allocation with the lowest profit_rate among allocations whose
/// crop has a `max_revenue` cap and whose own revenue has clamped to the
/// point that it carries negative profit — a slot occupying area for no
/// realized benefit once the cap bound.
fn find_degenerate_capped_allocation(allocations_by_field: &HashMap<FieldId, Vec<CropAllocation>>, crops_by_id: &HashMap<CropId, &Crop>) -> Option<(FieldId, usize)> {
    let mut worst: Option<(FieldId, usize, f64)> = None;
    for (field_id, allocations) in allocations_by_field {
        for (idx, allocation) in allocations.iter().enumerate() {
            let Some(crop) = crops_by_id.get(&allocation.crop_id) else { continue };
            if crop.max_revenue.is_none() || allocation.profit >= 0.0 {
                continue;
            }
            let revenue = allocation.revenue.unwrap_or(0.0);
            let cost = revenue - allocation.profit;
            let profit_rate = if cost > 0.0 { allocation.profit / cost } else { 0.0 };
            if worst.as_ref().map(|(_, _, pr)| profit_rate < *pr).unwrap_or(true) {
                worst = Some((field_id.clone(), idx, profit_rate));
            }
        }
    }
    worst.map(|(field_id, idx, _)| (field_id, idx))
}

/// Runs the DP solver across every field, then the cross-field demand-cap
/// cleanup pass. Returns the committed allocations and whether the deadline
/// was hit (checked once per field; the DP recurrence itself is not
/// preempted mid-field since a field's candidate count is bounded by
/// `template_limits.dp`).
pub fn solve_dp<'a>(
    fields: &'a [Field],
    crops_by_id: &HashMap<CropId, &'a Crop>,
    pool: &'a TemplatePool,
    interaction_rules: &'a [InteractionRule],
    config: &OptimizerConfig,
    deadline: Instant,
) -> (HashMap<FieldId, Vec<CropAllocation>>, bool) {
    let mut time_limit_reached = false;
    let mut allocations_by_field: HashMap<FieldId, Vec<CropAllocation>> = HashMap::new();
    let fields_by_id: HashMap<FieldId, &Field> = fields.iter().map(|f| (f.field_id.clone(), f)).collect();

    for field in fields {
        if Instant::now() >= deadline {
            time_limit_reached = true;
            break;
        }
        let field_slice = std::slice::from_ref(field);
        let candidates = generate_candidates(field_slice, crops_by_id, pool, config.template_limits.dp, &config.area_levels);
        let selected = solve_field(field, candidates, crops_by_id);

        let placeholder_allocations: Vec<CropAllocation> = selected
            .into_iter()
            .map(|candidate| CropAllocation {
                field_id: candidate.field.field_id.clone(),
                crop_id: candidate.crop.crop_id.clone(),
                start_date: candidate.template.start_date,
                completion_date: candidate.template.completion_date,
                growth_days: candidate.template.growth_days,
                area_used: candidate.area_used,
                accumulated_gdd: candidate.template.accumulated_gdd,
                revenue: None,
                profit: 0.0,
            })
            .collect();
        allocations_by_field.insert(field.field_id.clone(), placeholder_allocations);
    }

    allocations_by_field = reprice_solution(allocations_by_field, &fields_by_id, crops_by_id, pool, interaction_rules);

    loop {
        let Some((field_id, idx)) = find_degenerate_capped_allocation(&allocations_by_field, crops_by_id) else {
            break;
        };
        allocations_by_field.get_mut(&field_id).expect("field present").remove(idx);
        allocations_by_field = reprice_solution(allocations_by_field, &fields_by_id, crops_by_id, pool, interaction_rules);
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

    fn crop(id: &str, revenue_per_area: f64) -> Crop {
        Crop {
            crop_id: CCropId::new(id),
            variety: None,
            area_per_unit: 0.25,
            revenue_per_area: Some(revenue_per_area),
            max_revenue: None,
            crop_family: "Poaceae".into(),
            stage_requirements: vec![StageRequirement::new(1, profile(), 1000.0)],
        }
    }

    fn template(crop_id: &CropId, start: chrono::NaiveDate, growth_days: i64) -> PeriodTemplate {
        PeriodTemplate {
            template_id: TemplateId::new(crop_id, start),
            crop_id: crop_id.clone(),
            start_date: start,
            completion_date: start + chrono::Duration::days(growth_days),
            growth_days: growth_days as u32,
            accumulated_gdd: 1000.0,
            yield_factor: 1.0,
        }
    }

    #[test]
    fn test_dp_picks_higher_profit_among_two_overlapping_candidates() {
        let field = Field::new(CFieldId::new("f1"), "Field 1", 1000.0, 10.0).with_fallow_period_days(0);
        let fields = vec![field];
        let low_value = crop("low", 1.0);
        let high_value = crop("high", 5.0);
        let crops = vec![low_value.clone(), high_value.clone()];
        let crops_by_id: HashMap<CropId, &Crop> = crops.iter().map(|c| (c.crop_id.clone(), c)).collect();

        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut pool = TemplatePool::new();
        // Both occupy the exact same window: only one can be picked.
        pool.insert_crop(low_value.crop_id.clone(), vec![template(&low_value.crop_id, start, 60)]);
        pool.insert_crop(high_value.crop_id.clone(), vec![template(&high_value.crop_id, start, 60)]);

        let config = OptimizerConfig { area_levels: vec![1.0], ..OptimizerConfig::default() };
        let deadline = Instant::now() + Duration::from_secs(5);
        let (allocations_by_field, time_limit_reached) = solve_dp(&fields, &crops_by_id, &pool, &[], &config, deadline);

        assert!(!time_limit_reached);
        let allocations = &allocations_by_field[&FieldId::new("f1")];
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].crop_id, high_value.crop_id);
    }

    #[test]
    fn test_dp_cleanup_drops_degenerate_capped_allocation() {
        let field_a = Field::new(CFieldId::new("f1"), "Field 1", 100.0, 1.0).with_fallow_period_days(0);
        let field_b = Field::new(CFieldId::new("f2"), "Field 2", 100.0, 1.0).with_fallow_period_days(0);
        let fields = vec![field_a, field_b];

        let capped = crop("tomato", 10.0);
        let mut capped = capped;
        capped.max_revenue = Some(50.0);
        let crops = vec![capped.clone()];
        let crops_by_id: HashMap<CropId, &Crop> = crops.iter().map(|c| (c.crop_id.clone(), c)).collect();

        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut pool = TemplatePool::new();
        pool.insert_crop(capped.crop_id.clone(), vec![template(&capped.crop_id, start, 60)]);

        let config = OptimizerConfig { area_levels: vec![1.0], ..OptimizerConfig::default() };
        let deadline = Instant::now() + Duration::from_secs(5);
        let (allocations_by_field, _) = solve_dp(&fields, &crops_by_id, &pool, &[], &config, deadline);

        let total_revenue: f64 = allocations_by_field.values().flatten().filter_map(|a| a.revenue).sum();
        assert!(total_revenue <= 50.0 + 1e-9);
        for allocation in allocations_by_field.values().flatten() {
            assert!(allocation.profit >= 0.0);
        }
    }
}
