//! Optimization metrics (component C4) — the single canonical profit
//! calculation every solver calls to rank, select, or compare candidates.
//!
//! [`compute_metrics`] implements spec.md §4.4's pipeline in order: cost,
//! base revenue (area × revenue_per_area × yield_factor), the interaction-
//! rule adjustment keyed on the most recent prior allocation on the same
//! field, the market-demand-cap clamp, and finally profit/profit_rate.
//! There is no alternative formula anywhere else in this crate.

use std::collections::HashMap;

use chrono::NaiveDate;
use crop_core::{Crop, CropId, Field, FieldId, InteractionRule, InteractionRuleType};

use crate::result::CropAllocation;

/// Fixed priority order resolving spec.md §9's open question on whether
/// interaction-rule impacts compound across matches. This crate picks
/// first-match-wins (see `DESIGN.md`): the highest-priority matching rule
/// applies; its `impact_ratio` is the only multiplier used.
const RULE_PRIORITY: [InteractionRuleType; 3] = [
    InteractionRuleType::ContinuousCultivation,
    InteractionRuleType::RotationBenefit,
    InteractionRuleType::Companion,
];

/// Read-only view of the current partial solution plus the static crop
/// catalog and interaction-rule set, passed to every [`compute_metrics`]
/// call. Borrowed, never owned by a candidate — this mirrors spec.md §5's
/// "solution state is owned exclusively by one solver at a time" rule.
pub struct PlanningContext<'a> {
    pub allocations_by_field: &'a HashMap<FieldId, Vec<CropAllocation>>,
    pub crop_catalog: &'a HashMap<CropId, &'a Crop>,
    pub interaction_rules: &'a [InteractionRule],
}

impl<'a> PlanningContext<'a> {
    pub fn new(
        allocations_by_field: &'a HashMap<FieldId, Vec<CropAllocation>>,
        crop_catalog: &'a HashMap<CropId, &'a Crop>,
        interaction_rules: &'a [InteractionRule],
    ) -> Self {
        Self { allocations_by_field, crop_catalog, interaction_rules }
    }

    /// Family of the most recent allocation on `field_id` whose completion
    /// predates `start_date`, or `None` if there is no such allocation (or
    /// its crop is missing from the catalog).
    fn previous_crop_family(&self, field_id: &FieldId, start_date: NaiveDate) -> Option<&str> {
        self.allocations_by_field
            .get(field_id)?
            .iter()
            .filter(|allocation| allocation.completion_date < start_date)
            .max_by_key(|allocation| allocation.completion_date)
            .and_then(|allocation| self.crop_catalog.get(&allocation.crop_id))
            .map(|crop| crop.crop_family.as_str())
    }

    /// Total revenue already realized across the partial solution for
    /// `crop_id`, the `already_realized` term in spec.md §4.4 step 4.
    fn already_realized(&self, crop_id: &CropId) -> f64 {
        self.allocations_by_field
            .values()
            .flatten()
            .filter(|allocation| &allocation.crop_id == crop_id)
            .filter_map(|allocation| allocation.revenue)
            .sum()
    }
}

/// Resolves the first applicable interaction rule in priority order and
/// returns its `impact_ratio`, or `1.0` (no adjustment) if none match.
fn interaction_multiplier(prev_family: &str, candidate_family: &str, rules: &[InteractionRule]) -> f64 {
    for kind in RULE_PRIORITY {
        if let Some(rule) = rules
            .iter()
            .find(|rule| rule.rule_type == kind && rule.matches(prev_family, candidate_family))
        {
            return rule.impact_ratio;
        }
    }
    1.0
}

/// Canonical per-candidate metrics: cost, revenue (after interaction
/// adjustment and demand-cap clamp), profit, profit_rate, and area
/// utilization. Every solver ranks/selects/compares through this struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationMetrics {
    pub cost: f64,
    /// `None` when `crop.revenue_per_area` is null (profit is then always
    /// `-cost`, spec.md §3.2 invariant 5).
    pub revenue: Option<f64>,
    pub profit: f64,
    pub profit_rate: f64,
    pub area_utilization: f64,
}

/// Computes spec.md §4.4's canonical metrics for a candidate window on
/// `field` growing `crop`, starting `start_date`, taking `growth_days` to
/// reach `yield_factor`, using `area_used` of the field.
pub fn compute_metrics(
    field: &Field,
    crop: &Crop,
    start_date: NaiveDate,
    growth_days: u32,
    yield_factor: f64,
    area_used: f64,
    ctx: &PlanningContext,
) -> OptimizationMetrics {
    let cost = growth_days as f64 * field.daily_fixed_cost;

    let revenue = crop.revenue_per_area.map(|rate| {
        let mut base_revenue = area_used * rate * yield_factor;

        if let Some(prev_family) = ctx.previous_crop_family(&field.field_id, start_date) {
            base_revenue *= interaction_multiplier(prev_family, &crop.crop_family, ctx.interaction_rules);
        }

        if let Some(max_revenue) = crop.max_revenue {
            let realized = ctx.already_realized(&crop.crop_id);
            if realized + base_revenue > max_revenue {
                base_revenue = (max_revenue - realized).max(0.0);
            }
        }

        base_revenue
    });

    let profit = revenue.unwrap_or(0.0) - cost;
    let profit_rate = if cost > 0.0 { profit / cost } else { 0.0 };
    let area_utilization = if field.area > 0.0 { area_used / field.area } else { 0.0 };

    OptimizationMetrics { cost, revenue, profit, profit_rate, area_utilization }
}
