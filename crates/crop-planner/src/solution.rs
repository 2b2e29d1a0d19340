//! Whole-solution repricing shared by every solver and improvement pass.
//!
//! [`crate::result::CropAllocation`] caches `revenue`/`profit` but not the
//! `yield_factor` they were computed from (spec.md §3.1 doesn't name it as a
//! field), so any pass that moves, swaps, or reorders allocations must look
//! the originating [`crop_core::templates::PeriodTemplate`] back up before it
//! can recompute metrics. [`reprice_solution`] does this once per call,
//! replaying every allocation in global start-date order so each one's
//! interaction adjustment and demand-cap headroom accumulate the same way a
//! freshly-built solution's would (spec.md §4.4).

use std::collections::HashMap;

use crop_core::templates::{PeriodTemplate, TemplatePool};
use crop_core::{Crop, CropId, Field, FieldId, InteractionRule};

use crate::metrics::{compute_metrics, PlanningContext};
use crate::result::CropAllocation;

/// Recovers the template backing an already-committed allocation by its
/// `(crop_id, start_date)` key. Exact-date lookup (`tolerance_days = 0`)
/// always succeeds for a template this crate itself generated.
pub fn template_for<'a>(pool: &'a TemplatePool, crop_id: &CropId, start_date: chrono::NaiveDate) -> Option<&'a PeriodTemplate> {
    pool.near(crop_id, start_date, 0).into_iter().next()
}

/// Recomputes every allocation's cached `revenue`/`profit` from scratch.
/// Allocations whose field or crop is missing from the supplied catalogs are
/// dropped (this should never happen for a solution this crate built).
pub fn reprice_solution(
    allocations_by_field: HashMap<FieldId, Vec<CropAllocation>>,
    fields_by_id: &HashMap<FieldId, &Field>,
    crops_by_id: &HashMap<CropId, &Crop>,
    pool: &TemplatePool,
    interaction_rules: &[InteractionRule],
) -> HashMap<FieldId, Vec<CropAllocation>> {
    let mut flat: Vec<CropAllocation> = allocations_by_field.into_values().flatten().collect();
    flat.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.field_id.cmp(&b.field_id)));

    let mut result: HashMap<FieldId, Vec<CropAllocation>> = HashMap::new();
    for mut allocation in flat {
        let (Some(&field), Some(&crop)) = (fields_by_id.get(&allocation.field_id), crops_by_id.get(&allocation.crop_id)) else {
            continue;
        };
        let yield_factor = template_for(pool, &allocation.crop_id, allocation.start_date)
            .map(|t| t.yield_factor)
            .unwrap_or(1.0);

        let ctx = PlanningContext::new(&result, crops_by_id, interaction_rules);
        let metrics = compute_metrics(field, crop, allocation.start_date, allocation.growth_days, yield_factor, allocation.area_used, &ctx);
        allocation.revenue = metrics.revenue;
        allocation.profit = metrics.profit;
        result.entry(allocation.field_id.clone()).or_default().push(allocation);
    }

    for allocations in result.values_mut() {
        allocations.sort_by_key(|a| a.start_date);
    }
    result
}

/// Sum of cached `profit` across every allocation in the solution.
pub fn total_profit(allocations_by_field: &HashMap<FieldId, Vec<CropAllocation>>) -> f64 {
    allocations_by_field.values().flatten().map(|a| a.profit).sum()
}

/// Flat view of every allocation across all fields, for operators that pick
/// a candidate to remove/move irrespective of which field it's on.
pub fn flatten(allocations_by_field: &HashMap<FieldId, Vec<CropAllocation>>) -> Vec<CropAllocation> {
    allocations_by_field.values().flatten().cloned().collect()
}
