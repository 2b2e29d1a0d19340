//! Solution-side entities (spec.md §3.1): a committed allocation, a field's
//! ordered schedule of allocations, and the orchestrator's final report.

use std::collections::HashMap;

use chrono::NaiveDate;
use crop_core::{CropId, FieldId};
use serde::{Deserialize, Serialize};

/// One committed allocation: a crop occupying part of a field for a
/// specific window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropAllocation {
    pub field_id: FieldId,
    pub crop_id: CropId,
    pub start_date: NaiveDate,
    pub completion_date: NaiveDate,
    pub growth_days: u32,
    pub area_used: f64,
    pub accumulated_gdd: f64,
    pub revenue: Option<f64>,
    pub profit: f64,
}

impl CropAllocation {
    /// `[start_date, completion_date + fallow_days)` half-open interval used
    /// by every overlap/fallow check.
    pub fn occupied_until(&self, fallow_days: u32) -> NaiveDate {
        self.completion_date + chrono::Duration::days(fallow_days as i64)
    }
}

/// One field's allocations, kept sorted by `start_date`. Time-non-overlapping
/// under the field's fallow rule (invariant 1, spec.md §3.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSchedule {
    pub field_id: FieldId,
    pub allocations: Vec<CropAllocation>,
}

impl FieldSchedule {
    pub fn new(field_id: FieldId) -> Self {
        Self { field_id, allocations: Vec::new() }
    }

    /// Inserts `allocation` keeping `allocations` sorted by `start_date`.
    pub fn insert_sorted(&mut self, allocation: CropAllocation) {
        let position = self
            .allocations
            .partition_point(|existing| existing.start_date < allocation.start_date);
        self.allocations.insert(position, allocation);
    }
}

/// Aggregate totals reported in [`OptimizationResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_cost: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    pub average_field_utilization: f64,
    pub crop_quantities: HashMap<String, f64>,
}

/// Final report produced by the orchestrator (C10). Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub field_schedules: Vec<FieldSchedule>,
    pub summary: ResultSummary,
    pub algorithm_name: String,
    pub computation_time_seconds: f64,
    /// Set when a solver's soft wall-clock cap (spec.md §5) was hit before
    /// convergence; the result holds the best solution seen so far, not a
    /// torn or partial one.
    pub time_limit_reached: bool,
}

impl OptimizationResult {
    /// Builds the summary from the field schedules and fills in the
    /// remaining report metadata. `field_areas` supplies each field's area
    /// for the utilization average (invariant 2's companion metric).
    pub fn assemble(
        field_schedules: Vec<FieldSchedule>,
        field_areas: &HashMap<FieldId, f64>,
        algorithm_name: impl Into<String>,
        computation_time_seconds: f64,
        time_limit_reached: bool,
    ) -> Self {
        let mut total_cost = 0.0;
        let mut total_revenue = 0.0;
        let mut total_profit = 0.0;
        let mut crop_quantities: HashMap<String, f64> = HashMap::new();
        let mut utilization_sum = 0.0;
        let mut utilization_count = 0usize;

        for schedule in &field_schedules {
            let mut field_area_used = 0.0;
            for allocation in &schedule.allocations {
                let revenue = allocation.revenue.unwrap_or(0.0);
                let cost = revenue - allocation.profit;
                total_cost += cost;
                total_revenue += revenue;
                total_profit += allocation.profit;
                field_area_used += allocation.area_used;
                *crop_quantities.entry(allocation.crop_id.value().to_string()).or_insert(0.0) += allocation.area_used;
            }
            if let Some(&area) = field_areas.get(&schedule.field_id) {
                if area > 0.0 {
                    utilization_sum += field_area_used / area;
                    utilization_count += 1;
                }
            }
        }

        let average_field_utilization = if utilization_count > 0 {
            utilization_sum / utilization_count as f64
        } else {
            0.0
        };

        Self {
            field_schedules,
            summary: ResultSummary {
                total_cost,
                total_revenue,
                total_profit,
                average_field_utilization,
                crop_quantities,
            },
            algorithm_name: algorithm_name.into(),
            computation_time_seconds,
            time_limit_reached,
        }
    }
}
