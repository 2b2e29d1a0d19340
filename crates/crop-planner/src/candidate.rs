//! Allocation candidate (component C5): a concrete `(Field, Crop,
//! PeriodTemplate, area_used)` tuple derived on demand from a pooled
//! template. Candidates are ephemeral — solvers create and discard them
//! freely; only accepted ones become a [`crate::result::CropAllocation`].

use chrono::{Duration, NaiveDate};
use crop_core::{Crop, Field, templates::PeriodTemplate};

use crate::metrics::{compute_metrics, OptimizationMetrics, PlanningContext};
use crate::result::CropAllocation;

/// Tolerance absorbing floating-point error when comparing an area sum
/// against a field's capacity.
const AREA_EPSILON: f64 = 1e-9;

/// A candidate allocation: `template` applied to `field` at `area_used`,
/// still unconfirmed. Borrows its field-independent template and its field
/// and crop from the caller's immutable catalogs — never materialized for
/// every field at once (spec.md §3.1).
#[derive(Debug, Clone, Copy)]
pub struct AllocationCandidate<'a> {
    pub field: &'a Field,
    pub crop: &'a Crop,
    pub template: &'a PeriodTemplate,
    pub area_used: f64,
}

impl<'a> AllocationCandidate<'a> {
    pub fn new(field: &'a Field, crop: &'a Crop, template: &'a PeriodTemplate, area_used: f64) -> Self {
        Self { field, crop, template, area_used }
    }

    /// `completion_date + fallow_days`, the end of the half-open interval
    /// other allocations on this field must start strictly after.
    pub fn occupied_until(&self, fallow_days: u32) -> NaiveDate {
        self.template.completion_date + Duration::days(fallow_days as i64)
    }

    /// True when `self` and `other` are on the same field and their
    /// `[start, completion + fallow_days)` intervals intersect. This is the
    /// fallow-respecting non-overlap predicate from spec.md invariant 1;
    /// every solver uses it (not area sharing) to decide whether two
    /// allocations can coexist on one field, since the spec's invariant 1
    /// forbids *any* time overlap on a field regardless of area headroom.
    pub fn overlaps_with(&self, other: &AllocationCandidate, fallow_days: u32) -> bool {
        if self.field.field_id != other.field.field_id {
            return false;
        }
        self.template.start_date < other.occupied_until(fallow_days)
            && other.template.start_date < self.occupied_until(fallow_days)
    }

    /// Same predicate against an already-committed allocation.
    pub fn overlaps_allocation(&self, other: &CropAllocation, fallow_days: u32) -> bool {
        if self.field.field_id != other.field_id {
            return false;
        }
        let other_occupied_until = other.completion_date + Duration::days(fallow_days as i64);
        self.template.start_date < other_occupied_until
            && other.start_date < self.occupied_until(fallow_days)
    }

    /// Whether this candidate can be inserted into `committed` (all
    /// allocations across every field, already-accepted) without breaking
    /// spec.md invariants 1–2: no fallow-respecting time overlap with any
    /// existing allocation on the same field, and concurrently-active area
    /// (there should never be more than this candidate itself, given the
    /// overlap rule, but the sum is computed directly per spec.md §4.5
    /// rather than assumed) stays within the field's capacity.
    pub fn fits_on_field(&self, committed: &[CropAllocation]) -> bool {
        let fallow_days = self.field.fallow_period_days;
        let mut concurrent_area = self.area_used;
        for other in committed.iter().filter(|a| a.field_id == self.field.field_id) {
            if self.overlaps_allocation(other, fallow_days) {
                return false;
            }
            if intervals_overlap(other.start_date, other.completion_date, self.template.start_date, self.template.completion_date) {
                concurrent_area += other.area_used;
            }
        }
        concurrent_area <= self.field.area + AREA_EPSILON
    }

    /// Delegates to [`compute_metrics`] (component C4), the single source
    /// of truth every solver must go through to rank or compare candidates.
    pub fn get_metrics(&self, ctx: &PlanningContext) -> OptimizationMetrics {
        compute_metrics(
            self.field,
            self.crop,
            self.template.start_date,
            self.template.growth_days,
            self.template.yield_factor,
            self.area_used,
            ctx,
        )
    }

    /// Materializes this candidate into a committed [`CropAllocation`],
    /// caching the metrics already computed for it (spec.md §3.1: "optional
    /// cached `revenue`, `profit`").
    pub fn into_allocation(self, metrics: OptimizationMetrics) -> CropAllocation {
        CropAllocation {
            field_id: self.field.field_id.clone(),
            crop_id: self.crop.crop_id.clone(),
            start_date: self.template.start_date,
            completion_date: self.template.completion_date,
            growth_days: self.template.growth_days,
            area_used: self.area_used,
            accumulated_gdd: self.template.accumulated_gdd,
            revenue: metrics.revenue,
            profit: metrics.profit,
        }
    }
}

/// Plain closed-interval overlap test (no fallow extension), used for the
/// area-sum half of [`AllocationCandidate::fits_on_field`].
fn intervals_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && b_start <= a_end
}
