//! Period-Template pool (component C3).
//!
//! A [`TemplatePool`] stores the ranked, field-independent periods produced
//! by [`crate::periods::generate_periods`] for every crop in a plan, indexed
//! two ways:
//!
//! - [`TemplatePool::top`] — the first `k` templates in rank order (the
//!   order they were inserted in, already sorted/truncated by the caller via
//!   [`crate::periods::rank_and_truncate`]).
//! - [`TemplatePool::near`] — templates whose `start_date` falls within a
//!   tolerance window of a target date, located by binary search over a
//!   date-sorted copy.
//!
//! The pool itself is built once per plan and handed immutably to every
//! solver; no solver mutates it. Turning a [`PeriodTemplate`] plus a field
//! and an area level into a concrete allocation candidate is the job of
//! `crop_planner`'s C5 layer (`AllocationCandidate`), since that type needs
//! the field entity which this crate does not depend on upward.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::periods::CandidatePeriod;
use crate::{CropId, TemplateId};

/// A field-independent (crop, start_date) → (completion, growth_days, gdd,
/// yield) record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTemplate {
    pub template_id: TemplateId,
    pub crop_id: CropId,
    pub start_date: NaiveDate,
    pub completion_date: NaiveDate,
    pub growth_days: u32,
    pub accumulated_gdd: f64,
    pub yield_factor: f64,
}

impl PeriodTemplate {
    pub fn from_candidate(period: CandidatePeriod) -> Self {
        let template_id = TemplateId::new(&period.crop_id, period.start_date);
        Self {
            template_id,
            crop_id: period.crop_id,
            start_date: period.start_date,
            completion_date: period.completion_date,
            growth_days: period.growth_days,
            accumulated_gdd: period.accumulated_gdd,
            yield_factor: period.yield_factor,
        }
    }
}

struct CropTemplates {
    /// Already ranked and truncated to `max_templates_per_crop` by the caller.
    by_rank: Vec<PeriodTemplate>,
    /// Same templates, sorted ascending by `start_date`, for [`TemplatePool::near`].
    by_date: Vec<PeriodTemplate>,
}

/// Per-crop storage of ranked period templates, built once per plan.
#[derive(Default)]
pub struct TemplatePool {
    by_crop: HashMap<CropId, CropTemplates>,
}

impl TemplatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a crop's already-ranked template list. Rank order is
    /// preserved verbatim for [`TemplatePool::top`]; a date-sorted copy is
    /// built alongside for [`TemplatePool::near`].
    pub fn insert_crop(&mut self, crop_id: CropId, ranked_templates: Vec<PeriodTemplate>) {
        let mut by_date = ranked_templates.clone();
        by_date.sort_by_key(|t| t.start_date);
        log::debug!("template pool: crop '{}' has {} template(s)", crop_id, ranked_templates.len());
        self.by_crop.insert(crop_id, CropTemplates { by_rank: ranked_templates, by_date });
    }

    /// First `k` templates for `crop_id` in rank order, or an empty slice if
    /// the crop has no templates.
    pub fn top(&self, crop_id: &CropId, k: usize) -> &[PeriodTemplate] {
        match self.by_crop.get(crop_id) {
            Some(templates) => &templates.by_rank[..k.min(templates.by_rank.len())],
            None => &[],
        }
    }

    /// Templates for `crop_id` whose `start_date` is within `tolerance_days`
    /// of `target`, in date order. Located via binary search on the
    /// date-sorted index, `O(log n + matches)`.
    pub fn near(&self, crop_id: &CropId, target: NaiveDate, tolerance_days: i64) -> Vec<&PeriodTemplate> {
        let Some(templates) = self.by_crop.get(crop_id) else {
            return Vec::new();
        };
        let lower = target - Duration::days(tolerance_days);
        let upper = target + Duration::days(tolerance_days);
        let start = templates.by_date.partition_point(|t| t.start_date < lower);
        templates.by_date[start..]
            .iter()
            .take_while(|t| t.start_date <= upper)
            .collect()
    }

    pub fn crop_ids(&self) -> impl Iterator<Item = &CropId> {
        self.by_crop.keys()
    }

    pub fn template_count(&self, crop_id: &CropId) -> usize {
        self.by_crop.get(crop_id).map(|t| t.by_rank.len()).unwrap_or(0)
    }
}
