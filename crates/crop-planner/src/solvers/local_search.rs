//! Local search / hill-climbing improvement pass (component C8).
//!
//! Starting from a base solver's solution, each iteration samples up to
//! `max_neighbors_per_iteration` neighbors drawn from seven operators —
//! [`Operator::FieldMove`], [`Operator::FieldSwap`], [`Operator::CropChange`],
//! [`Operator::CropInsert`], [`Operator::PeriodShift`],
//! [`Operator::AreaAdjust`], [`Operator::Remove`] — weighted by
//! `config.operator_weights`, and accepts the best one found if it improves
//! total profit by more than 0.1% relative to the current solution (spec.md
//! §4.8). Iteration stops when a pass finds no accepted neighbor, or
//! `max_local_search_iterations`/the wall-clock deadline is reached.

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use crop_core::templates::TemplatePool;
use crop_core::{Crop, CropId, Field, FieldId, InteractionRule};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::OptimizerConfig;
use crate::result::CropAllocation;
use crate::solution::{reprice_solution, template_for, total_profit};

/// Relative improvement a neighbor must clear over the current solution's
/// total profit to be accepted (spec.md §4.8).
const IMPROVEMENT_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
enum Operator {
    FieldMove,
    FieldSwap,
    CropChange,
    CropInsert,
    PeriodShift,
    AreaAdjust,
    Remove,
}

const OPERATORS: [Operator; 7] = [
    Operator::FieldMove,
    Operator::FieldSwap,
    Operator::CropChange,
    Operator::CropInsert,
    Operator::PeriodShift,
    Operator::AreaAdjust,
    Operator::Remove,
];

fn operator_weight(weights: &crate::config::OperatorWeights, op: Operator) -> f64 {
    match op {
        Operator::FieldMove => weights.field_move,
        Operator::FieldSwap => weights.field_swap,
        Operator::CropChange => weights.crop_change,
        Operator::CropInsert => weights.crop_insert,
        Operator::PeriodShift => weights.period_shift,
        Operator::AreaAdjust => weights.area_adjust,
        Operator::Remove => weights.remove,
    }
}

fn pick_operator(weights: &crate::config::OperatorWeights, rng: &mut ChaCha8Rng) -> Operator {
    let total: f64 = OPERATORS.iter().map(|&op| operator_weight(weights, op)).sum();
    if total <= 0.0 {
        return Operator::Remove;
    }
    let mut roll = rng.gen_range(0.0..total);
    for &op in &OPERATORS {
        let w = operator_weight(weights, op);
        if roll < w {
            return op;
        }
        roll -= w;
    }
    *OPERATORS.last().unwrap()
}

fn non_overlapping(allocations: &[CropAllocation], exclude_idx: Option<usize>, start: NaiveDate, completion: NaiveDate, fallow_days: u32) -> bool {
    allocations.iter().enumerate().all(|(i, other)| {
        if Some(i) == exclude_idx {
            return true;
        }
        let occupied_until = other.completion_date + chrono::Duration::days(fallow_days as i64);
        let other_occupied_until = completion + chrono::Duration::days(fallow_days as i64);
        !(start < occupied_until && other.start_date < other_occupied_until)
    })
}

struct Neighbor {
    solution: HashMap<FieldId, Vec<CropAllocation>>,
}

/// Attempts to build one neighbor via `op`, or `None` if the operator had no
/// valid move available (empty solution, no other crop to switch to, etc).
#[allow(clippy::too_many_arguments)]
fn try_generate_neighbor(
    op: Operator,
    solution: &HashMap<FieldId, Vec<CropAllocation>>,
    fields: &[Field],
    crops_by_id: &HashMap<CropId, &Crop>,
    pool: &TemplatePool,
    rng: &mut ChaCha8Rng,
    area_levels: &[f64],
) -> Option<Neighbor> {
    let flat: Vec<CropAllocation> = solution.values().flatten().cloned().collect();
    if flat.is_empty() && !matches!(op, Operator::CropInsert) {
        return None;
    }
    let fields_by_id: HashMap<FieldId, &Field> = fields.iter().map(|f| (f.field_id.clone(), f)).collect();

    let mut next = solution.clone();

    match op {
        Operator::Remove => {
            let victim = &flat[rng.gen_range(0..flat.len())];
            let allocations = next.get_mut(&victim.field_id)?;
            let idx = allocations
                .iter()
                .position(|a| a.crop_id == victim.crop_id && a.start_date == victim.start_date)?;
            allocations.remove(idx);
        }
        Operator::FieldMove => {
            let source = &flat[rng.gen_range(0..flat.len())];
            if fields.len() < 2 {
                return None;
            }
            let target_field = &fields[rng.gen_range(0..fields.len())];
            if target_field.field_id == source.field_id {
                return None;
            }
            let target_allocations = next.get(&target_field.field_id).cloned().unwrap_or_default();
            if !non_overlapping(&target_allocations, None, source.start_date, source.completion_date, target_field.fallow_period_days) {
                return None;
            }
            if source.area_used > target_field.area {
                return None;
            }
            let source_allocations = next.get_mut(&source.field_id)?;
            let idx = source_allocations
                .iter()
                .position(|a| a.crop_id == source.crop_id && a.start_date == source.start_date)?;
            let mut moved = source_allocations.remove(idx);
            moved.field_id = target_field.field_id.clone();
            next.entry(target_field.field_id.clone()).or_default().push(moved);
        }
        Operator::FieldSwap => {
            if flat.len() < 2 {
                return None;
            }
            let i = rng.gen_range(0..flat.len());
            let mut j = rng.gen_range(0..flat.len());
            if j == i {
                j = (j + 1) % flat.len();
            }
            let (a, b) = (&flat[i], &flat[j]);
            if a.field_id == b.field_id {
                return None;
            }
            let field_a = fields_by_id.get(&a.field_id)?;
            let field_b = fields_by_id.get(&b.field_id)?;
            let a_allocs_on_b = next.get(&b.field_id).cloned().unwrap_or_default();
            let b_allocs_on_a = next.get(&a.field_id).cloned().unwrap_or_default();
            let a_idx_on_b = a_allocs_on_b
                .iter()
                .position(|x| x.crop_id == a.crop_id && x.start_date == a.start_date && x.field_id == a.field_id);
            let b_idx_on_a = b_allocs_on_a
                .iter()
                .position(|x| x.crop_id == b.crop_id && x.start_date == b.start_date && x.field_id == b.field_id);
            if !non_overlapping(&a_allocs_on_b, a_idx_on_b, a.start_date, a.completion_date, field_b.fallow_period_days) {
                return None;
            }
            if !non_overlapping(&b_allocs_on_a, b_idx_on_a, b.start_date, b.completion_date, field_a.fallow_period_days) {
                return None;
            }
            if a.area_used > field_b.area || b.area_used > field_a.area {
                return None;
            }

            let remove_matching = |allocations: &mut Vec<CropAllocation>, crop_id: &CropId, start: NaiveDate| {
                allocations.iter().position(|x| &x.crop_id == crop_id && x.start_date == start).map(|idx| allocations.remove(idx))
            };
            let mut moved_a = remove_matching(next.get_mut(&a.field_id)?, &a.crop_id, a.start_date)?;
            let mut moved_b = remove_matching(next.get_mut(&b.field_id)?, &b.crop_id, b.start_date)?;
            moved_a.field_id = field_b.field_id.clone();
            moved_b.field_id = field_a.field_id.clone();
            next.entry(field_b.field_id.clone()).or_default().push(moved_a);
            next.entry(field_a.field_id.clone()).or_default().push(moved_b);
        }
        Operator::CropChange => {
            let source = &flat[rng.gen_range(0..flat.len())];
            let crop_ids: Vec<&CropId> = crops_by_id.keys().filter(|id| *id != &source.crop_id).collect();
            if crop_ids.is_empty() {
                return None;
            }
            let new_crop_id = crop_ids[rng.gen_range(0..crop_ids.len())].clone();
            let candidate_template = template_for(pool, &new_crop_id, source.start_date).or_else(|| {
                pool.near(&new_crop_id, source.start_date, 14).into_iter().next()
            })?;
            let field = fields_by_id.get(&source.field_id)?;
            let allocations = next.get(&source.field_id).cloned().unwrap_or_default();
            let own_idx = allocations.iter().position(|a| a.crop_id == source.crop_id && a.start_date == source.start_date);
            if !non_overlapping(&allocations, own_idx, candidate_template.start_date, candidate_template.completion_date, field.fallow_period_days) {
                return None;
            }
            let allocations_mut = next.get_mut(&source.field_id)?;
            let idx = allocations_mut
                .iter()
                .position(|a| a.crop_id == source.crop_id && a.start_date == source.start_date)?;
            let area_used = source.area_used;
            allocations_mut[idx] = CropAllocation {
                field_id: source.field_id.clone(),
                crop_id: new_crop_id,
                start_date: candidate_template.start_date,
                completion_date: candidate_template.completion_date,
                growth_days: candidate_template.growth_days,
                area_used,
                accumulated_gdd: candidate_template.accumulated_gdd,
                revenue: None,
                profit: 0.0,
            };
        }
        Operator::PeriodShift => {
            let source = &flat[rng.gen_range(0..flat.len())];
            let shift_days = rng.gen_range(-14..=14);
            let target_start = source.start_date + chrono::Duration::days(shift_days);
            let candidate_template = template_for(pool, &source.crop_id, target_start).or_else(|| {
                pool.near(&source.crop_id, target_start, 7).into_iter().next()
            })?;
            if candidate_template.start_date == source.start_date {
                return None;
            }
            let field = fields_by_id.get(&source.field_id)?;
            let allocations = next.get(&source.field_id).cloned().unwrap_or_default();
            let own_idx = allocations.iter().position(|a| a.crop_id == source.crop_id && a.start_date == source.start_date);
            if !non_overlapping(&allocations, own_idx, candidate_template.start_date, candidate_template.completion_date, field.fallow_period_days) {
                return None;
            }
            let allocations_mut = next.get_mut(&source.field_id)?;
            let idx = allocations_mut
                .iter()
                .position(|a| a.crop_id == source.crop_id && a.start_date == source.start_date)?;
            allocations_mut[idx].start_date = candidate_template.start_date;
            allocations_mut[idx].completion_date = candidate_template.completion_date;
            allocations_mut[idx].growth_days = candidate_template.growth_days;
            allocations_mut[idx].accumulated_gdd = candidate_template.accumulated_gdd;
        }
        Operator::AreaAdjust => {
            let source = &flat[rng.gen_range(0..flat.len())];
            let field = fields_by_id.get(&source.field_id)?;
            let level = area_levels[rng.gen_range(0..area_levels.len())];
            let new_area = field.area * level;
            if (new_area - source.area_used).abs() < 1e-9 {
                return None;
            }
            let allocations_mut = next.get_mut(&source.field_id)?;
            let idx = allocations_mut
                .iter()
                .position(|a| a.crop_id == source.crop_id && a.start_date == source.start_date)?;
            allocations_mut[idx].area_used = new_area;
        }
        Operator::CropInsert => {
            if fields.is_empty() || crops_by_id.is_empty() {
                return None;
            }
            let field = &fields[rng.gen_range(0..fields.len())];
            let crop_ids: Vec<&CropId> = crops_by_id.keys().collect();
            let crop_id = crop_ids[rng.gen_range(0..crop_ids.len())].clone();
            let templates = pool.top(&crop_id, 50);
            if templates.is_empty() {
                return None;
            }
            let template = &templates[rng.gen_range(0..templates.len())];
            let level = area_levels[rng.gen_range(0..area_levels.len())];
            let area_used = field.area * level;
            let allocations = next.get(&field.field_id).cloned().unwrap_or_default();
            if !non_overlapping(&allocations, None, template.start_date, template.completion_date, field.fallow_period_days) {
                return None;
            }
            next.entry(field.field_id.clone()).or_default().push(CropAllocation {
                field_id: field.field_id.clone(),
                crop_id,
                start_date: template.start_date,
                completion_date: template.completion_date,
                growth_days: template.growth_days,
                area_used,
                accumulated_gdd: template.accumulated_gdd,
                revenue: None,
                profit: 0.0,
            });
        }
    }

    Some(Neighbor { solution: next })
}

/// Runs hill-climbing from `initial`, returning the best solution found and
/// whether the wall-clock deadline was hit.
pub fn improve<'a>(
    initial: HashMap<FieldId, Vec<CropAllocation>>,
    fields: &'a [Field],
    crops_by_id: &HashMap<CropId, &'a Crop>,
    pool: &'a TemplatePool,
    interaction_rules: &'a [InteractionRule],
    config: &OptimizerConfig,
    deadline: Instant,
) -> (HashMap<FieldId, Vec<CropAllocation>>, bool) {
    let fields_by_id: HashMap<FieldId, &Field> = fields.iter().map(|f| (f.field_id.clone(), f)).collect();
    let mut current = reprice_solution(initial, &fields_by_id, crops_by_id, pool, interaction_rules);
    let mut current_profit = total_profit(&current);
    let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
    let mut time_limit_reached = false;

    for _ in 0..config.max_local_search_iterations {
        if Instant::now() >= deadline {
            time_limit_reached = true;
            break;
        }

        let neighbor_count = if config.enable_neighbor_sampling {
            config.max_neighbors_per_iteration
        } else {
            config.max_neighbors_per_iteration.max(1)
        };

        let mut best_neighbor: Option<(HashMap<FieldId, Vec<CropAllocation>>, f64)> = None;
        for _ in 0..neighbor_count {
            let op = pick_operator(&config.operator_weights, &mut rng);
            let Some(neighbor) = try_generate_neighbor(op, &current, fields, crops_by_id, pool, &mut rng, &config.area_levels) else {
                continue;
            };
            let repriced = reprice_solution(neighbor.solution, &fields_by_id, crops_by_id, pool, interaction_rules);
            let profit = total_profit(&repriced);
            if best_neighbor.as_ref().map(|(_, p)| profit > *p).unwrap_or(true) {
                best_neighbor = Some((repriced, profit));
            }
        }

        match best_neighbor {
            Some((solution, profit)) if improved_enough(current_profit, profit) => {
                current = solution;
                current_profit = profit;
            }
            _ => break,
        }
    }

    (current, time_limit_reached)
}

fn improved_enough(current: f64, candidate: f64) -> bool {
    if current <= 0.0 {
        candidate > current
    } else {
        (candidate - current) / current.abs() > IMPROVEMENT_THRESHOLD
    }
}
