//! Adaptive Large Neighborhood Search (component C9), the alternative
//! improvement pass to [`crate::solvers::local_search`].
//!
//! Each iteration destroys a fraction of the current solution (one of
//! [`DestroyOperator::RandomRemoval`], [`DestroyOperator::WorstRemoval`],
//! [`DestroyOperator::FieldRemoval`]), repairs it (one of
//! [`RepairOperator::GreedyInsert`], [`RepairOperator::TemplateInsert`]), and
//! accepts the result only if it does not make the solution worse —
//! simulated annealing is explicitly out of scope (spec.md §4.9). Operator
//! choice is a roulette-wheel draw over EWMA-updated reward weights, so
//! operators that have recently produced new bests get sampled more often.
//! Every destroy/repair call is wrapped so an internal failure (nothing to
//! remove, no field to clear) degrades to a skipped iteration rather than a
//! panic.

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use crop_core::templates::TemplatePool;
use crop_core::{Crop, CropId, Field, FieldId, InteractionRule};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::candidate::AllocationCandidate;
use crate::config::OptimizerConfig;
use crate::generation::generate_candidates;
use crate::metrics::PlanningContext;
use crate::result::CropAllocation;
use crate::solution::{flatten, reprice_solution, total_profit};

/// EWMA decay applied to an operator's reward weight on every draw (spec.md
/// §4.9: "weights are EWMA of rewards").
const WEIGHT_DECAY: f64 = 0.8;
/// Floor under any operator's weight so a run of bad luck never drives its
/// roulette-wheel share to zero and strands it unsampled forever.
const MIN_WEIGHT: f64 = 0.05;
/// Tolerance distinguishing a "sideways" accept from a strictly worse one.
const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DestroyOperator {
    RandomRemoval,
    WorstRemoval,
    FieldRemoval,
}
const DESTROY_OPERATORS: [DestroyOperator; 3] = [
    DestroyOperator::RandomRemoval,
    DestroyOperator::WorstRemoval,
    DestroyOperator::FieldRemoval,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepairOperator {
    GreedyInsert,
    TemplateInsert,
}
const REPAIR_OPERATORS: [RepairOperator; 2] = [RepairOperator::GreedyInsert, RepairOperator::TemplateInsert];

/// Outcome class an iteration falls into, driving the reward fed back into
/// the destroy/repair operators that produced it (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Strictly better than the best solution seen so far.
    Best,
    /// Better than the current solution, but not a new global best.
    Improving,
    /// No worse than current (a tie within [`TIE_EPSILON`]); kept to let the
    /// search keep moving sideways rather than stall.
    Accepted,
    /// Worse than current; rejected, current solution is kept unchanged.
    Neutral,
}

fn reward_for(outcome: Outcome) -> f64 {
    match outcome {
        Outcome::Best => 5.0,
        Outcome::Improving => 3.0,
        Outcome::Accepted => 1.0,
        Outcome::Neutral => 0.0,
    }
}

/// Roulette-wheel weights over a fixed operator set, updated by EWMA after
/// every draw.
struct AdaptiveWeights<T> {
    operators: Vec<T>,
    weights: Vec<f64>,
}

impl<T: Copy> AdaptiveWeights<T> {
    fn new(operators: &[T]) -> Self {
        Self { operators: operators.to_vec(), weights: vec![1.0; operators.len()] }
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> (usize, T) {
        let total: f64 = self.weights.iter().sum();
        let mut roll = rng.gen_range(0.0..total);
        for (idx, &w) in self.weights.iter().enumerate() {
            if roll < w {
                return (idx, self.operators[idx]);
            }
            roll -= w;
        }
        (self.operators.len() - 1, self.operators[self.operators.len() - 1])
    }

    fn update(&mut self, idx: usize, reward: f64) {
        let current = self.weights[idx];
        self.weights[idx] = (WEIGHT_DECAY * current + (1.0 - WEIGHT_DECAY) * reward).max(MIN_WEIGHT);
    }
}

/// Removes `removal_rate` (rounded up, at least one) of the flattened
/// solution's allocations using `op`. Returns `None` only when the solution
/// is already empty, so the caller can skip the iteration.
fn destroy(
    op: DestroyOperator,
    solution: &HashMap<FieldId, Vec<CropAllocation>>,
    removal_rate: f64,
    rng: &mut ChaCha8Rng,
) -> Option<(HashMap<FieldId, Vec<CropAllocation>>, Vec<CropAllocation>)> {
    let flat = flatten(solution);
    if flat.is_empty() {
        return None;
    }

    match op {
        DestroyOperator::FieldRemoval => {
            let occupied_fields: Vec<&FieldId> = solution.iter().filter(|(_, allocs)| !allocs.is_empty()).map(|(id, _)| id).collect();
            if occupied_fields.is_empty() {
                return None;
            }
            let target = occupied_fields[rng.gen_range(0..occupied_fields.len())].clone();
            let mut next = solution.clone();
            let removed = next.insert(target, Vec::new()).unwrap_or_default();
            if removed.is_empty() {
                return None;
            }
            Some((next, removed))
        }
        DestroyOperator::RandomRemoval | DestroyOperator::WorstRemoval => {
            let count = ((flat.len() as f64) * removal_rate).ceil().max(1.0) as usize;
            let count = count.min(flat.len());

            let mut victims = flat.clone();
            match op {
                DestroyOperator::WorstRemoval => victims.sort_by(|a, b| a.profit.total_cmp(&b.profit)),
                DestroyOperator::RandomRemoval => {
                    // Fisher-Yates partial shuffle: enough to pick `count`
                    // distinct random victims without biasing toward the
                    // front of the list.
                    let n = victims.len();
                    for i in 0..count.min(n.saturating_sub(1)) {
                        let j = rng.gen_range(i..n);
                        victims.swap(i, j);
                    }
                }
                DestroyOperator::FieldRemoval => unreachable!(),
            }
            let removed: Vec<CropAllocation> = victims.into_iter().take(count).collect();

            let mut next = solution.clone();
            for allocation in &removed {
                if let Some(allocations) = next.get_mut(&allocation.field_id) {
                    allocations.retain(|a| !(a.crop_id == allocation.crop_id && a.start_date == allocation.start_date));
                }
            }
            Some((next, removed))
        }
    }
}

/// Reinserts candidates into `solution` in profit_rate-descending order
/// (mirroring the greedy solver's acceptance rule), drawn from `candidates`.
fn greedy_reinsert(mut solution: HashMap<FieldId, Vec<CropAllocation>>, candidates: Vec<AllocationCandidate>, crops_by_id: &HashMap<CropId, &Crop>, interaction_rules: &[InteractionRule]) -> HashMap<FieldId, Vec<CropAllocation>> {
    let mut scored: Vec<(AllocationCandidate, f64)> = {
        let ctx = PlanningContext::new(&solution, crops_by_id, interaction_rules);
        candidates.into_iter().map(|c| {
            let metrics = c.get_metrics(&ctx);
            (c, metrics.profit_rate)
        }).collect()
    };
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    loop {
        let accepted_idx = scored.iter().position(|(candidate, _)| {
            let existing = solution.get(&candidate.field.field_id).map(Vec::as_slice).unwrap_or(&[]);
            candidate.fits_on_field(existing)
        });
        let Some(idx) = accepted_idx else { break };
        let (candidate, _) = scored.remove(idx);
        let field_id = candidate.field.field_id.clone();
        let metrics = {
            let ctx = PlanningContext::new(&solution, crops_by_id, interaction_rules);
            candidate.get_metrics(&ctx)
        };
        let allocation = candidate.into_allocation(metrics);
        solution.entry(field_id).or_default().push(allocation);
    }
    solution
}

/// Reinserts removed allocations, then scans unused top-K templates by
/// profit_rate (spec.md §4.9's `GreedyInsert`).
fn repair_greedy_insert<'a>(
    solution: HashMap<FieldId, Vec<CropAllocation>>,
    _removed: &[CropAllocation],
    fields: &'a [Field],
    crops_by_id: &HashMap<CropId, &'a Crop>,
    pool: &'a TemplatePool,
    interaction_rules: &'a [InteractionRule],
    top_k: usize,
    area_levels: &[f64],
) -> HashMap<FieldId, Vec<CropAllocation>> {
    let candidates = generate_candidates(fields, crops_by_id, pool, top_k, area_levels);
    greedy_reinsert(solution, candidates, crops_by_id, interaction_rules)
}

/// Prefers templates near the removed allocations' dates (spec.md §4.9's
/// `TemplateInsert`): for each removed allocation, looks up templates for
/// the same crop within a date tolerance, across every field and area level.
fn repair_template_insert<'a>(
    solution: HashMap<FieldId, Vec<CropAllocation>>,
    removed: &[CropAllocation],
    fields: &'a [Field],
    crops_by_id: &HashMap<CropId, &'a Crop>,
    pool: &'a TemplatePool,
    interaction_rules: &'a [InteractionRule],
    area_levels: &[f64],
) -> HashMap<FieldId, Vec<CropAllocation>> {
    const DATE_TOLERANCE_DAYS: i64 = 14;
    let mut candidates = Vec::new();
    for allocation in removed {
        let Some(&crop) = crops_by_id.get(&allocation.crop_id) else { continue };
        let templates = pool.near(&allocation.crop_id, allocation.start_date, DATE_TOLERANCE_DAYS);
        for field in fields {
            for template in &templates {
                for &level in area_levels {
                    candidates.push(AllocationCandidate::new(field, crop, template, field.area * level));
                }
            }
        }
    }
    if candidates.is_empty() {
        // No templates near any removed date (e.g. the pool for that crop is
        // too sparse); fall back to the general top-K scan so the iteration
        // still has a chance to recover lost profit.
        return repair_greedy_insert(solution, removed, fields, crops_by_id, pool, interaction_rules, 50, area_levels);
    }
    greedy_reinsert(solution, candidates, crops_by_id, interaction_rules)
}

fn classify(new_profit: f64, current_profit: f64, best_profit: f64) -> Outcome {
    if new_profit > best_profit + TIE_EPSILON {
        Outcome::Best
    } else if new_profit > current_profit + TIE_EPSILON {
        Outcome::Improving
    } else if new_profit >= current_profit - TIE_EPSILON {
        Outcome::Accepted
    } else {
        Outcome::Neutral
    }
}

/// Runs ALNS from `initial`, returning the best solution found and whether
/// the wall-clock deadline was hit before `alns_iterations` completed.
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
    let mut best = current.clone();
    let mut best_profit = current_profit;

    let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
    let mut destroy_weights = AdaptiveWeights::new(&DESTROY_OPERATORS);
    let mut repair_weights = AdaptiveWeights::new(&REPAIR_OPERATORS);
    let mut time_limit_reached = false;

    for iteration in 0..config.alns_iterations {
        if Instant::now() >= deadline {
            time_limit_reached = true;
            break;
        }

        let (destroy_idx, destroy_op) = destroy_weights.sample(&mut rng);
        let (repair_idx, repair_op) = repair_weights.sample(&mut rng);

        let Some((destroyed, removed)) = destroy(destroy_op, &current, config.alns_removal_rate, &mut rng) else {
            log::debug!("alns iteration {iteration}: destroy produced nothing, skipping");
            continue;
        };

        let repaired = match repair_op {
            RepairOperator::GreedyInsert => repair_greedy_insert(destroyed, &removed, fields, crops_by_id, pool, interaction_rules, config.template_limits.dp, &config.area_levels),
            RepairOperator::TemplateInsert => repair_template_insert(destroyed, &removed, fields, crops_by_id, pool, interaction_rules, &config.area_levels),
        };

        let repriced = reprice_solution(repaired, &fields_by_id, crops_by_id, pool, interaction_rules);
        let new_profit = total_profit(&repriced);
        let outcome = classify(new_profit, current_profit, best_profit);

        destroy_weights.update(destroy_idx, reward_for(outcome));
        repair_weights.update(repair_idx, reward_for(outcome));

        match outcome {
            Outcome::Best => {
                current_profit = new_profit;
                current = repriced.clone();
                best_profit = new_profit;
                best = repriced;
            }
            Outcome::Improving | Outcome::Accepted => {
                current_profit = new_profit;
                current = repriced;
            }
            Outcome::Neutral => {}
        }
    }

    (best, time_limit_reached)
}
