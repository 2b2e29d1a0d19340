//! Orchestrator (component C10, spec.md §4.10): the single
//! `optimize(request) -> OptimizationResult` entry point composing candidate
//! generation, a base algorithm, and an optional improvement pass.
//!
//! [`Orchestrator::new`] parses `OptimizerConfig`'s string fields into the
//! tagged [`CandidateStrategy`]/[`BaseAlgorithm`]/[`ImprovementStrategy`]
//! enums exactly once, so [`Orchestrator::optimize`] never compares strings
//! in a hot loop (spec.md §9's anti-runtime-registry redesign flag).

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use crop_core::templates::TemplatePool;
use crop_core::{Crop, CropId, Field, FieldId, InteractionRule, WeatherSeries};

use crate::config::{BaseAlgorithm, ImprovementStrategy, OptimizerConfig};
use crate::error::PlannerResult;
use crate::generation::build_template_pool;
use crate::result::{CropAllocation, FieldSchedule, OptimizationResult};
use crate::solvers::{alns, dp, greedy, local_search};
use crate::sources::{CropSource, FieldSource, InteractionRuleSource, WeatherSource};

/// Everything `optimize` needs to plan one horizon: the field/crop/weather/
/// interaction-rule catalogs plus the window to generate candidates within.
/// Built directly, or via [`Orchestrator::optimize_from_sources`] for callers
/// whose catalogs live behind the C6.1 collaborator traits.
pub struct OptimizationRequest {
    pub fields: Vec<Field>,
    pub crops: Vec<Crop>,
    pub weather: WeatherSeries,
    pub horizon_start: NaiveDate,
    pub horizon_end: NaiveDate,
    pub interaction_rules: Vec<InteractionRule>,
}

/// Composes candidate generation, a base algorithm, and an optional
/// improvement pass behind one configuration.
pub struct Orchestrator {
    config: OptimizerConfig,
    base_algorithm: BaseAlgorithm,
    improvement_strategy: ImprovementStrategy,
}

impl Orchestrator {
    /// Validates `config` and resolves its string fields into tagged enums
    /// once. Returns an error immediately for an unrecognized
    /// `algorithm`/`candidate_generation_strategy` or an out-of-range
    /// numeric field, rather than failing deep inside a solver.
    pub fn new(config: OptimizerConfig) -> PlannerResult<Self> {
        config.validate()?;
        // candidate_generation_strategy is validated here too, even though
        // both of its values currently drive the same C3 template-pool
        // pipeline (spec.md §6.3 keeps "candidate_pool" as a recognized,
        // backward-compatible name rather than naming a distinct algorithm).
        config.candidate_strategy()?;
        let base_algorithm = config.base_algorithm()?;
        let improvement_strategy = config.improvement_strategy();
        Ok(Self { config, base_algorithm, improvement_strategy })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Runs the full pipeline against an already-loaded [`OptimizationRequest`]:
    /// build the template pool, dispatch to the base algorithm, optionally
    /// improve, and assemble the report. Never exceeds
    /// `max_computation_time_seconds` by more than one solver-phase quantum —
    /// the deadline is checked between phases and inside each solver's loop.
    pub fn optimize(&self, request: &OptimizationRequest) -> PlannerResult<OptimizationResult> {
        let started_at = Instant::now();
        let deadline = started_at + std::time::Duration::from_secs_f64(self.config.max_computation_time_seconds);

        log::info!(
            "orchestrator: building template pool for {} crop(s) over {} field(s)",
            request.crops.len(),
            request.fields.len()
        );
        let pool = build_template_pool(&request.crops, &request.weather, request.horizon_start, request.horizon_end, &self.config)?;

        let crops_by_id: HashMap<CropId, &Crop> = request.crops.iter().map(|c| (c.crop_id.clone(), c)).collect();

        let (mut allocations_by_field, mut time_limit_reached) = match self.base_algorithm {
            BaseAlgorithm::Greedy => {
                log::info!("orchestrator: running greedy base algorithm");
                greedy::solve_greedy(&request.fields, &crops_by_id, &pool, &request.interaction_rules, &self.config, deadline)
            }
            BaseAlgorithm::Dp => {
                log::info!("orchestrator: running dp base algorithm");
                dp::solve_dp(&request.fields, &crops_by_id, &pool, &request.interaction_rules, &self.config, deadline)
            }
        };

        let algorithm_name = match (self.base_algorithm, self.improvement_strategy) {
            (base, ImprovementStrategy::None) => base_algorithm_name(base).to_string(),
            (base, ImprovementStrategy::LocalSearch) => format!("{}+local_search", base_algorithm_name(base)),
            (base, ImprovementStrategy::Alns) => format!("{}+alns", base_algorithm_name(base)),
        };

        if !time_limit_reached {
            match self.improvement_strategy {
                ImprovementStrategy::None => {}
                ImprovementStrategy::LocalSearch => {
                    log::info!("orchestrator: running local search improvement");
                    let (improved, hit_deadline) = local_search::improve(allocations_by_field, &request.fields, &crops_by_id, &pool, &request.interaction_rules, &self.config, deadline);
                    allocations_by_field = improved;
                    time_limit_reached = hit_deadline;
                }
                ImprovementStrategy::Alns => {
                    log::info!("orchestrator: running alns improvement");
                    let (improved, hit_deadline) = alns::improve(allocations_by_field, &request.fields, &crops_by_id, &pool, &request.interaction_rules, &self.config, deadline);
                    allocations_by_field = improved;
                    time_limit_reached = hit_deadline;
                }
            }
        }

        let field_schedules = to_field_schedules(&request.fields, allocations_by_field);
        let field_areas: HashMap<FieldId, f64> = request.fields.iter().map(|f| (f.field_id.clone(), f.area)).collect();
        let computation_time_seconds = started_at.elapsed().as_secs_f64();

        Ok(OptimizationResult::assemble(field_schedules, &field_areas, algorithm_name, computation_time_seconds, time_limit_reached))
    }

    /// Loads catalogs through the C6.1 collaborator traits, then runs
    /// [`Orchestrator::optimize`]. This is the crate's `anyhow` boundary
    /// (spec.md §7): a [`crate::sources::SourceError`] from any collaborator,
    /// or a [`crate::error::PlannerError`] from the pipeline itself, is
    /// reported with enough context to tell which stage failed.
    pub fn optimize_from_sources(
        &self,
        field_source: &dyn FieldSource,
        crop_source: &dyn CropSource,
        weather_source: &dyn WeatherSource,
        interaction_rule_source: &dyn InteractionRuleSource,
        horizon_start: NaiveDate,
        horizon_end: NaiveDate,
    ) -> anyhow::Result<OptimizationResult> {
        use anyhow::Context;

        let fields = field_source.fields().context("loading field catalog")?;
        let crops = crop_source.crops().context("loading crop catalog")?;
        let weather = weather_source.weather(horizon_start, horizon_end).context("loading weather series")?;
        let interaction_rules = interaction_rule_source.interaction_rules().context("loading interaction rules")?;

        let request = OptimizationRequest { fields, crops, weather, horizon_start, horizon_end, interaction_rules };
        self.optimize(&request).context("running optimization pipeline")
    }
}

fn base_algorithm_name(base: BaseAlgorithm) -> &'static str {
    match base {
        BaseAlgorithm::Greedy => "greedy",
        BaseAlgorithm::Dp => "dp",
    }
}

fn to_field_schedules(fields: &[Field], allocations_by_field: HashMap<FieldId, Vec<CropAllocation>>) -> Vec<FieldSchedule> {
    fields
        .iter()
        .map(|field| {
            let mut allocations = allocations_by_field.get(&field.field_id).cloned().unwrap_or_default();
            allocations.sort_by_key(|a| a.start_date);
            FieldSchedule { field_id: field.field_id.clone(), allocations }
        })
        .collect()
}
