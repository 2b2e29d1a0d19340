//! Configuration surface (spec.md §6.3).
//!
//! [`OptimizerConfig`] models every option in the enumerated configuration
//! table as a single struct with a [`Default`] matching the documented
//! defaults. `candidate_generation_strategy` and `algorithm` are
//! user-facing strings at the struct boundary (so existing config files
//! keep working) but are parsed once, in [`Orchestrator::new`], into the
//! tagged enums below — no string comparison ever happens inside a solver's
//! hot loop.
//!
//! [`Orchestrator::new`]: crate::orchestrator::Orchestrator::new

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};

/// How candidates are generated from the template pool. `PeriodTemplate` is
/// the default (C3-based); `CandidatePool` is the legacy per-(field,crop)
/// precomputation path spec.md keeps naming for backward compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStrategy {
    PeriodTemplate,
    CandidatePool,
}

/// Base allocation algorithm (C6 or C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseAlgorithm {
    Greedy,
    Dp,
}

/// Optional improvement pass layered on top of the base algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImprovementStrategy {
    None,
    LocalSearch,
    Alns,
}

/// Per-operator sampling weights for C8's neighborhood operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OperatorWeights {
    pub field_move: f64,
    pub field_swap: f64,
    pub crop_change: f64,
    pub crop_insert: f64,
    pub period_shift: f64,
    pub area_adjust: f64,
    pub remove: f64,
}

impl Default for OperatorWeights {
    fn default() -> Self {
        Self {
            field_move: 1.0,
            field_swap: 1.0,
            crop_change: 1.0,
            crop_insert: 1.0,
            period_shift: 1.0,
            area_adjust: 1.0,
            remove: 1.0,
        }
    }
}

/// Per-algorithm top-K template cap (`template_limits` in spec.md §6.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemplateLimits {
    pub greedy: usize,
    pub dp: usize,
}

impl Default for TemplateLimits {
    fn default() -> Self {
        Self { greedy: 50, dp: 200 }
    }
}

/// Every configuration option enumerated in spec.md §6.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub candidate_generation_strategy: String,
    pub max_templates_per_crop: usize,
    pub template_limits: TemplateLimits,
    pub algorithm: String,
    pub enable_local_search: bool,
    pub max_local_search_iterations: usize,
    pub max_neighbors_per_iteration: usize,
    pub enable_neighbor_sampling: bool,
    pub operator_weights: OperatorWeights,
    pub enable_alns: bool,
    pub alns_iterations: usize,
    pub alns_removal_rate: f64,
    pub max_computation_time_seconds: f64,
    pub area_levels: Vec<f64>,
    pub min_profit_rate_threshold: f64,
    pub enable_candidate_filtering: bool,
    pub enable_parallel_candidate_generation: bool,
    pub random_seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            candidate_generation_strategy: "period_template".to_string(),
            max_templates_per_crop: 200,
            template_limits: TemplateLimits::default(),
            algorithm: "dp".to_string(),
            enable_local_search: true,
            max_local_search_iterations: 100,
            max_neighbors_per_iteration: 200,
            enable_neighbor_sampling: true,
            operator_weights: OperatorWeights::default(),
            enable_alns: false,
            alns_iterations: 200,
            alns_removal_rate: 0.3,
            max_computation_time_seconds: 60.0,
            area_levels: vec![0.25, 0.5, 0.75, 1.0],
            min_profit_rate_threshold: -0.5,
            enable_candidate_filtering: true,
            enable_parallel_candidate_generation: false,
            random_seed: 0,
        }
    }
}

impl OptimizerConfig {
    /// Parses `candidate_generation_strategy` once into a tagged enum.
    pub fn candidate_strategy(&self) -> PlannerResult<CandidateStrategy> {
        match self.candidate_generation_strategy.as_str() {
            "period_template" => Ok(CandidateStrategy::PeriodTemplate),
            "candidate_pool" => Ok(CandidateStrategy::CandidatePool),
            other => Err(PlannerError::Config(format!(
                "unknown candidate_generation_strategy '{other}', expected 'period_template' or 'candidate_pool'"
            ))),
        }
    }

    /// Parses `algorithm` once into a tagged enum.
    pub fn base_algorithm(&self) -> PlannerResult<BaseAlgorithm> {
        match self.algorithm.as_str() {
            "greedy" => Ok(BaseAlgorithm::Greedy),
            "dp" => Ok(BaseAlgorithm::Dp),
            other => Err(PlannerError::Config(format!(
                "unknown algorithm '{other}', expected 'greedy' or 'dp'"
            ))),
        }
    }

    /// Resolves the improvement pass from `enable_local_search`/`enable_alns`.
    /// `enable_alns` takes precedence when both are set, since C9 "replaces"
    /// C8 per spec.md §6.3 rather than composing with it.
    pub fn improvement_strategy(&self) -> ImprovementStrategy {
        if self.enable_alns {
            ImprovementStrategy::Alns
        } else if self.enable_local_search {
            ImprovementStrategy::LocalSearch
        } else {
            ImprovementStrategy::None
        }
    }

    /// Range/enum validation, the "Configuration errors" arm of the error
    /// taxonomy (spec.md §7 doesn't name this, but a config object that can
    /// be malformed needs one - see SPEC_FULL.md §7).
    pub fn validate(&self) -> PlannerResult<()> {
        self.candidate_strategy()?;
        self.base_algorithm()?;

        if self.max_templates_per_crop == 0 {
            return Err(PlannerError::Config("max_templates_per_crop must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.alns_removal_rate) || self.alns_removal_rate <= 0.0 {
            return Err(PlannerError::Config("alns_removal_rate must be in (0, 1]".into()));
        }
        if self.max_computation_time_seconds <= 0.0 {
            return Err(PlannerError::Config("max_computation_time_seconds must be > 0".into()));
        }
        if self.area_levels.is_empty() || self.area_levels.iter().any(|&level| !(0.0..=1.0).contains(&level) || level <= 0.0) {
            return Err(PlannerError::Config("area_levels must be non-empty and each in (0, 1]".into()));
        }
        if self.max_local_search_iterations == 0 {
            return Err(PlannerError::Config("max_local_search_iterations must be > 0".into()));
        }
        if self.alns_iterations == 0 {
            return Err(PlannerError::Config("alns_iterations must be > 0".into()));
        }
        Ok(())
    }
}
