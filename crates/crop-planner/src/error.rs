//! Typed error hierarchy for the `crop-planner` crate.
//!
//! [`PlannerError`] wraps [`crop_core::CoreError`] (input/weather-range
//! failures bubble straight up from the kernel) and adds the solver-facing
//! arms: configuration validation and the three invariant-violation kinds
//! that indicate a bug in a solver rather than an ordinary planning outcome.
//! `FeasibilityExhausted` and compute-timeout are deliberately *not* error
//! variants here — spec.md §7 calls both non-fatal result states, so they
//! surface as fields on [`crate::result::OptimizationResult`] instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error(transparent)]
    Core(#[from] crop_core::CoreError),

    /// An `OptimizerConfig` value failed range/enum validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A constructed allocation would violate the fallow-respecting
    /// non-overlap invariant. Programming error in a solver; fatal.
    #[error("fallow violation: {0}")]
    FallowViolation(String),

    /// A constructed allocation would push concurrently active area over a
    /// field's capacity. Programming error; fatal.
    #[error("capacity violation: {0}")]
    CapacityViolation(String),

    /// Two allocations on the same field overlap in time outside the fallow
    /// rule. Programming error; fatal.
    #[error("overlap violation: {0}")]
    OverlapViolation(String),
}

pub type PlannerResult<T> = Result<T, PlannerError>;
