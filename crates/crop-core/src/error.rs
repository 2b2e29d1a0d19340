//! Typed error hierarchy for the cultivation-planning core.
//!
//! [`CoreError`] covers everything that can go wrong while building the
//! domain model and the GDD/period-template layer: malformed input entities,
//! a weather series that cannot close a growth window, and invariant
//! violations raised when a constructed allocation would break the
//! non-overlap/area/demand-cap rules. The taxonomy mirrors the error kinds
//! named in the specification rather than being invented ad hoc.
//!
//! # Example
//!
//! ```
//! use crop_core::error::{CoreError, CoreResult};
//!
//! fn require_positive_area(area: f64) -> CoreResult<()> {
//!     if area <= 0.0 {
//!         return Err(CoreError::Input("field area must be positive".into()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for `crop-core` operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Malformed or missing input data: a field with non-positive area, a
    /// crop missing `max_temperature`, non-monotone stage ordering, an
    /// inverted horizon, or an empty weather series.
    #[error("input error: {0}")]
    Input(String),

    /// The weather series does not extend far enough for the sliding window
    /// to close for every admissible start date in the requested horizon.
    #[error("weather range insufficient: {0}")]
    WeatherRangeInsufficient(String),

    /// A constructed allocation would violate the fallow-respecting
    /// non-overlap invariant on a field. Indicates a programming error in a
    /// solver, never a normal planning outcome.
    #[error("fallow violation: {0}")]
    FallowViolation(String),

    /// A constructed allocation would push concurrently active area over a
    /// field's capacity. Programming error, never a normal planning outcome.
    #[error("capacity violation: {0}")]
    CapacityViolation(String),

    /// Two allocations on the same field overlap in time outside the fallow
    /// rule. Programming error, never a normal planning outcome.
    #[error("overlap violation: {0}")]
    OverlapViolation(String),
}

/// Convenience alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Input(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Input(s.to_string())
    }
}
