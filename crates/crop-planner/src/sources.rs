//! External collaborator traits (component C6.1, spec.md §6.1).
//!
//! A caller rarely already holds `Vec<Field>`/`Vec<Crop>`/`WeatherSeries`/
//! `Vec<InteractionRule>` in memory — they come from a database, a config
//! file, or a remote catalog service. These traits are the seam: plain,
//! synchronous, no DI container and no `async fn` (spec.md §6.1 rules both
//! out explicitly), so an adapter is just an impl block over whatever I/O the
//! caller already has.

use crop_core::{Crop, Field, InteractionRule, WeatherSeries};
use thiserror::Error;

/// Failure retrieving data through a [`FieldSource`]/[`CropSource`]/
/// [`WeatherSource`]/[`InteractionRuleSource`] implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The requested entity (or the whole collection) doesn't exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Data was retrieved but failed to parse or violates a `crop-core`
    /// invariant (e.g. a crop with non-monotone stage order).
    #[error("malformed source data: {0}")]
    Malformed(String),

    /// The backing system (database, file, network) could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Supplies the field catalog. An adapter over a database table, a config
/// file, or an in-memory fixture all implement this the same way.
pub trait FieldSource {
    fn fields(&self) -> SourceResult<Vec<Field>>;
}

/// Supplies the crop catalog (varieties, stage requirements, revenue model).
pub trait CropSource {
    fn crops(&self) -> SourceResult<Vec<Crop>>;
}

/// Supplies daily weather for the planning horizon. Implementations decide
/// how `start`/`end` map onto their backing store (a weather API call, a CSV
/// read, ...); the only contract is the returned series covers the request
/// or returns an error describing why it can't.
pub trait WeatherSource {
    fn weather(&self, start: chrono::NaiveDate, end: chrono::NaiveDate) -> SourceResult<WeatherSeries>;
}

/// Supplies the crop-family interaction rules (companion planting,
/// continuous-cultivation penalties, rotation benefits).
pub trait InteractionRuleSource {
    fn interaction_rules(&self) -> SourceResult<Vec<InteractionRule>>;
}

/// In-memory implementation of all four traits, useful for tests and for
/// callers who already have the catalogs loaded and just want to satisfy
/// [`crate::orchestrator::Orchestrator::optimize`]'s bounds.
pub struct StaticCatalog {
    pub fields: Vec<Field>,
    pub crops: Vec<Crop>,
    pub weather: WeatherSeries,
    pub interaction_rules: Vec<InteractionRule>,
}

impl FieldSource for StaticCatalog {
    fn fields(&self) -> SourceResult<Vec<Field>> {
        Ok(self.fields.clone())
    }
}

impl CropSource for StaticCatalog {
    fn crops(&self) -> SourceResult<Vec<Crop>> {
        Ok(self.crops.clone())
    }
}

impl WeatherSource for StaticCatalog {
    fn weather(&self, start: chrono::NaiveDate, end: chrono::NaiveDate) -> SourceResult<WeatherSeries> {
        if start < self.weather.start_date() || end > self.weather.end_date() {
            return Err(SourceError::NotFound(format!(
                "requested range {start}..{end} outside available weather {}..{}",
                self.weather.start_date(),
                self.weather.end_date()
            )));
        }
        Ok(self.weather.clone())
    }
}

impl InteractionRuleSource for StaticCatalog {
    fn interaction_rules(&self) -> SourceResult<Vec<InteractionRule>> {
        Ok(self.interaction_rules.clone())
    }
}
