//! # crop-core: Cultivation Planning Domain Core
//!
//! Provides the fundamental data structures, the Growing-Degree-Day (GDD)
//! kernel, and the period-template pool used to plan crop allocations across
//! fields over a planning horizon.
//!
//! ## Design Philosophy
//!
//! A plan is built from four immutable, field-independent inputs:
//! - **Fields**: parcels with area and a daily fixed cost.
//! - **Crops**: staged thermal requirements (`StageRequirement`) driving a
//!   **Growing-Degree-Day** accumulation, plus revenue/area economics.
//! - **Weather**: a dense, date-ordered daily temperature series.
//! - **Interaction rules**: cross-crop revenue multipliers keyed on crop
//!   family and prior-crop adjacency.
//!
//! From these, [`gdd`] computes daily modified-GDD and a temperature-stress
//! yield factor, [`periods`] slides a window over the weather series to find
//! every admissible (crop, start_date) completion, and [`templates`] pools
//! the resulting records per crop for O(1) application to a field. Solvers
//! that consume this pool live in the sibling `crop-planner` crate.
//!
//! ## ID System
//!
//! Every entity has a unique id (newtype wrapper, type-safe so a
//! [`CropId`] can never be confused with a [`FieldId`]):
//! - [`FieldId`] — wraps a `String` (caller-assigned, e.g. "field-A")
//! - [`CropId`] — wraps a `String`
//! - [`TemplateId`] — `"{crop_id}|{start_date}"`, derived, never constructed directly
//!
//! ## Modules
//!
//! - [`diagnostics`] — non-fatal validation issue collection
//! - [`error`] — typed error hierarchy ([`error::CoreError`])
//! - [`gdd`] — C1: temperature efficiency, daily modified GDD, yield factor
//! - [`periods`] — C2: sliding-window period generator
//! - [`templates`] — C3: per-crop period-template pool

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod gdd;
pub mod periods;
pub mod templates;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CoreError, CoreResult};

/// Unique identifier for a [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(value: impl Into<String>) -> Self {
        FieldId(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a [`Crop`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropId(String);

impl CropId {
    pub fn new(value: impl Into<String>) -> Self {
        CropId(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CropId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a [`templates::PeriodTemplate`]: `"{crop_id}|{start_date}"`.
///
/// Always derived from a `(CropId, NaiveDate)` pair via [`TemplateId::new`];
/// never constructed by a caller from an arbitrary string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(crop_id: &CropId, start_date: NaiveDate) -> Self {
        TemplateId(format!("{}|{}", crop_id.value(), start_date.format("%Y-%m-%d")))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default fallow gap (in days) between consecutive allocations on a field
/// when a field does not specify its own `fallow_period_days`.
pub const DEFAULT_FALLOW_PERIOD_DAYS: u32 = 28;

/// A cultivable parcel. Immutable; shared read-only across every solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub field_id: FieldId,
    pub name: String,
    /// Parcel area in square meters. Must be > 0.
    pub area: f64,
    /// Daily fixed cost (currency/day) incurred for every day an allocation
    /// occupies this field, independent of area used.
    pub daily_fixed_cost: f64,
    /// Mandatory soil-rest gap (days) enforced between consecutive
    /// allocations on this field.
    pub fallow_period_days: u32,
}

impl Field {
    pub fn new(field_id: FieldId, name: impl Into<String>, area: f64, daily_fixed_cost: f64) -> Self {
        Self {
            field_id,
            name: name.into(),
            area,
            daily_fixed_cost,
            fallow_period_days: DEFAULT_FALLOW_PERIOD_DAYS,
        }
    }

    pub fn with_fallow_period_days(mut self, days: u32) -> Self {
        self.fallow_period_days = days;
        self
    }

    /// Validates the invariants spec.md §7 assigns to a field's input
    /// (non-positive area is a hard [`CoreError::Input`]).
    pub fn validate(&self) -> CoreResult<()> {
        if self.area <= 0.0 {
            return Err(CoreError::Input(format!(
                "field '{}' has non-positive area {}",
                self.field_id, self.area
            )));
        }
        if self.daily_fixed_cost < 0.0 {
            return Err(CoreError::Input(format!(
                "field '{}' has negative daily_fixed_cost {}",
                self.field_id, self.daily_fixed_cost
            )));
        }
        Ok(())
    }
}

/// Temperature tolerances for one crop growth stage. All values in °C.
///
/// Invariant: `base_temperature < optimal_min <= optimal_max < max_temperature`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemperatureProfile {
    pub base_temperature: f64,
    pub optimal_min: f64,
    pub optimal_max: f64,
    pub low_stress_threshold: f64,
    pub high_stress_threshold: f64,
    pub frost_threshold: f64,
    /// Upper viability bound. Required — `gdd::temperature_efficiency` treats
    /// `T >= max_temperature` as zero efficiency.
    pub max_temperature: f64,
    /// If set, days at or above this temperature apply an extra 0.95
    /// multiplier to the yield factor, but only within stages marked
    /// [`StageRequirement::is_reproductive`].
    pub sterility_risk_threshold: Option<f64>,
}

impl TemperatureProfile {
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.base_temperature < self.optimal_min
            && self.optimal_min <= self.optimal_max
            && self.optimal_max < self.max_temperature)
        {
            return Err(CoreError::Input(format!(
                "temperature profile invariant violated: base={} optimal_min={} optimal_max={} max={}",
                self.base_temperature, self.optimal_min, self.optimal_max, self.max_temperature
            )));
        }
        Ok(())
    }
}

/// One ordered growth stage of a [`Crop`]'s thermal requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRequirement {
    /// 1-based order within the crop's stage sequence.
    pub order: u32,
    pub profile: TemperatureProfile,
    /// GDD that must accumulate within this stage before it completes. Must be > 0.
    pub required_gdd: f64,
    pub sunshine_hours_min: Option<f64>,
    pub sunshine_hours_max: Option<f64>,
    /// Marks this stage as reproductive, enabling the sterility-risk stress
    /// multiplier in [`gdd::yield_stress_multiplier`].
    pub is_reproductive: bool,
}

impl StageRequirement {
    pub fn new(order: u32, profile: TemperatureProfile, required_gdd: f64) -> Self {
        Self {
            order,
            profile,
            required_gdd,
            sunshine_hours_min: None,
            sunshine_hours_max: None,
            is_reproductive: false,
        }
    }

    pub fn reproductive(mut self) -> Self {
        self.is_reproductive = true;
        self
    }
}

/// A crop type with staged thermal requirements and plan economics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crop {
    pub crop_id: CropId,
    pub variety: Option<String>,
    /// Area consumed per cultivated unit (m²/unit).
    pub area_per_unit: f64,
    /// Revenue per square meter of area used, at `yield_factor = 1.0`. `None`
    /// is treated as 0 revenue (profit = -cost for any allocation).
    pub revenue_per_area: Option<f64>,
    /// Total-revenue cap across the whole plan for this crop. `None` means
    /// unbounded.
    pub max_revenue: Option<f64>,
    /// Family used to match [`InteractionRule`]s.
    pub crop_family: String,
    /// Ordered `order` 1..N, strictly increasing.
    pub stage_requirements: Vec<StageRequirement>,
}

impl Crop {
    /// Sum of `required_gdd` across all stages; the threshold
    /// [`periods::generate_periods`] accumulates toward.
    pub fn required_total_gdd(&self) -> f64 {
        self.stage_requirements.iter().map(|s| s.required_gdd).sum()
    }

    /// Validates stage ordering and required crop-input invariants from
    /// spec.md §7 (`max_temperature` presence is enforced transitively via
    /// [`TemperatureProfile`], which makes the field non-optional).
    pub fn validate(&self) -> CoreResult<()> {
        if self.stage_requirements.is_empty() {
            return Err(CoreError::Input(format!(
                "crop '{}' has no stage requirements",
                self.crop_id
            )));
        }
        let mut expected = 1u32;
        for stage in &self.stage_requirements {
            if stage.order != expected {
                return Err(CoreError::Input(format!(
                    "crop '{}' has non-monotone stage ordering: expected order {}, found {}",
                    self.crop_id, expected, stage.order
                )));
            }
            if stage.required_gdd <= 0.0 {
                return Err(CoreError::Input(format!(
                    "crop '{}' stage {} has non-positive required_gdd {}",
                    self.crop_id, stage.order, stage.required_gdd
                )));
            }
            stage.profile.validate()?;
            expected += 1;
        }
        if self.area_per_unit <= 0.0 {
            return Err(CoreError::Input(format!(
                "crop '{}' has non-positive area_per_unit {}",
                self.crop_id, self.area_per_unit
            )));
        }
        Ok(())
    }
}

/// One day of observed temperature. `temperature_mean` falls back to
/// `(max + min) / 2` when missing; a day missing all three fields
/// contributes zero GDD (see [`gdd::daily_modified_gdd`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeatherDay {
    pub date: NaiveDate,
    pub temperature_mean: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
}

impl WeatherDay {
    /// Resolves the effective mean temperature for GDD purposes, or `None`
    /// if no temperature observation is available at all.
    pub fn effective_mean(&self) -> Option<f64> {
        self.temperature_mean.or_else(|| match (self.temperature_max, self.temperature_min) {
            (Some(max), Some(min)) => Some((max + min) / 2.0),
            _ => None,
        })
    }
}

/// A dense, date-ordered, contiguous daily weather series.
///
/// Stored as a flat `Vec<WeatherDay>` plus `start_date` so date arithmetic
/// reduces to an O(1) index lookup: `index = (date - start_date).num_days()`.
#[derive(Debug, Clone)]
pub struct WeatherSeries {
    start_date: NaiveDate,
    days: Vec<WeatherDay>,
}

impl WeatherSeries {
    /// Builds a series from date-ordered days, rejecting any gap as
    /// [`CoreError::Input`] (missing days are an input error, not silently
    /// interpolated).
    pub fn new(days: Vec<WeatherDay>) -> CoreResult<Self> {
        if days.is_empty() {
            return Err(CoreError::Input("weather series is empty".into()));
        }
        let start_date = days[0].date;
        for (offset, day) in days.iter().enumerate() {
            let expected = start_date + chrono::Duration::days(offset as i64);
            if day.date != expected {
                return Err(CoreError::Input(format!(
                    "weather series is non-contiguous: expected {} at index {}, found {}",
                    expected, offset, day.date
                )));
            }
        }
        Ok(Self { start_date, days })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.start_date + chrono::Duration::days(self.days.len() as i64 - 1)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Index of `date` in the dense series, or `None` if out of range.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if date < self.start_date {
            return None;
        }
        let offset = (date - self.start_date).num_days();
        let offset = usize::try_from(offset).ok()?;
        if offset < self.days.len() {
            Some(offset)
        } else {
            None
        }
    }

    pub fn day_at(&self, index: usize) -> Option<&WeatherDay> {
        self.days.get(index)
    }

    pub fn days(&self) -> &[WeatherDay] {
        &self.days
    }
}

/// Kind of cross-crop interaction a rule encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionRuleType {
    /// Same (or matching) family cultivated back-to-back on the same field.
    ContinuousCultivation,
    /// Favorable adjacency between two distinct families.
    Companion,
    /// Favorable rotation between two distinct families.
    RotationBenefit,
}

/// A revenue-multiplier rule keyed on the family of the immediately
/// preceding allocation on the same field and the family of the candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRule {
    pub rule_type: InteractionRuleType,
    pub crop_family_a: String,
    pub crop_family_b: String,
    /// Multiplier applied to `base_revenue` when the rule matches.
    pub impact_ratio: f64,
    /// When true, the rule only matches `prev.family == family_a &&
    /// candidate.family == family_b` (in that order). When false, it matches
    /// either ordering of `(family_a, family_b)`.
    pub is_directional: bool,
}

impl InteractionRule {
    /// Whether this rule's family keys match a `(prev_family,
    /// candidate_family)` adjacency, honoring directionality.
    pub fn matches(&self, prev_family: &str, candidate_family: &str) -> bool {
        let forward = self.crop_family_a == prev_family && self.crop_family_b == candidate_family;
        if self.is_directional {
            forward
        } else {
            forward || (self.crop_family_a == candidate_family && self.crop_family_b == prev_family)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> TemperatureProfile {
        TemperatureProfile {
            base_temperature: 10.0,
            optimal_min: 25.0,
            optimal_max: 30.0,
            low_stress_threshold: 15.0,
            high_stress_threshold: 35.0,
            frost_threshold: 2.0,
            max_temperature: 42.0,
            sterility_risk_threshold: None,
        }
    }

    #[test]
    fn test_field_id_display_and_value() {
        let id = FieldId::new("field-A");
        assert_eq!(id.value(), "field-A");
        assert_eq!(format!("{}", id), "field-A");
    }

    #[test]
    fn test_template_id_derivation() {
        let crop_id = CropId::new("rice");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let template_id = TemplateId::new(&crop_id, date);
        assert_eq!(template_id.value(), "rice|2024-03-01");
    }

    #[test]
    fn test_field_validate_rejects_non_positive_area() {
        let field = Field::new(FieldId::new("f1"), "Field 1", 0.0, 100.0);
        assert!(field.validate().is_err());
    }

    #[test]
    fn test_field_validate_accepts_positive_area() {
        let field = Field::new(FieldId::new("f1"), "Field 1", 1000.0, 5000.0);
        assert!(field.validate().is_ok());
    }

    #[test]
    fn test_temperature_profile_validate_invariant() {
        let mut profile = sample_profile();
        assert!(profile.validate().is_ok());
        profile.optimal_min = 5.0; // below base_temperature
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_crop_validate_non_monotone_stages() {
        let crop = Crop {
            crop_id: CropId::new("rice"),
            variety: None,
            area_per_unit: 0.25,
            revenue_per_area: Some(2.0),
            max_revenue: None,
            crop_family: "Poaceae".into(),
            stage_requirements: vec![
                StageRequirement::new(1, sample_profile(), 500.0),
                StageRequirement::new(3, sample_profile(), 500.0),
            ],
        };
        assert!(crop.validate().is_err());
    }

    #[test]
    fn test_crop_required_total_gdd() {
        let crop = Crop {
            crop_id: CropId::new("rice"),
            variety: None,
            area_per_unit: 0.25,
            revenue_per_area: Some(2.0),
            max_revenue: None,
            crop_family: "Poaceae".into(),
            stage_requirements: vec![
                StageRequirement::new(1, sample_profile(), 400.0),
                StageRequirement::new(2, sample_profile(), 600.0),
            ],
        };
        assert_eq!(crop.required_total_gdd(), 1000.0);
    }

    #[test]
    fn test_weather_series_rejects_non_contiguous() {
        let d0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let days = vec![
            WeatherDay { date: d0, temperature_mean: Some(20.0), temperature_max: None, temperature_min: None },
            WeatherDay { date: d2, temperature_mean: Some(20.0), temperature_max: None, temperature_min: None },
        ];
        assert!(WeatherSeries::new(days).is_err());
    }

    #[test]
    fn test_weather_series_index_of() {
        let d0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let days = (0..5)
            .map(|i| WeatherDay {
                date: d0 + chrono::Duration::days(i),
                temperature_mean: Some(20.0),
                temperature_max: None,
                temperature_min: None,
            })
            .collect();
        let series = WeatherSeries::new(days).unwrap();
        assert_eq!(series.index_of(d0), Some(0));
        assert_eq!(series.index_of(d0 + chrono::Duration::days(4)), Some(4));
        assert_eq!(series.index_of(d0 + chrono::Duration::days(5)), None);
        assert_eq!(series.index_of(d0 - chrono::Duration::days(1)), None);
    }

    #[test]
    fn test_weather_day_effective_mean_fallback() {
        let day = WeatherDay {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            temperature_mean: None,
            temperature_max: Some(30.0),
            temperature_min: Some(10.0),
        };
        assert_eq!(day.effective_mean(), Some(20.0));
    }

    #[test]
    fn test_weather_day_effective_mean_missing_all() {
        let day = WeatherDay {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            temperature_mean: None,
            temperature_max: None,
            temperature_min: None,
        };
        assert_eq!(day.effective_mean(), None);
    }

    #[test]
    fn test_interaction_rule_directional_match() {
        let rule = InteractionRule {
            rule_type: InteractionRuleType::ContinuousCultivation,
            crop_family_a: "Solanaceae".into(),
            crop_family_b: "Solanaceae".into(),
            impact_ratio: 0.7,
            is_directional: true,
        };
        assert!(rule.matches("Solanaceae", "Solanaceae"));
        assert!(!rule.matches("Poaceae", "Solanaceae"));
    }

    #[test]
    fn test_interaction_rule_non_directional_match_either_order() {
        let rule = InteractionRule {
            rule_type: InteractionRuleType::Companion,
            crop_family_a: "Fabaceae".into(),
            crop_family_b: "Poaceae".into(),
            impact_ratio: 1.1,
            is_directional: false,
        };
        assert!(rule.matches("Fabaceae", "Poaceae"));
        assert!(rule.matches("Poaceae", "Fabaceae"));
        assert!(!rule.matches("Poaceae", "Solanaceae"));
    }
}
