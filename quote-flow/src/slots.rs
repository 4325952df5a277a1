//! Slot model: the accumulated, partially filled description of a quote request.
//!
//! Every value that lands in a [`SlotState`] has already passed through a validating
//! constructor, so a state can never hold an out-of-range year, age or deductible. The
//! extractor's output is untrusted; [`SlotState::merge`] validates each candidate on its
//! own and drops only the offending slot.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::extraction::SlotCandidates;

/// One named attribute of the quote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    VehicleYear,
    VehicleMake,
    VehicleModel,
    VehicleValueUsd,
    Usage,
    City,
    DriverAge,
    #[serde(rename = "claims_last_3y")]
    ClaimsLast3y,
    AntiTheft,
    GarageOvernight,
    DeductiblePct,
    Addons,
}

/// Required slots, in the order they are asked for.
pub const REQUIRED_SLOTS: [Slot; 8] = [
    Slot::VehicleYear,
    Slot::VehicleMake,
    Slot::VehicleModel,
    Slot::VehicleValueUsd,
    Slot::Usage,
    Slot::City,
    Slot::DriverAge,
    Slot::ClaimsLast3y,
];

/// Optional slots, in the order they are asked for once every required slot is known.
pub const OPTIONAL_SLOTS: [Slot; 4] = [
    Slot::AntiTheft,
    Slot::GarageOvernight,
    Slot::DeductiblePct,
    Slot::Addons,
];

impl Slot {
    /// Every slot, required first.
    pub fn all() -> impl Iterator<Item = Slot> {
        REQUIRED_SLOTS.into_iter().chain(OPTIONAL_SLOTS)
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::VehicleYear => "vehicle_year",
            Slot::VehicleMake => "vehicle_make",
            Slot::VehicleModel => "vehicle_model",
            Slot::VehicleValueUsd => "vehicle_value_usd",
            Slot::Usage => "usage",
            Slot::City => "city",
            Slot::DriverAge => "driver_age",
            Slot::ClaimsLast3y => "claims_last_3y",
            Slot::AntiTheft => "anti_theft",
            Slot::GarageOvernight => "garage_overnight",
            Slot::DeductiblePct => "deductible_pct",
            Slot::Addons => "addons",
        }
    }

    pub fn is_required(self) -> bool {
        REQUIRED_SLOTS.contains(&self)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A slot value that violates its declared constraint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{slot} must be between {min} and {max}, got {value}")]
    OutOfRange {
        slot: Slot,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{slot} must be a positive amount, got {value}")]
    NotPositive { slot: Slot, value: f64 },

    #[error("{slot} does not accept `{value}`")]
    NotAllowed { slot: Slot, value: String },

    #[error("{slot} expected {expected}, got {found}")]
    WrongType {
        slot: Slot,
        expected: &'static str,
        found: String,
    },
}

impl ValidationError {
    pub fn slot(&self) -> Slot {
        match self {
            ValidationError::OutOfRange { slot, .. }
            | ValidationError::NotPositive { slot, .. }
            | ValidationError::NotAllowed { slot, .. }
            | ValidationError::WrongType { slot, .. } => *slot,
        }
    }
}

macro_rules! bounded_integer {
    ($(#[$meta:meta])* $name:ident($repr:ty), $slot:expr, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name($repr);

        impl $name {
            pub const MIN: i64 = $min;
            pub const MAX: i64 = $max;

            pub fn get(self) -> $repr {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                if (Self::MIN..=Self::MAX).contains(&value) {
                    Ok(Self(value as $repr))
                } else {
                    Err(ValidationError::OutOfRange {
                        slot: $slot,
                        value,
                        min: Self::MIN,
                        max: Self::MAX,
                    })
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                i64::from(value.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

bounded_integer!(
    /// Model year of the vehicle.
    VehicleYear(u16),
    Slot::VehicleYear,
    1980,
    2035
);

bounded_integer!(
    /// Age of the main driver.
    DriverAge(u8),
    Slot::DriverAge,
    16,
    90
);

bounded_integer!(
    /// Claims filed in the last three years.
    ClaimCount(u8),
    Slot::ClaimsLast3y,
    0,
    10
);

/// Reference value of the vehicle in USD. Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct VehicleValue(f64);

impl VehicleValue {
    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for VehicleValue {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ValidationError::NotPositive {
                slot: Slot::VehicleValueUsd,
                value,
            })
        }
    }
}

impl From<VehicleValue> for f64 {
    fn from(value: VehicleValue) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    Particular,
    #[serde(alias = "comercial")]
    Commercial,
}

impl FromStr for Usage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "particular" => Ok(Usage::Particular),
            "commercial" | "comercial" => Ok(Usage::Commercial),
            _ => Err(ValidationError::NotAllowed {
                slot: Slot::Usage,
                value: s.to_string(),
            }),
        }
    }
}

/// Deductible percentage. Only the four offered levels exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Deductible {
    Five,
    Ten,
    Fifteen,
    Twenty,
}

impl Deductible {
    pub fn percent(self) -> u8 {
        match self {
            Deductible::Five => 5,
            Deductible::Ten => 10,
            Deductible::Fifteen => 15,
            Deductible::Twenty => 20,
        }
    }
}

impl TryFrom<i64> for Deductible {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Deductible::Five),
            10 => Ok(Deductible::Ten),
            15 => Ok(Deductible::Fifteen),
            20 => Ok(Deductible::Twenty),
            other => Err(ValidationError::NotAllowed {
                slot: Slot::DeductiblePct,
                value: other.to_string(),
            }),
        }
    }
}

impl From<Deductible> for i64 {
    fn from(value: Deductible) -> Self {
        i64::from(value.percent())
    }
}

/// Optional extra coverage. Ordering follows declaration so sets iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addon {
    #[serde(alias = "asistencia_vial")]
    RoadsideAssistance,
    #[serde(alias = "auto_reemplazo")]
    ReplacementVehicle,
    #[serde(alias = "cobertura_lunas")]
    GlassCoverage,
}

impl Addon {
    pub fn name(self) -> &'static str {
        match self {
            Addon::RoadsideAssistance => "roadside_assistance",
            Addon::ReplacementVehicle => "replacement_vehicle",
            Addon::GlassCoverage => "glass_coverage",
        }
    }
}

impl FromStr for Addon {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "roadside_assistance" | "asistencia_vial" => Ok(Addon::RoadsideAssistance),
            "replacement_vehicle" | "auto_reemplazo" => Ok(Addon::ReplacementVehicle),
            "glass_coverage" | "cobertura_lunas" => Ok(Addon::GlassCoverage),
            _ => Err(ValidationError::NotAllowed {
                slot: Slot::Addons,
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Addon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conversation state for one quote request. Created empty, grown one turn at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotState {
    pub vehicle_year: Option<VehicleYear>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_value_usd: Option<VehicleValue>,
    pub usage: Option<Usage>,
    pub city: Option<String>,
    pub driver_age: Option<DriverAge>,
    pub claims_last_3y: Option<ClaimCount>,

    pub anti_theft: Option<bool>,
    pub garage_overnight: Option<bool>,
    pub deductible_pct: Option<Deductible>,
    pub addons: Option<BTreeSet<Addon>>,
}

/// Result of folding one turn's candidates into a state.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub state: SlotState,
    /// Slots that received a new value this turn.
    pub applied: Vec<Slot>,
    /// Candidates discarded because they failed validation.
    pub rejected: Vec<ValidationError>,
}

impl SlotState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a slot holds a usable value. Blank text and empty collections count as
    /// missing; zero claims does not.
    pub fn is_filled(&self, slot: Slot) -> bool {
        match slot {
            Slot::VehicleYear => self.vehicle_year.is_some(),
            Slot::VehicleMake => has_text(&self.vehicle_make),
            Slot::VehicleModel => has_text(&self.vehicle_model),
            Slot::VehicleValueUsd => self.vehicle_value_usd.is_some(),
            Slot::Usage => self.usage.is_some(),
            Slot::City => has_text(&self.city),
            Slot::DriverAge => self.driver_age.is_some(),
            Slot::ClaimsLast3y => self.claims_last_3y.is_some(),
            Slot::AntiTheft => self.anti_theft.is_some(),
            Slot::GarageOvernight => self.garage_overnight.is_some(),
            Slot::DeductiblePct => self.deductible_pct.is_some(),
            // "no add-ons" is a real answer for an optional slot
            Slot::Addons => self.addons.is_some(),
        }
    }

    pub fn missing_required(&self) -> Vec<Slot> {
        REQUIRED_SLOTS
            .into_iter()
            .filter(|slot| !self.is_filled(*slot))
            .collect()
    }

    pub fn unknown_optional(&self) -> Vec<Slot> {
        OPTIONAL_SLOTS
            .into_iter()
            .filter(|slot| !self.is_filled(*slot))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        REQUIRED_SLOTS.into_iter().all(|slot| self.is_filled(slot))
    }

    /// Coalesce extracted candidates onto this state.
    ///
    /// A candidate replaces the current value only when it is non-empty and valid. Invalid
    /// candidates are reported in [`MergeOutcome::rejected`] and leave the slot untouched,
    /// so a known value is never cleared.
    pub fn merge(&self, candidates: &SlotCandidates) -> MergeOutcome {
        let mut state = self.clone();
        let mut applied = Vec::new();
        let mut rejected = Vec::new();

        for slot in Slot::all() {
            let Some(raw) = candidates.get(slot) else {
                continue;
            };

            match state.apply(slot, raw) {
                Ok(true) => {
                    debug!(slot = %slot, "Slot updated from extraction");
                    applied.push(slot);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(slot = %slot, error = %err, "Rejected extracted slot value");
                    rejected.push(err);
                }
            }
        }

        MergeOutcome {
            state,
            applied,
            rejected,
        }
    }

    fn apply(&mut self, slot: Slot, raw: &Value) -> Result<bool, ValidationError> {
        let changed = match slot {
            Slot::VehicleYear => {
                let year = candidate_integer(slot, raw)?
                    .map(VehicleYear::try_from)
                    .transpose()?;
                coalesce(&mut self.vehicle_year, year)
            }
            Slot::VehicleMake => coalesce(&mut self.vehicle_make, candidate_text(slot, raw)?),
            Slot::VehicleModel => coalesce(&mut self.vehicle_model, candidate_text(slot, raw)?),
            Slot::VehicleValueUsd => {
                let value = candidate_number(slot, raw)?
                    .map(VehicleValue::try_from)
                    .transpose()?;
                coalesce(&mut self.vehicle_value_usd, value)
            }
            Slot::Usage => {
                let usage = candidate_text(slot, raw)?
                    .map(|text| text.parse::<Usage>())
                    .transpose()?;
                coalesce(&mut self.usage, usage)
            }
            Slot::City => coalesce(&mut self.city, candidate_text(slot, raw)?),
            Slot::DriverAge => {
                let age = candidate_integer(slot, raw)?
                    .map(DriverAge::try_from)
                    .transpose()?;
                coalesce(&mut self.driver_age, age)
            }
            Slot::ClaimsLast3y => {
                let claims = candidate_integer(slot, raw)?
                    .map(ClaimCount::try_from)
                    .transpose()?;
                coalesce(&mut self.claims_last_3y, claims)
            }
            Slot::AntiTheft => coalesce(&mut self.anti_theft, candidate_flag(slot, raw)?),
            Slot::GarageOvernight => {
                coalesce(&mut self.garage_overnight, candidate_flag(slot, raw)?)
            }
            Slot::DeductiblePct => {
                let deductible = candidate_integer(slot, raw)?
                    .map(Deductible::try_from)
                    .transpose()?;
                coalesce(&mut self.deductible_pct, deductible)
            }
            Slot::Addons => match candidate_addons(raw)? {
                Some(addons) if !addons.is_empty() => {
                    self.addons = Some(addons);
                    true
                }
                // an explicit "none" answers the question but never wipes chosen add-ons
                Some(addons) if self.addons.is_none() => {
                    self.addons = Some(addons);
                    true
                }
                _ => false,
            },
        };

        Ok(changed)
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|text| !text.trim().is_empty())
}

fn coalesce<T>(target: &mut Option<T>, candidate: Option<T>) -> bool {
    match candidate {
        Some(value) => {
            *target = Some(value);
            true
        }
        None => false,
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

fn wrong_type(slot: Slot, expected: &'static str, raw: &Value) -> ValidationError {
    ValidationError::WrongType {
        slot,
        expected,
        found: describe(raw),
    }
}

fn candidate_integer(slot: Slot, raw: &Value) -> Result<Option<i64>, ValidationError> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(Some)
            .ok_or_else(|| wrong_type(slot, "an integer", raw)),
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i64>()
                .map(Some)
                .map_err(|_| wrong_type(slot, "an integer", raw))
        }
        _ => Err(wrong_type(slot, "an integer", raw)),
    }
}

fn candidate_number(slot: Slot, raw: &Value) -> Result<Option<f64>, ValidationError> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| wrong_type(slot, "a number", raw)),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned
                .parse::<f64>()
                .map(Some)
                .map_err(|_| wrong_type(slot, "a number", raw))
        }
        _ => Err(wrong_type(slot, "a number", raw)),
    }
}

fn candidate_text(slot: Slot, raw: &Value) -> Result<Option<String>, ValidationError> {
    match raw {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        _ => Err(wrong_type(slot, "text", raw)),
    }
}

fn candidate_flag(slot: Slot, raw: &Value) -> Result<Option<bool>, ValidationError> {
    match raw {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "si" | "sí" => Ok(Some(true)),
            "false" | "no" => Ok(Some(false)),
            _ => Err(wrong_type(slot, "yes or no", raw)),
        },
        _ => Err(wrong_type(slot, "yes or no", raw)),
    }
}

fn candidate_addons(raw: &Value) -> Result<Option<BTreeSet<Addon>>, ValidationError> {
    match raw {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.parse::<Addon>(),
                other => Err(wrong_type(Slot::Addons, "an add-on name", other)),
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Some),
        _ => Err(wrong_type(Slot::Addons, "a list of add-ons", raw)),
    }
}
