//! Deterministic comparative premium calculator.
//!
//! Each carrier applies the same multiplicative formula with its own bias. The figures are
//! illustrative, not actuarial.

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::slots::{Addon, Deductible, SlotState, Usage};

pub const DISCLAIMER: &str = "Non-binding estimate. Final price subject to inspection, data verification and carrier policies. No intermediaries: you contract directly with the carrier.";

/// Deductible reported on an offer when the customer did not choose one.
pub const DEFAULT_DEDUCTIBLE_PCT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanTier {
    Basic,
    Mid,
    Full,
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanTier::Basic => "Basic",
            PlanTier::Mid => "Mid",
            PlanTier::Full => "Full",
        };
        f.write_str(name)
    }
}

/// A synthetic insurance provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    pub name: &'static str,
    pub bias: f64,
    pub coverage_notes: &'static str,
    /// Suggested as an alternative when glass coverage is requested.
    pub glass_and_assistance_specialist: bool,
}

pub const CARRIERS: [Carrier; 3] = [
    Carrier {
        name: "Aseguradora Andes",
        bias: 0.98,
        coverage_notes: "Full coverage for material damage, liability and theft. Wide network of urban repair shops.",
        glass_and_assistance_specialist: false,
    },
    Carrier {
        name: "Pacífica Seguros",
        bias: 1.02,
        coverage_notes: "Strong on glass coverage and 24/7 roadside assistance. Best service levels on the coast.",
        glass_and_assistance_specialist: true,
    },
    Carrier {
        name: "Equinoccial",
        bias: 1.00,
        coverage_notes: "Good price/benefit balance. Certified repair shops and optional replacement vehicle.",
        glass_and_assistance_specialist: false,
    },
];

/// One carrier's quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub carrier: String,
    pub plan: PlanTier,
    pub annual_premium_usd: f64,
    pub deductible_pct: u8,
    pub addons: Vec<Addon>,
    pub coverage_notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    /// Ascending by premium.
    pub offers: Vec<Offer>,
    pub recommendation: String,
    pub disclaimer: String,
}

/// Everything the formula needs, taken from a complete [`SlotState`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub vehicle_value_usd: f64,
    pub usage: Usage,
    pub city: String,
    pub driver_age: u8,
    pub claims_last_3y: u8,
    pub anti_theft: bool,
    pub garage_overnight: bool,
    pub deductible: Option<Deductible>,
    pub addons: BTreeSet<Addon>,
}

impl QuoteRequest {
    /// `None` while any required slot is missing.
    pub fn from_state(state: &SlotState) -> Option<Self> {
        if !state.is_complete() {
            return None;
        }

        Some(Self {
            vehicle_value_usd: state.vehicle_value_usd?.get(),
            usage: state.usage?,
            city: state.city.clone()?,
            driver_age: state.driver_age?.get(),
            claims_last_3y: state.claims_last_3y?.get(),
            anti_theft: state.anti_theft.unwrap_or(false),
            garage_overnight: state.garage_overnight.unwrap_or(false),
            deductible: state.deductible_pct,
            addons: state.addons.clone().unwrap_or_default(),
        })
    }
}

pub fn base_rate(usage: Usage) -> f64 {
    match usage {
        Usage::Particular => 0.025,
        Usage::Commercial => 0.032,
    }
}

pub fn location_factor(city: &str) -> f64 {
    let city = city.to_lowercase();
    if city.contains("guayaquil") {
        1.12
    } else if city.contains("quito") {
        1.10
    } else if city.contains("cuenca") {
        1.02
    } else {
        0.98
    }
}

pub fn age_factor(age: u8) -> f64 {
    if age < 25 {
        1.20
    } else if age > 60 {
        1.10
    } else {
        1.00
    }
}

pub fn claims_factor(claims: u8) -> f64 {
    match claims {
        0 => 0.90,
        1 => 1.10,
        _ => 1.25,
    }
}

pub fn security_factor(anti_theft: bool, garage_overnight: bool) -> f64 {
    let mut factor = 1.0;
    if anti_theft {
        factor *= 0.95;
    }
    if garage_overnight {
        factor *= 0.95;
    }
    factor
}

pub fn deductible_factor(deductible: Option<Deductible>) -> f64 {
    match deductible {
        None | Some(Deductible::Ten) => 1.00,
        Some(Deductible::Five) => 1.10,
        Some(Deductible::Fifteen) => 0.95,
        Some(Deductible::Twenty) => 0.90,
    }
}

pub fn addon_cost(addon: Addon) -> f64 {
    match addon {
        Addon::RoadsideAssistance => 20.0,
        Addon::ReplacementVehicle => 35.0,
        Addon::GlassCoverage => 15.0,
    }
}

pub fn addons_cost(addons: &BTreeSet<Addon>) -> f64 {
    addons.iter().copied().map(addon_cost).sum()
}

pub fn plan_for_value(value_usd: f64) -> PlanTier {
    if value_usd < 12_000.0 {
        PlanTier::Basic
    } else if value_usd < 25_000.0 {
        PlanTier::Mid
    } else {
        PlanTier::Full
    }
}

/// Rounds the exact binary value of `amount` to cents, ties to even.
fn round_cents(amount: f64) -> f64 {
    Decimal::from_f64_retain(amount)
        .map(|exact| exact.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
        .and_then(|cents| cents.to_f64())
        .unwrap_or(amount)
}

/// Annual premium for one carrier bias, rounded to cents.
pub fn premium(request: &QuoteRequest, carrier_bias: f64) -> f64 {
    let pure = request.vehicle_value_usd * base_rate(request.usage);
    let factors = location_factor(&request.city)
        * age_factor(request.driver_age)
        * claims_factor(request.claims_last_3y)
        * security_factor(request.anti_theft, request.garage_overnight)
        * deductible_factor(request.deductible);
    round_cents(pure * factors * carrier_bias + addons_cost(&request.addons))
}

/// Produces ranked offers for a panel of exactly three carriers.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    carriers: [Carrier; 3],
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(CARRIERS)
    }
}

impl PricingEngine {
    pub fn new(carriers: [Carrier; 3]) -> Self {
        Self { carriers }
    }

    fn offer(&self, carrier: &Carrier, request: &QuoteRequest) -> Offer {
        Offer {
            carrier: carrier.name.to_string(),
            plan: plan_for_value(request.vehicle_value_usd),
            annual_premium_usd: premium(request, carrier.bias),
            deductible_pct: request
                .deductible
                .map(Deductible::percent)
                .unwrap_or(DEFAULT_DEDUCTIBLE_PCT),
            addons: request.addons.iter().copied().collect(),
            coverage_notes: carrier.coverage_notes.to_string(),
        }
    }

    /// Offers sorted ascending by premium. Equal premiums keep carrier declaration order.
    pub fn offers(&self, request: &QuoteRequest) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .carriers
            .iter()
            .map(|carrier| self.offer(carrier, request))
            .collect();
        offers.sort_by(|a, b| a.annual_premium_usd.total_cmp(&b.annual_premium_usd));
        offers
    }

    fn recommend(&self, request: &QuoteRequest, offers: &[Offer]) -> String {
        let best = &offers[0];
        let mut reasons = vec![format!(
            "best estimated price (USD {:.2})",
            best.annual_premium_usd
        )];

        if request.addons.contains(&Addon::GlassCoverage) {
            let specialist = self
                .carriers
                .iter()
                .find(|carrier| carrier.glass_and_assistance_specialist);
            if let Some(specialist) = specialist.filter(|c| c.name != best.carrier) {
                reasons.push(format!(
                    "consider {} if you prioritize glass coverage and 24/7 assistance",
                    specialist.name
                ));
            }
        }

        let alternatives: Vec<&str> = offers[1..]
            .iter()
            .map(|offer| offer.carrier.as_str())
            .collect();

        format!(
            "I recommend **{} - {} plan** for its {}. Alternatives: {}. \
             We can issue the policy online after validating documents and payment.",
            best.carrier,
            best.plan,
            reasons.join(", "),
            alternatives.join(" and ")
        )
    }

    pub fn generate_quote(&self, request: &QuoteRequest) -> QuoteResult {
        let offers = self.offers(request);
        let recommendation = self.recommend(request, &offers);

        let best = &offers[0];
        info!(
            carrier = %best.carrier,
            plan = %best.plan,
            annual_premium_usd = best.annual_premium_usd,
            "Quote generated"
        );

        QuoteResult {
            offers,
            recommendation,
            disclaimer: DISCLAIMER.to_string(),
        }
    }

    /// Quotes a state that must already be complete.
    ///
    /// # Panics
    /// If a required slot is missing. Callers check completeness first.
    pub fn quote_state(&self, state: &SlotState) -> QuoteResult {
        let request = QuoteRequest::from_state(state).unwrap_or_else(|| {
            panic!(
                "pricing requires a complete state, missing {:?}",
                state.missing_required()
            )
        });
        self.generate_quote(&request)
    }
}
