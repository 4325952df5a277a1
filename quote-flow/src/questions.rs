use serde::Serialize;

use crate::slots::{OPTIONAL_SLOTS, REQUIRED_SLOTS, Slot, SlotState};

/// The single clarifying question chosen for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Question {
    pub slot: Slot,
    pub prompt: &'static str,
}

impl Question {
    pub fn is_required(&self) -> bool {
        self.slot.is_required()
    }
}

/// Canonical prompt for each slot.
pub fn prompt_for(slot: Slot) -> &'static str {
    match slot {
        Slot::VehicleYear => "What year is your vehicle?",
        Slot::VehicleMake => "What is the vehicle's **make**? (e.g. Chevrolet, Kia, Toyota)",
        Slot::VehicleModel => "What is the **model**? (e.g. Sail, Rio, Hilux)",
        Slot::VehicleValueUsd => "What is the vehicle's **reference value** in USD?",
        Slot::Usage => "Is the vehicle for **particular** or **commercial** use?",
        Slot::City => "In which **city** is the vehicle mainly driven?",
        Slot::DriverAge => "How **old** is the main driver?",
        Slot::ClaimsLast3y => "How many **claims** have you filed in the last 3 years?",
        Slot::AntiTheft => "Does it have an **alarm/anti-theft** system? (yes/no)",
        Slot::GarageOvernight => "Is it kept in a **garage** overnight? (yes/no)",
        Slot::DeductiblePct => "Which **deductible** do you prefer? (5%, 10%, 15% or 20%)",
        Slot::Addons => {
            "Would you like **roadside assistance**, a **replacement vehicle** or **glass coverage**? (you can say 'none')"
        }
    }
}

/// Picks the next question: the first missing required slot, then the first unknown
/// optional slot, both in declared order. `None` means the state is ready to quote.
pub fn next_question(state: &SlotState) -> Option<Question> {
    REQUIRED_SLOTS
        .into_iter()
        .chain(OPTIONAL_SLOTS)
        .find(|slot| !state.is_filled(*slot))
        .map(|slot| Question {
            slot,
            prompt: prompt_for(slot),
        })
}

/// Prompt text of [`next_question`].
pub fn next_prompt(state: &SlotState) -> Option<&'static str> {
    next_question(state).map(|question| question.prompt)
}
