use std::fmt::Write;

use crate::pricing::QuoteResult;

pub const WELCOME_MESSAGE: &str = "Hi! I'm your virtual vehicle insurance advisor.

To quote options directly with carriers I need:
• Year, make and model • Value (USD) • Usage (particular/commercial)
• Main city • Driver's age • Claims in the last 3 years

Tell me whatever you have and I'll only ask for what's missing.";

pub const SESSION_EXPIRED_MESSAGE: &str =
    "Your previous session expired. Let's start again, what vehicle details do you have?";

/// Renders a quote as the chat reply: ranked offers, then recommendation and disclaimer.
pub fn format_quote_message(quote: &QuoteResult) -> String {
    let mut message = String::from("Here are your best options (annual, USD):\n");
    for (rank, offer) in quote.offers.iter().enumerate() {
        // writing to a String cannot fail
        let _ = writeln!(
            message,
            "{}) {} - {}: {:.2}",
            rank + 1,
            offer.carrier,
            offer.plan,
            offer.annual_premium_usd
        );
    }
    let _ = write!(message, "\n{}\n\n{}", quote.recommendation, quote.disclaimer);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{DISCLAIMER, Offer, PlanTier};

    fn offer(carrier: &str, premium: f64) -> Offer {
        Offer {
            carrier: carrier.to_string(),
            plan: PlanTier::Mid,
            annual_premium_usd: premium,
            deductible_pct: 10,
            addons: Vec::new(),
            coverage_notes: String::new(),
        }
    }

    #[test]
    fn test_quote_message_layout() {
        let quote = QuoteResult {
            offers: vec![offer("A", 300.5), offer("B", 310.0), offer("C", 320.25)],
            recommendation: "I recommend A.".to_string(),
            disclaimer: DISCLAIMER.to_string(),
        };

        let message = format_quote_message(&quote);
        assert_eq!(
            message,
            format!(
                "Here are your best options (annual, USD):\n1) A - Mid: 300.50\n2) B - Mid: 310.00\n3) C - Mid: 320.25\n\nI recommend A.\n\n{DISCLAIMER}"
            )
        );
    }
}
