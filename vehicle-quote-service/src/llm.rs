use std::sync::LazyLock;

use async_trait::async_trait;
use quote_flow::{QuoteFlowError, SlotCandidates, SlotExtractor};
use regex::Regex;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    providers::openrouter,
};
use serde_json::Value;
use tracing::{debug, info};

const SLOT_EXTRACTION_PROMPT: &str = r#"
You are a STRICT data extractor for vehicle insurance pre-quotes.
ALWAYS return JSON with EXACTLY this schema (no additional text):

{
  "vehicle_year": int|null,
  "vehicle_make": string|null,
  "vehicle_model": string|null,
  "vehicle_value_usd": float|null,
  "usage": "particular"|"commercial"|null,
  "city": string|null,
  "driver_age": int|null,
  "claims_last_3y": int|null,
  "anti_theft": true|false|null,
  "garage_overnight": true|false|null,
  "deductible_pct": 5|10|15|20|null,
  "addons": ["roadside_assistance"|"replacement_vehicle"|"glass_coverage"]|null
}

- Use null when you are not sure.
- "vehicle_value_usd" in dollars; if unclear, null.
- Map synonyms: roadside_assistance~tow truck~grúa~asistencia vial; replacement_vehicle~substitute car~auto de reemplazo; glass_coverage~windshield~lunas~vidrios.
- If the user explicitly declines add-ons ("none", "ninguno"), return "addons": [].
- Do NOT explain, do NOT comment, do NOT invent. ONLY JSON.

Example
User:
Kia Rio 2018, uso particular, Guayaquil, vale 12 mil dólares. Conductor 28 años, sin siniestros. Deducible 10%, quiero asistencia vial.
JSON:
{"vehicle_year": 2018, "vehicle_make": "Kia", "vehicle_model": "Rio", "vehicle_value_usd": 12000.0, "usage": "particular", "city": "Guayaquil", "driver_age": 28, "claims_last_3y": 0, "anti_theft": null, "garage_overnight": null, "deductible_pct": 10, "addons": ["roadside_assistance"]}

Example
User:
Trabajo con una Hilux 2021 en Quito. Vale 28k, tiene alarma y duerme en garaje. Tengo 45 y un choque hace dos años.
JSON:
{"vehicle_year": 2021, "vehicle_make": "Toyota", "vehicle_model": "Hilux", "vehicle_value_usd": 28000.0, "usage": "commercial", "city": "Quito", "driver_age": 45, "claims_last_3y": 1, "anti_theft": true, "garage_overnight": true, "deductible_pct": null, "addons": null}
"#;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("code fence pattern is valid")
});

pub fn get_llm_agent(
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Agent<openrouter::CompletionModel> {
    let client = openrouter::Client::new(api_key);
    client.agent(model).preamble(prompt).temperature(0.0).build()
}

/// Removes a surrounding markdown code fence, if the model added one
fn strip_code_fence(response: &str) -> &str {
    CODE_FENCE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map_or(response.trim(), |m| m.as_str())
}

/// Parses the model's reply into slot candidates
pub fn parse_candidates(response: &str) -> quote_flow::Result<SlotCandidates> {
    let json = strip_code_fence(response);
    let value: Value = serde_json::from_str(json)?;
    SlotCandidates::from_json(value)
}

/// Slot extractor backed by an OpenRouter chat model
pub struct LlmSlotExtractor {
    agent: Agent<openrouter::CompletionModel>,
}

impl LlmSlotExtractor {
    pub fn new(api_key: &str, model: &str) -> Self {
        info!(model = %model, "Creating LLM slot extractor");
        Self {
            agent: get_llm_agent(api_key, model, SLOT_EXTRACTION_PROMPT),
        }
    }
}

#[async_trait]
impl SlotExtractor for LlmSlotExtractor {
    async fn extract(&self, text: &str) -> quote_flow::Result<SlotCandidates> {
        let prompt = format!("User:\n{text}\nJSON:");
        let response = self
            .agent
            .prompt(prompt)
            .await
            .map_err(|e| QuoteFlowError::ExtractionFailed(e.to_string()))?;

        debug!(response_length = response.len(), "Extractor replied");
        parse_candidates(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_flow::Slot;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let candidates =
            parse_candidates(r#"{"vehicle_year": 2018, "city": "Quito", "addons": null}"#).unwrap();
        assert_eq!(candidates.get(Slot::VehicleYear), Some(&json!(2018)));
        assert_eq!(candidates.get(Slot::City), Some(&json!("Quito")));
        assert_eq!(candidates.get(Slot::Addons), None);
    }

    #[test]
    fn test_parse_fenced_json() {
        let response = "```json\n{\"deductible_pct\": 15}\n```";
        let candidates = parse_candidates(response).unwrap();
        assert_eq!(candidates.get(Slot::DeductiblePct), Some(&json!(15)));

        let response = "```\n{\"usage\": \"commercial\"}\n```\n";
        let candidates = parse_candidates(response).unwrap();
        assert_eq!(candidates.get(Slot::Usage), Some(&json!("commercial")));
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_candidates("Sure! The car is a 2018 Kia."),
            Err(QuoteFlowError::SerializationError(_))
        ));
        assert!(matches!(
            parse_candidates("[2018]"),
            Err(QuoteFlowError::ExtractionFailed(_))
        ));
    }

    /// Live call against OpenRouter
    /// Usage: OPENROUTER_API_KEY=key cargo test test_live_extraction
    #[tokio::test]
    async fn test_live_extraction() -> anyhow::Result<()> {
        let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") else {
            println!("Skipping test - set OPENROUTER_API_KEY environment variable");
            return Ok(());
        };

        let extractor = LlmSlotExtractor::new(&api_key, "openai/gpt-4o-mini");
        let candidates = extractor
            .extract("Tengo un Chevrolet Sail 2019 en Cuenca, vale 9000 dólares")
            .await?;
        println!("Extracted: {:?}", candidates);
        assert!(candidates.get(Slot::VehicleYear).is_some());
        Ok(())
    }
}
