//! Boundary to the free-text slot extractor.
//!
//! The extractor is an external collaborator (usually an LLM). Its output is a sparse,
//! untyped map from slot name to candidate value; nothing in it is trusted until
//! [`SlotState::merge`](crate::slots::SlotState::merge) validates it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    error::{QuoteFlowError, Result},
    slots::Slot,
};

/// Sparse slot name to candidate value map produced by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotCandidates(Map<String, Value>);

impl SlotCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds candidates from a decoded JSON document. Anything but an object is malformed.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(QuoteFlowError::ExtractionFailed(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    pub fn with(mut self, slot: Slot, value: impl Into<Value>) -> Self {
        self.insert(slot, value);
        self
    }

    pub fn insert(&mut self, slot: Slot, value: impl Into<Value>) {
        self.0.insert(slot.name().to_string(), value.into());
    }

    /// Candidate for a slot. Explicit nulls read as absent.
    pub fn get(&self, slot: Slot) -> Option<&Value> {
        self.0.get(slot.name()).filter(|value| !value.is_null())
    }

    /// Number of slots with a non-null candidate.
    pub fn len(&self) -> usize {
        Slot::all().filter(|slot| self.get(*slot).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// External capability that turns one user utterance into slot candidates.
#[async_trait]
pub trait SlotExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<SlotCandidates>;
}

/// Runs the extractor once. Any failure degrades to "nothing extracted".
pub async fn extract_or_empty(extractor: &dyn SlotExtractor, text: &str) -> SlotCandidates {
    match extractor.extract(text).await {
        Ok(candidates) => {
            debug!(candidates = candidates.len(), "Extraction completed");
            candidates
        }
        Err(e) => {
            warn!(error = %e, "Extraction failed, continuing with no extracted slots");
            SlotCandidates::new()
        }
    }
}

/// Extractor that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExtractor;

#[async_trait]
impl SlotExtractor for NoopExtractor {
    async fn extract(&self, _text: &str) -> Result<SlotCandidates> {
        Ok(SlotCandidates::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingExtractor;

    #[async_trait]
    impl SlotExtractor for FailingExtractor {
        async fn extract(&self, _text: &str) -> Result<SlotCandidates> {
            Err(QuoteFlowError::ExtractionFailed("upstream timeout".to_string()))
        }
    }

    #[test]
    fn test_from_json_requires_object() {
        let candidates = SlotCandidates::from_json(json!({
            "vehicle_year": 2018,
            "city": null,
            "unrelated": "ignored"
        }))
        .unwrap();
        assert_eq!(candidates.get(Slot::VehicleYear), Some(&json!(2018)));
        assert_eq!(candidates.get(Slot::City), None);
        assert_eq!(candidates.len(), 1);

        assert!(SlotCandidates::from_json(json!(["vehicle_year"])).is_err());
        assert!(SlotCandidates::from_json(json!("2018")).is_err());
    }

    #[tokio::test]
    async fn test_failure_degrades_to_empty() {
        let candidates = extract_or_empty(&FailingExtractor, "Kia Rio 2018").await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_noop_extractor() {
        let candidates = extract_or_empty(&NoopExtractor, "hola").await;
        assert_eq!(candidates, SlotCandidates::new());
    }
}
