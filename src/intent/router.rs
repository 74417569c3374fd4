//! Intent router: oracle invocation, response repair, and fallback
//!
//! The external classifier is treated as untrusted: its label space, its
//! confidence values, and its output framing are all validated or coerced
//! here. Nothing this module does can fail the pipeline; every error path
//! collapses into the `Unknown`/0.0 fallback classification.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::external::IntentClassifier;

use super::json::extract_object;
use super::{Classification, Mode};

/// Instruction set sent to the classification oracle. Names exactly the
/// recognized mode labels and demands a single raw JSON object.
const ROUTING_PROMPT: &str = r#"You are the routing brain of a voice assistant for visually impaired users in India.

User said: "{transcript}"

Pick ONE mode from this list:
- navigation_mode
- reading_mode
- currency_mode
- stop_mode
- knowledge_mode
- unknown

Hints:
- paisa, note, money, currency, kitne ka -> currency_mode
- stop, band karo, ruk jao, thank you, bas -> stop_mode
- read, padho, kya likha hai -> reading_mode
- surroundings, aas paas, bata kya hai, describe, surrounding -> navigation_mode
- news, weather, time, who is, what is, information, update -> knowledge_mode

IMPORTANT: Return ONLY a raw JSON object. No markdown. No code fences. No explanation.
Example: {"mode": "navigation_mode", "confidence": 0.92, "cleaned_text": "describe surroundings", "extra_context": ""}
"#;

/// Classifies transcripts against the external oracle
pub struct IntentRouter {
    oracle: Arc<dyn IntentClassifier>,
}

impl IntentRouter {
    pub fn new(oracle: Arc<dyn IntentClassifier>) -> Self {
        Self { oracle }
    }

    /// Classify one transcript.
    ///
    /// Empty or whitespace-only input short-circuits to the fallback
    /// without invoking the oracle. Oracle errors and unparsable responses
    /// are absorbed here and also produce the fallback; this method never
    /// surfaces an error to the orchestrator.
    pub fn classify(&self, transcript: &str) -> Classification {
        let trimmed = transcript.trim();

        if trimmed.is_empty() {
            warn!("empty transcript, skipping oracle call");
            return Self::fallback(trimmed);
        }

        let prompt = ROUTING_PROMPT.replace("{transcript}", trimmed);

        let raw = match self.oracle.classify_text(&prompt) {
            Ok(raw) => raw,
            Err(e) => {
                error!(?e, "classification oracle call failed");
                return Self::fallback(trimmed);
            }
        };
        debug!(raw = %raw.trim(), "oracle raw output");

        let object = match extract_object(&raw) {
            Ok(object) => object,
            Err(e) => {
                error!(%e, "could not extract JSON from oracle output");
                return Self::fallback(trimmed);
            }
        };

        let classification = Self::validate(trimmed, &object);
        info!(
            mode = %classification.mode,
            confidence = classification.confidence,
            "intent classified"
        );
        classification
    }

    /// Repair the parsed oracle payload into a well-formed classification.
    fn validate(transcript: &str, object: &Value) -> Classification {
        let raw_mode = object
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let mode = Mode::from_label(raw_mode);
        if mode == Mode::Unknown && raw_mode.trim() != "unknown" {
            warn!(label = raw_mode, "unexpected mode label from oracle, coercing to unknown");
        }

        let confidence = parse_confidence(object.get("confidence"));

        let cleaned = object
            .get("cleaned_text")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(transcript)
            .to_string();

        let extra_context = object
            .get("extra_context")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string();

        Classification {
            mode,
            confidence,
            cleaned_transcript: cleaned,
            extra_context,
        }
    }

    /// The deterministic result for silence and for every failure path.
    fn fallback(transcript: &str) -> Classification {
        Classification {
            mode: Mode::Unknown,
            confidence: 0.0,
            cleaned_transcript: transcript.to_string(),
            extra_context: String::new(),
        }
    }
}

/// Coerce the oracle's confidence field via numeric parse: JSON numbers
/// pass through, numeric strings are parsed, anything else defaults to
/// 0.0. The result is clamped into [0,1].
fn parse_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_nan() {
        return 0.0;
    }
    parsed.clamp(0.0, 1.0)
}
