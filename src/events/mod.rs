//! Events emitted while a request moves through the pipeline
//!
//! Every significant orchestrator transition broadcasts one of these so the
//! main loop (and tests) can observe a request without reaching into the
//! state machine.

use serde::{Deserialize, Serialize};

/// Events emitted by the orchestrator during one request cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A new transcript entered the pipeline
    RequestStarted,

    /// The intent router produced a classification
    IntentClassified {
        /// Wire label of the classified mode
        mode: String,
        /// Classifier confidence in [0,1]
        confidence: f64,
    },

    /// Low confidence (or unknown mode): a yes/no question will be asked
    ClarificationAsked {
        /// Wire label of the mode being confirmed
        mode: String,
    },

    /// A handler was selected and invoked
    HandlerDispatched {
        /// Wire label of the dispatched mode
        mode: String,
    },

    /// The handler failed and an apology was substituted
    HandlerFailed {
        /// Wire label of the failing mode
        mode: String,
    },

    /// The request finished its pass through the pipeline
    RequestComplete {
        /// Total time from transcript entry to Done
        duration_ms: u64,
    },
}

impl std::fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineEvent::RequestStarted => write!(f, "REQUEST_STARTED"),
            PipelineEvent::IntentClassified { mode, confidence } => {
                write!(f, "INTENT_CLASSIFIED ({} @ {:.2})", mode, confidence)
            }
            PipelineEvent::ClarificationAsked { mode } => {
                write!(f, "CLARIFICATION_ASKED ({})", mode)
            }
            PipelineEvent::HandlerDispatched { mode } => {
                write!(f, "HANDLER_DISPATCHED ({})", mode)
            }
            PipelineEvent::HandlerFailed { mode } => write!(f, "HANDLER_FAILED ({})", mode),
            PipelineEvent::RequestComplete { duration_ms } => {
                write!(f, "REQUEST_COMPLETE ({}ms)", duration_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::IntentClassified {
            mode: "currency_mode".to_string(),
            confidence: 0.55,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("intent_classified"));
        assert!(json.contains("currency_mode"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"request_started"}"#;
        let event: PipelineEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, PipelineEvent::RequestStarted));
    }
}
