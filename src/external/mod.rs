//! Contracts for the external collaborators the core consumes
//!
//! The daemon does not implement transcription, inference, rendering, or
//! frame capture itself. It talks to all of them through the narrow blocking
//! traits below, so any backend can be wired in at startup. Placeholder
//! console-backed implementations live in [`console`].

pub mod console;

use anyhow::Result;

/// Errors from the speech-to-text collaborator
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("microphone or capture device unavailable")]
    DeviceUnavailable,

    #[error("transcription backend failed: {0}")]
    Backend(String),
}

/// Speech-to-text service. Blocks until one utterance has been captured
/// and transcribed; returns an empty string for silence.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self) -> Result<String, TranscribeError>;
}

/// Text-classification oracle used by the intent router. The response is
/// raw text expected to contain one JSON object, possibly wrapped in code
/// fences or surrounded by prose.
pub trait IntentClassifier: Send + Sync {
    fn classify_text(&self, prompt: &str) -> Result<String>;
}

/// One captured camera frame, already encoded for the vision backend.
#[derive(Debug, Clone)]
pub struct Frame(pub Vec<u8>);

/// Camera frame capture.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<Frame>;
}

/// Vision inference backend used by the scene and reading handlers.
pub trait VisionBackend: Send + Sync {
    fn describe(&self, image: &Frame, prompt: &str) -> Result<String>;
}

/// Question-answering backend used by the knowledge handler.
/// `web_context` may be empty when no search results are available.
pub trait KnowledgeBackend: Send + Sync {
    fn answer(&self, query: &str, web_context: &str) -> Result<String>;
}

/// Best-effort web search. Failures are tolerated by callers; an empty
/// string means "no usable snippets".
pub trait WebSearch: Send + Sync {
    fn search(&self, query: &str) -> Result<String>;
}

/// Text-to-speech rendering. Invoked only from inside the speech gate,
/// never directly by handlers.
pub trait SpeechRenderer: Send + Sync {
    fn render(&self, text: &str) -> Result<()>;
}

/// One detection result from the inference stream.
#[derive(Debug, Clone, Default)]
pub struct DetectionEvent {
    /// Class labels for the detections in this frame, best first
    pub labels: Vec<String>,
}

/// Continuous detection event source consumed by the background worker.
///
/// `next_event` blocks for at most a short internal interval; `Ok(None)`
/// means no detection arrived this tick, which lets the worker recheck its
/// stop flag between polls.
pub trait DetectionStream: Send + Sync {
    fn next_event(&self) -> Result<Option<DetectionEvent>>;
}
