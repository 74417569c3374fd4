//! Speech gate: the single serialization point for all spoken output
//!
//! The foreground pipeline and the background detection worker both speak
//! through here. One process-wide lock guarantees two utterances never
//! overlap; rendering failures fall back to logging the text, since there
//! is no user-facing recovery path once speech itself is broken.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::external::SpeechRenderer;

/// Serializes all text-to-speech rendering across threads
pub struct SpeechGate {
    renderer: Arc<dyn SpeechRenderer>,
    lock: Mutex<()>,
}

impl SpeechGate {
    pub fn new(renderer: Arc<dyn SpeechRenderer>) -> Self {
        Self {
            renderer,
            lock: Mutex::new(()),
        }
    }

    /// Speak `text`, blocking until any in-flight utterance finishes.
    ///
    /// Empty or whitespace-only text is a no-op. A renderer panic poisons
    /// the lock but must not silence the daemon forever, so the guard is
    /// recovered rather than propagated.
    pub fn speak(&self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            warn!("speech gate received empty text, skipping");
            return;
        }

        let preview: String = if trimmed.len() > 70 {
            format!("{}...", truncate(trimmed, 70))
        } else {
            trimmed.to_string()
        };
        info!(text = %preview, "speaking");

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| {
            warn!("speech lock poisoned by a previous panic, recovering");
            poisoned.into_inner()
        });

        if let Err(e) = self.renderer.render(trimmed) {
            // Last-resort fallback: the text still reaches the log
            error!(?e, output = %trimmed, "speech rendering failed");
        }
    }
}

/// Cut at a char boundary at or below `max` bytes.
fn truncate(text: &str, max: usize) -> &str {
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
