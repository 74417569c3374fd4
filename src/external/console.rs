//! Console-backed placeholder collaborators
//!
//! These let the daemon run end to end with no backend configured: the
//! transcript comes from stdin, speech goes to stdout, and the inference
//! collaborators report themselves unavailable so every request degrades
//! along the documented fallback paths.

use std::io::{BufRead, Write};

use anyhow::{bail, Result};
use tracing::debug;

use super::{
    DetectionEvent, DetectionStream, Frame, FrameSource, IntentClassifier, KnowledgeBackend,
    SpeechRenderer, Transcriber, TranscribeError, VisionBackend, WebSearch,
};

/// Reads one line from stdin per utterance. EOF maps to a device error so
/// the listening loop can shut down instead of spinning on empty input.
pub struct StdinTranscriber;

impl Transcriber for StdinTranscriber {
    fn transcribe(&self) -> Result<String, TranscribeError> {
        let mut line = String::new();
        let stdin = std::io::stdin();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => Err(TranscribeError::DeviceUnavailable),
            Ok(_) => Ok(line.trim().to_string()),
            Err(e) => Err(TranscribeError::Backend(e.to_string())),
        }
    }
}

/// Prints speech output to stdout instead of rendering audio.
pub struct ConsoleRenderer;

impl SpeechRenderer for ConsoleRenderer {
    fn render(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "[speech] {}", text)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Stands in for any collaborator that has not been wired to a backend.
pub struct Unavailable {
    name: &'static str,
}

impl Unavailable {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl IntentClassifier for Unavailable {
    fn classify_text(&self, _prompt: &str) -> Result<String> {
        bail!("{} backend not configured", self.name)
    }
}

impl FrameSource for Unavailable {
    fn capture(&self) -> Result<Frame> {
        bail!("{} backend not configured", self.name)
    }
}

impl VisionBackend for Unavailable {
    fn describe(&self, _image: &Frame, _prompt: &str) -> Result<String> {
        bail!("{} backend not configured", self.name)
    }
}

impl KnowledgeBackend for Unavailable {
    fn answer(&self, _query: &str, _web_context: &str) -> Result<String> {
        bail!("{} backend not configured", self.name)
    }
}

impl WebSearch for Unavailable {
    fn search(&self, _query: &str) -> Result<String> {
        bail!("{} backend not configured", self.name)
    }
}

impl DetectionStream for Unavailable {
    fn next_event(&self) -> Result<Option<DetectionEvent>> {
        // Report an idle tick rather than an error so an unwired worker
        // stays alive and responsive to stop()
        debug!(backend = self.name, "detection stream not configured, idle tick");
        std::thread::sleep(std::time::Duration::from_millis(100));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classifier_errors() {
        let oracle = Unavailable::new("classifier");
        assert!(oracle.classify_text("prompt").is_err());
    }

    #[test]
    fn test_unavailable_stream_yields_idle_ticks() {
        let stream = Unavailable::new("detection");
        let event = stream.next_event().unwrap();
        assert!(event.is_none());
    }
}
