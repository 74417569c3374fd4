//! Intent classification: mode taxonomy and the router
//!
//! Maps one transcript to one of the fixed action modes via an external
//! text-classification oracle, repairing or discarding whatever that
//! oracle returns.

pub mod json;
mod router;

pub use router::IntentRouter;

/// The action category classified for an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Describe the surroundings through the camera
    Navigation,
    /// Read visible text aloud
    Reading,
    /// Start continuous currency detection
    Currency,
    /// Stop an ongoing activity
    Stop,
    /// Answer a factual question
    Knowledge,
    /// Could not be classified
    Unknown,
}

impl Mode {
    /// Parse the oracle's wire label. Anything outside the fixed label
    /// space coerces to `Unknown`; the oracle's label space is never
    /// trusted.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "navigation_mode" => Mode::Navigation,
            "reading_mode" => Mode::Reading,
            "currency_mode" => Mode::Currency,
            "stop_mode" => Mode::Stop,
            "knowledge_mode" => Mode::Knowledge,
            "unknown" => Mode::Unknown,
            _ => Mode::Unknown,
        }
    }

    /// The wire label used in prompts, events, and logs
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Navigation => "navigation_mode",
            Mode::Reading => "reading_mode",
            Mode::Currency => "currency_mode",
            Mode::Stop => "stop_mode",
            Mode::Knowledge => "knowledge_mode",
            Mode::Unknown => "unknown",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the router learned about one transcript
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Classified action category
    pub mode: Mode,
    /// Oracle confidence, clamped into [0,1]
    pub confidence: f64,
    /// Normalized transcript, what the oracle understood the user meant
    pub cleaned_transcript: String,
    /// Optional disambiguating fragment, e.g. "the sign ahead"
    pub extra_context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for mode in [
            Mode::Navigation,
            Mode::Reading,
            Mode::Currency,
            Mode::Stop,
            Mode::Knowledge,
            Mode::Unknown,
        ] {
            assert_eq!(Mode::from_label(mode.label()), mode);
        }
    }

    #[test]
    fn test_foreign_label_coerced_to_unknown() {
        assert_eq!(Mode::from_label("navigation"), Mode::Unknown);
        assert_eq!(Mode::from_label("CURRENCY_MODE"), Mode::Unknown);
        assert_eq!(Mode::from_label("music_mode"), Mode::Unknown);
        assert_eq!(Mode::from_label(""), Mode::Unknown);
    }

    #[test]
    fn test_label_tolerates_whitespace() {
        assert_eq!(Mode::from_label(" stop_mode "), Mode::Stop);
    }
}
