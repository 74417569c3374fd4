//! Confidence policy: act, confirm, or ask
//!
//! Pure zone mapping plus the canned texts for each zone. The only inputs
//! are the two configured thresholds; there are no side effects beyond
//! debug logging.

use tracing::debug;

use crate::config::Config;
use crate::intent::Mode;

/// Confidence bucket governing how the daemon responds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Execute directly, say nothing about confidence
    High,
    /// Execute, but speak a short prefix so the user knows what we understood
    Medium,
    /// Stop and ask one yes/no question before doing anything
    Low,
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Zone::High => write!(f, "high"),
            Zone::Medium => write!(f, "medium"),
            Zone::Low => write!(f, "low"),
        }
    }
}

/// Maps classifier confidence to a zone and supplies the zone texts
#[derive(Debug, Clone)]
pub struct ConfidencePolicy {
    high: f64,
    medium: f64,
}

impl ConfidencePolicy {
    pub fn new(config: &Config) -> Self {
        Self {
            high: config.confidence_high,
            medium: config.confidence_medium,
        }
    }

    /// Map a raw confidence value to its zone.
    pub fn zone(&self, confidence: f64) -> Zone {
        let zone = if confidence >= self.high {
            Zone::High
        } else if confidence >= self.medium {
            Zone::Medium
        } else {
            Zone::Low
        };
        debug!(confidence, %zone, "confidence mapped to zone");
        zone
    }

    /// The single yes/no question asked when confidence is low. Kept short;
    /// the user just needs to say yes or no.
    pub fn clarification_question(&self, mode: Mode) -> &'static str {
        match mode {
            Mode::Navigation => {
                "Did you want me to describe your surroundings? Please say yes or no."
            }
            Mode::Reading => "Did you want me to read something for you? Please say yes or no.",
            Mode::Currency => {
                "Did you want me to identify the currency you are holding? Please say yes or no."
            }
            _ => {
                "I did not understand. Do you want a scene description, text reading, or currency check?"
            }
        }
    }

    /// Short spoken prefix for the medium zone, telling the user what we
    /// think they asked before giving the answer. Empty for modes without
    /// a defined prefix.
    pub fn medium_prefix(&self, mode: Mode) -> &'static str {
        match mode {
            Mode::Navigation => "I think you want a scene description.",
            Mode::Reading => "I think you want me to read something.",
            Mode::Currency => "I think you want to check your currency.",
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ConfidencePolicy {
        ConfidencePolicy::new(&Config::default())
    }

    #[test]
    fn test_zone_boundaries() {
        let p = policy();
        assert_eq!(p.zone(1.0), Zone::High);
        assert_eq!(p.zone(0.75), Zone::High);
        assert_eq!(p.zone(0.7499), Zone::Medium);
        assert_eq!(p.zone(0.50), Zone::Medium);
        assert_eq!(p.zone(0.4999), Zone::Low);
        assert_eq!(p.zone(0.0), Zone::Low);
    }

    #[test]
    fn test_custom_thresholds() {
        let config = Config {
            confidence_high: 0.9,
            confidence_medium: 0.3,
            ..Config::default()
        };
        let p = ConfidencePolicy::new(&config);
        assert_eq!(p.zone(0.85), Zone::Medium);
        assert_eq!(p.zone(0.9), Zone::High);
        assert_eq!(p.zone(0.29), Zone::Low);
    }

    #[test]
    fn test_clarification_questions_keyed_by_mode() {
        let p = policy();
        assert!(p.clarification_question(Mode::Navigation).contains("surroundings"));
        assert!(p.clarification_question(Mode::Reading).contains("read"));
        assert!(p.clarification_question(Mode::Currency).contains("currency"));
        // Modes without a dedicated question share the generic fallback
        let generic = p.clarification_question(Mode::Unknown);
        assert_eq!(p.clarification_question(Mode::Stop), generic);
        assert_eq!(p.clarification_question(Mode::Knowledge), generic);
        assert!(generic.contains("did not understand"));
    }

    #[test]
    fn test_medium_prefix_empty_for_undefined_modes() {
        let p = policy();
        assert!(!p.medium_prefix(Mode::Navigation).is_empty());
        assert!(!p.medium_prefix(Mode::Reading).is_empty());
        assert_eq!(p.medium_prefix(Mode::Currency), "I think you want to check your currency.");
        assert_eq!(p.medium_prefix(Mode::Stop), "");
        assert_eq!(p.medium_prefix(Mode::Knowledge), "");
        assert_eq!(p.medium_prefix(Mode::Unknown), "");
    }
}
