//! Configuration loading and management

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Confidence at or above this acts directly, no confirmation
    pub confidence_high: f64,

    /// Confidence at or above this acts but speaks a short prefix first;
    /// below it the daemon asks one yes/no question instead
    pub confidence_medium: f64,

    /// Minimum gap between two detection announcements on the same stream
    pub announce_cooldown: Duration,

    /// How long `stop()` waits for the detection worker to acknowledge exit
    pub worker_stop_timeout: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let confidence_high = env_f64("SAATHI_CONFIDENCE_HIGH", 0.75)?;
        let confidence_medium = env_f64("SAATHI_CONFIDENCE_MEDIUM", 0.50)?;
        let announce_cooldown =
            Duration::from_secs_f64(env_f64("SAATHI_ANNOUNCE_COOLDOWN_SECS", 3.0)?.max(0.0));
        let worker_stop_timeout =
            Duration::from_secs_f64(env_f64("SAATHI_WORKER_STOP_TIMEOUT_SECS", 2.0)?.max(0.0));

        let config = Self {
            confidence_high,
            confidence_medium,
            announce_cooldown,
            worker_stop_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check threshold ordering: 0 < MEDIUM < HIGH < 1
    fn validate(&self) -> Result<()> {
        if !(0.0 < self.confidence_medium && self.confidence_medium < 1.0) {
            bail!(
                "SAATHI_CONFIDENCE_MEDIUM must be in (0,1), got {}",
                self.confidence_medium
            );
        }
        if !(0.0 < self.confidence_high && self.confidence_high < 1.0) {
            bail!(
                "SAATHI_CONFIDENCE_HIGH must be in (0,1), got {}",
                self.confidence_high
            );
        }
        if self.confidence_high <= self.confidence_medium {
            bail!(
                "SAATHI_CONFIDENCE_HIGH ({}) must be greater than SAATHI_CONFIDENCE_MEDIUM ({})",
                self.confidence_high,
                self.confidence_medium
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confidence_high: 0.75,
            confidence_medium: 0.50,
            announce_cooldown: Duration::from_secs(3),
            worker_stop_timeout: Duration::from_secs(2),
        }
    }
}

fn env_f64(name: &str, default: f64) -> Result<f64> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("{} is not a number: {:?}", name, value)),
        Err(_) => Ok(default),
    }
}
