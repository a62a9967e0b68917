//! Automatic restart policy for the speech input engine.

use crate::config::DialogueConfig;
use crate::defaults;
use std::time::Duration;

/// Counts consecutive unexpected input-engine ends and spaces restarts out
/// with exponential backoff.
#[derive(Debug, Clone)]
pub struct InputRecovery {
    attempts: u32,
    max_attempts: u32,
    base: Duration,
    ceiling: Duration,
}

impl InputRecovery {
    pub fn new(max_attempts: u32, base: Duration, ceiling: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base,
            ceiling,
        }
    }

    pub fn from_config(config: &DialogueConfig) -> Self {
        Self::new(
            config.max_input_restarts,
            config.restart_backoff(),
            Duration::from_millis(defaults::MAX_RESTART_BACKOFF_MS),
        )
    }

    /// Register an unexpected end. Returns the delay before the next restart,
    /// or `None` once the cap is exceeded.
    pub fn on_unexpected_end(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let delay = self
            .base
            .saturating_mul(2u32.saturating_pow(self.attempts))
            .min(self.ceiling);
        self.attempts += 1;
        Some(delay)
    }

    /// The engine produced speech; it is healthy again.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
