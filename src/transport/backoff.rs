//! Reconnect backoff policy.
//!
//! Delay for attempt `n` (0-based):
//!
//! ```text
//! base  = min(initial_delay * multiplier^n, max_delay)
//! delta = base * jitter
//! delay = base + uniform(-delta, +delta)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use portal_realtime::ReconnectConfig;
//!
//! let config = ReconnectConfig::default().with_max_attempts(20);
//! assert_eq!(config.base_delay(1), Duration::from_millis(2000));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Delay before the first reconnect attempt.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on the un-jittered delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Growth factor per attempt.
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Jitter as a fraction of the base delay.
const DEFAULT_JITTER: f64 = 0.10;

// ============================================================================
// ReconnectConfig
// ============================================================================

/// Configuration for auto-reconnect behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Cap on the un-jittered delay.
    pub max_delay: Duration,
    /// Jitter fraction in `[0, 1)`.
    pub jitter: f64,
    /// Stop after this many scheduled attempts (`None` = retry forever).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
            max_attempts: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ReconnectConfig {
    /// Sets the initial delay.
    #[inline]
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the growth factor.
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the delay cap.
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter fraction.
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Caps the number of reconnect attempts.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

// ============================================================================
// Delay Computation
// ============================================================================

impl ReconnectConfig {
    /// Returns the un-jittered delay for `attempt`.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        millis_to_duration(self.base_ms(attempt))
    }

    /// Returns the jittered delay for `attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let unit = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.delay_with_unit(attempt, unit)
    }

    /// Returns the delay for `attempt` with the jitter draw fixed to `unit`
    /// (clamped to `[-1, 1]`).
    #[must_use]
    pub fn delay_with_unit(&self, attempt: u32, unit: f64) -> Duration {
        let base = self.base_ms(attempt);
        let delta = base * self.jitter;
        millis_to_duration(base + delta * unit.clamp(-1.0, 1.0))
    }

    /// Returns `true` once `attempt` reconnects have been scheduled and the
    /// cap forbids another.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }

    fn base_ms(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let initial = self.initial_delay.as_secs_f64() * 1000.0;
        let max = self.max_delay.as_secs_f64() * 1000.0;
        (initial * self.multiplier.powi(exponent)).min(max)
    }
}

/// Converts fractional milliseconds to a duration, rounded to the nanosecond.
fn millis_to_duration(ms: f64) -> Duration {
    Duration::from_nanos((ms.max(0.0) * 1_000_000.0).round() as u64)
}

// ============================================================================
// Validation
// ============================================================================

impl ReconnectConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config(format!(
                "reconnect multiplier must be >= 1, got {}",
                self.multiplier
            )));
        }

        if !(0.0..1.0).contains(&self.jitter) {
            return Err(Error::config(format!(
                "reconnect jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }

        if self.initial_delay > self.max_delay {
            return Err(Error::config(
                "reconnect initial_delay must not exceed max_delay",
            ));
        }

        if self.max_attempts == Some(0) {
            return Err(Error::config(
                "reconnect max_attempts must be at least 1 (use None for unbounded)",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
