//! Push-channel reconnect policy.
//!
//! Pure, deterministic backoff state machine. The transport layer owns the
//! timer and asks the tracker how long to wait before the next attempt.
//! There is no failure budget: the channel keeps retrying until it is torn down.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingError;

// ─── Policy ───────────────────────────────────────────────────────

/// Exponential backoff, capped at `max_delay_ms`. A `multiplier` of 1.0
/// gives a fixed reconnect delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt (default 3000).
    pub initial_delay_ms: u64,
    /// Growth factor per consecutive failure (default 2.0).
    pub multiplier: f64,
    /// Upper bound on any single delay (default 30000).
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            initial_delay_ms: delay_ms,
            multiplier: 1.0,
            max_delay_ms: delay_ms,
        }
    }

    /// Reports the first invalid field.
    pub fn validate(&self) -> Result<(), SettingError> {
        if self.initial_delay_ms == 0 {
            return Err(SettingError::NotPositive("reconnect.initial_delay_ms"));
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(SettingError::ShrinkingBackoff(self.multiplier));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(SettingError::CapBelowInitial);
        }
        Ok(())
    }

    /// Delay for the zero-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = (self.initial_delay_ms as f64) * self.multiplier.powi(exp);
        let ms = if raw.is_finite() {
            (raw as u64).clamp(self.initial_delay_ms, self.max_delay_ms)
        } else {
            self.max_delay_ms
        };
        Duration::from_millis(ms)
    }
}

// ─── Tracker ──────────────────────────────────────────────────────

/// Counts consecutive failures since the last successful open.
#[derive(Debug, Clone)]
pub struct ReconnectTracker {
    policy: ReconnectPolicy,
    consecutive_failures: u32,
}

impl ReconnectTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
        }
    }

    /// Record a failed or ended stream. Returns the delay before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.consecutive_failures);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }

    /// Stream opened; the next failure starts again from the initial delay.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Number of failures since the last success (1-based attempt of the
    /// reconnect currently scheduled).
    pub fn attempt(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let mut tracker = ReconnectTracker::new(ReconnectPolicy::default());
        let delays: Vec<u64> = (0..6)
            .map(|_| tracker.record_failure().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3_000, 6_000, 12_000, 24_000, 30_000, 30_000]);
        assert_eq!(tracker.attempt(), 6);
    }

    #[test]
    fn success_resets_backoff() {
        let mut tracker = ReconnectTracker::new(ReconnectPolicy::default());
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_success();
        assert_eq!(tracker.attempt(), 0);
        assert_eq!(tracker.record_failure(), Duration::from_millis(3_000));
    }

    #[test]
    fn never_terminal() {
        let mut tracker = ReconnectTracker::new(ReconnectPolicy::fixed(500));
        for _ in 0..10_000 {
            assert_eq!(tracker.record_failure(), Duration::from_millis(500));
        }
    }

    #[test]
    fn huge_attempt_stays_at_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(ReconnectPolicy::default().validate().is_ok());
        let shrinking = ReconnectPolicy {
            multiplier: 0.5,
            ..ReconnectPolicy::default()
        };
        assert_eq!(
            shrinking.validate(),
            Err(SettingError::ShrinkingBackoff(0.5))
        );
        let zero = ReconnectPolicy {
            initial_delay_ms: 0,
            ..ReconnectPolicy::default()
        };
        assert_eq!(
            zero.validate(),
            Err(SettingError::NotPositive("reconnect.initial_delay_ms"))
        );
        let nan = ReconnectPolicy {
            multiplier: f64::NAN,
            ..ReconnectPolicy::default()
        };
        assert!(matches!(nan.validate(), Err(SettingError::ShrinkingBackoff(_))));
        let capped_low = ReconnectPolicy {
            max_delay_ms: 1_000,
            ..ReconnectPolicy::default()
        };
        assert_eq!(capped_low.validate(), Err(SettingError::CapBelowInitial));
    }

    #[test]
    fn policy_deserializes_partial_toml_shape() {
        let policy: ReconnectPolicy =
            serde_json::from_str(r#"{"initial_delay_ms": 1000}"#).expect("parse");
        assert_eq!(policy.initial_delay_ms, 1_000);
        assert_eq!(policy.max_delay_ms, 30_000);
    }
}
