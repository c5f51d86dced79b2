//! Reconnection delay policy.

use std::time::Duration;

use crate::error::ConfigError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// `base * multiplier^attempt`, capped at `max_delay`.
    Exponential { multiplier: f64 },
    /// `base` for every attempt.
    Fixed,
}

/// Backoff configuration plus the delay computation.
///
/// The delay is a pure function of the attempt number; nothing accumulates
/// between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub strategy: BackoffStrategy,
    pub base_delay: Duration,
    /// Per-attempt cap for the exponential strategy.
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    pub fn exponential(base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential { multiplier },
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            base_delay: delay,
            max_delay: delay,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `attempt` (0 for the first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential { multiplier } => {
                // Multipliers below 1 would shrink the delay; clamp so the
                // sequence stays non-decreasing.
                let multiplier = if multiplier.is_finite() {
                    multiplier.max(1.0)
                } else {
                    1.0
                };
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let cap_ms = self.max_delay.as_millis() as f64;
                let raw_ms = self.base_delay.as_millis() as f64 * multiplier.powi(exponent);
                let capped = if raw_ms.is_finite() {
                    raw_ms.min(cap_ms)
                } else {
                    cap_ms
                };
                Duration::from_millis(capped as u64)
            }
        }
    }

    /// True once `failures` consecutive failures reach the ceiling.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }

    /// Reject settings the scheduler cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let BackoffStrategy::Exponential { multiplier } = self.strategy {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(ConfigError::InvalidRetrySetting {
                    name: "multiplier",
                    message: format!("must be a finite number >= 1, got {}", multiplier),
                });
            }
            if self.max_delay < self.base_delay {
                return Err(ConfigError::InvalidRetrySetting {
                    name: "max_delay",
                    message: format!(
                        "cap {}ms is below the base delay {}ms",
                        self.max_delay.as_millis(),
                        self.base_delay.as_millis()
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_millis(2000));
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_exponential_sequence() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(16000));
    }

    #[test]
    fn test_exponential_capped_and_monotonic() {
        let policy = BackoffPolicy::default();
        let delays: Vec<Duration> = (0..40).map(|a| policy.delay_for(a)).collect();
        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(policy.delay_for(4), Duration::from_secs(30));
        assert_eq!(policy.delay_for(39), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_fixed_is_constant() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(2000));
        for attempt in [0, 1, 7, 100] {
            assert_eq!(policy.delay_for(attempt), Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_sub_unit_multiplier_clamped() {
        let policy = BackoffPolicy::exponential(
            Duration::from_millis(500),
            0.5,
            Duration::from_secs(10),
        );
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(5), Duration::from_millis(500));
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_ceiling() {
        let policy = BackoffPolicy::default().with_max_attempts(3);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }

    #[test]
    fn test_validate_rejects_cap_below_base() {
        let policy = BackoffPolicy::exponential(
            Duration::from_secs(5),
            2.0,
            Duration::from_secs(1),
        );
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidRetrySetting { name: "max_delay", .. })
        ));
    }
}
