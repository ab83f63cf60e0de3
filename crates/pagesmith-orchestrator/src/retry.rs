//! Retry policies as pure functions of `(attempt, elapsed)`
//!
//! Loops that call the network ask a policy what to do after each failed
//! attempt instead of carrying their own arithmetic.

use std::time::Duration;

use pagesmith_config::NotifierConfig;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    RetryAfter(Duration),
    GiveUp,
}

pub trait RetryPolicy {
    /// Decide after `attempt` (1-based) failed, `elapsed` since the first
    /// attempt started.
    fn next(&self, attempt: u32, elapsed: Duration) -> NextStep;
}

/// Capped exponential backoff bounded by a total elapsed-time ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub ceiling: Duration,
}

impl BackoffPolicy {
    #[must_use]
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            multiplier: config.multiplier,
            max_delay: config.max_delay(),
            ceiling: config.ceiling(),
        }
    }

    /// Delay before the attempt following `attempt`, ignoring the ceiling.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let scaled = self.initial_delay.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&NotifierConfig::default())
    }
}

impl RetryPolicy for BackoffPolicy {
    fn next(&self, attempt: u32, elapsed: Duration) -> NextStep {
        let delay = self.delay_after(attempt);
        if elapsed.saturating_add(delay) >= self.ceiling {
            NextStep::GiveUp
        } else {
            NextStep::RetryAfter(delay)
        }
    }
}

/// Immediate retries with a new name, up to a fixed number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionPolicy {
    pub max_attempts: u32,
}

impl CollisionPolicy {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl RetryPolicy for CollisionPolicy {
    fn next(&self, attempt: u32, _elapsed: Duration) -> NextStep {
        if attempt >= self.max_attempts {
            NextStep::GiveUp
        } else {
            NextStep::RetryAfter(Duration::ZERO)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn default_backoff_doubles_from_one_second() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_after(1), secs(1));
        assert_eq!(policy.delay_after(2), secs(2));
        assert_eq!(policy.delay_after(3), secs(4));
        assert_eq!(policy.delay_after(6), secs(32));
        assert_eq!(policy.delay_after(7), secs(60), "capped at max delay");
        assert_eq!(policy.delay_after(500), secs(60));
    }

    #[test]
    fn backoff_gives_up_at_ceiling() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(1, Duration::ZERO), NextStep::RetryAfter(secs(1)));
        assert_eq!(policy.next(10, secs(530)), NextStep::RetryAfter(secs(60)));
        assert_eq!(policy.next(10, secs(540)), NextStep::GiveUp);
        assert_eq!(policy.next(1, secs(600)), NextStep::GiveUp);
    }

    #[test]
    fn multiplier_below_one_does_not_shrink_delays() {
        let policy = BackoffPolicy {
            multiplier: 0.5,
            ..BackoffPolicy::default()
        };
        assert_eq!(policy.delay_after(4), secs(1));
    }

    #[test]
    fn collision_policy_is_bounded() {
        let policy = CollisionPolicy::new(3);
        assert_eq!(policy.next(1, Duration::ZERO), NextStep::RetryAfter(Duration::ZERO));
        assert_eq!(policy.next(2, Duration::ZERO), NextStep::RetryAfter(Duration::ZERO));
        assert_eq!(policy.next(3, Duration::ZERO), NextStep::GiveUp);
    }

    proptest! {
        #[test]
        fn delays_never_decrease_and_never_exceed_cap(
            initial_ms in 1u64..5_000,
            multiplier in 1.0f64..4.0,
            max_ms in 5_000u64..120_000,
            attempt in 1u32..64,
        ) {
            let policy = BackoffPolicy {
                initial_delay: Duration::from_millis(initial_ms),
                multiplier,
                max_delay: Duration::from_millis(max_ms),
                ceiling: secs(600),
            };
            let here = policy.delay_after(attempt);
            let next = policy.delay_after(attempt + 1);
            prop_assert!(next >= here);
            prop_assert!(next <= policy.max_delay);
        }

        #[test]
        fn backoff_never_schedules_past_ceiling(attempt in 1u32..100, elapsed_ms in 0u64..700_000) {
            let policy = BackoffPolicy::default();
            let elapsed = Duration::from_millis(elapsed_ms);
            if let NextStep::RetryAfter(delay) = policy.next(attempt, elapsed) {
                prop_assert!(elapsed + delay < policy.ceiling);
            }
        }
    }
}
