use rand::Rng;
use std::time::Duration;

/// Injectable retry strategy for the annotation pipeline.
///
/// The delay before retry n grows geometrically from `initial_delay` by
/// `multiplier`, capped at `max_delay`, then spread by a random jitter
/// fraction so concurrent retries against the same rate-limited endpoint
/// do not land in lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per image, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Growth factor per subsequent retry (1.0 = fixed delay)
    pub multiplier: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Jitter fraction in [0, 1]; each delay is scaled by a random factor
    /// in [1 - jitter, 1 + jitter]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy without jitter
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            jitter: 0.0,
        }
    }

    /// Undelayed policy, used by tests that exercise attempt counting
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Base delay after `failed_attempt` (1-based) has failed, before jitter
    fn base_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Delay to sleep after `failed_attempt` (1-based), jitter applied
    pub fn delay_before_retry(&self, failed_attempt: u32) -> Duration {
        let base = self.base_delay(failed_attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::rng().random_range(1.0 - self.jitter..=1.0 + self.jitter);
        Duration::from_secs_f64(base.as_secs_f64() * factor.max(0.0))
    }
}
