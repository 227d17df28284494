use rand::Rng;
use std::time::Duration;

/// Trait for defining reconnection policies
///
/// Implement this trait to control how the session should behave when
/// reconnecting after a disconnection.
pub trait ReconnectPolicy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - The reconnection attempt number (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Exponential backoff with full jitter
///
/// The uncapped delay for attempt `n` is `base * 2^n`, capped at `cap`.
/// The actual delay is drawn uniformly from `[0, capped]`, which spreads
/// reconnecting clients out after a venue-side outage.
#[derive(Debug, Clone)]
pub struct FullJitterBackoff {
    base: Duration,
    cap: Duration,
    max_attempts: Option<usize>,
}

impl FullJitterBackoff {
    /// Create a new full-jitter backoff policy
    ///
    /// # Arguments
    /// * `base` - The delay ceiling for the first attempt
    /// * `cap` - The maximum delay ceiling for any attempt
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(base: Duration, cap: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// The capped exponential ceiling for a given attempt, before jitter
    fn ceiling(&self, attempt: usize) -> Duration {
        let exp = self
            .base
            .as_millis()
            .saturating_mul(1u128 << attempt.min(32)) as u64;
        Duration::from_millis(exp.min(self.cap.as_millis() as u64))
    }
}

impl ReconnectPolicy for FullJitterBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let ceiling = self.ceiling(attempt).as_millis() as u64;
        let jittered = rand::thread_rng().gen_range(0..=ceiling);
        Some(Duration::from_millis(jittered))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Never reconnect policy
///
/// The session will not attempt to reconnect after disconnection
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectPolicy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_delay_stays_under_exponential_ceiling() {
        let policy = FullJitterBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            None,
        );

        for attempt in 0..10 {
            let ceiling = Duration::from_millis(
                (1000u64 << attempt).min(30_000),
            );
            for _ in 0..50 {
                let delay = policy.next_delay(attempt).unwrap();
                assert!(
                    delay <= ceiling,
                    "attempt {attempt}: {delay:?} exceeds {ceiling:?}"
                );
            }
        }
    }

    #[test]
    fn ceiling_saturates_at_cap() {
        let policy = FullJitterBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            None,
        );
        // Large attempt numbers must not overflow the shift
        assert_eq!(policy.ceiling(64), Duration::from_secs(30));
        assert_eq!(policy.ceiling(6), Duration::from_secs(30));
        assert_eq!(policy.ceiling(2), Duration::from_secs(4));
    }

    #[test]
    fn max_attempts_exhausts_policy() {
        let policy = FullJitterBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(5),
            Some(3),
        );
        assert!(policy.next_delay(2).is_some());
        assert!(policy.next_delay(3).is_none());
    }

    #[test]
    fn never_reconnect_yields_no_delay() {
        assert!(NeverReconnect.next_delay(0).is_none());
        assert!(!NeverReconnect.should_reconnect(0));
    }
}
