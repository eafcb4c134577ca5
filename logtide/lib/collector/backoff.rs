use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Per-target exponential backoff with reset on success.
///
/// Each failing target earns a delay that doubles per consecutive failure,
/// starting at the base interval and clamped to the ceiling. One flapping
/// container never slows down its healthy neighbors, and a single success
/// clears the target's history entirely.
#[derive(Debug)]
pub struct BackoffTracker {
    base: Duration,
    ceiling: Duration,
    targets: HashMap<String, TargetState>,
}

#[derive(Debug, Clone, Copy)]
struct TargetState {
    consecutive_failures: u32,
    retry_at: Instant,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BackoffTracker {
    /// Creates a tracker with the given base delay and ceiling.
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling,
            targets: HashMap::new(),
        }
    }

    /// Records a failure for a target and returns the delay now in effect.
    pub fn record_failure(&mut self, key: &str) -> Duration {
        let failures = self
            .targets
            .get(key)
            .map(|target| target.consecutive_failures)
            .unwrap_or(0)
            + 1;

        let delay = self.delay_for(failures);
        self.targets.insert(
            key.to_string(),
            TargetState {
                consecutive_failures: failures,
                retry_at: Instant::now() + delay,
            },
        );

        delay
    }

    /// Clears a target's failure history.
    pub fn record_success(&mut self, key: &str) {
        self.targets.remove(key);
    }

    /// Returns whether a target is still inside its retry delay.
    pub fn blocked(&self, key: &str) -> bool {
        self.targets
            .get(key)
            .map(|target| target.retry_at > Instant::now())
            .unwrap_or(false)
    }

    /// Returns how many consecutive failures a target has accumulated.
    pub fn consecutive_failures(&self, key: &str) -> u32 {
        self.targets
            .get(key)
            .map(|target| target.consecutive_failures)
            .unwrap_or(0)
    }

    fn delay_for(&self, failures: u32) -> Duration {
        // The exponent clamp keeps the multiply in range; the ceiling clamps
        // far earlier for any realistic configuration.
        let exponent = failures.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.ceiling)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_failure_up_to_ceiling() {
        let mut tracker = BackoffTracker::new(Duration::from_secs(10), Duration::from_secs(40));

        assert_eq!(tracker.record_failure("web"), Duration::from_secs(10));
        assert_eq!(tracker.record_failure("web"), Duration::from_secs(20));
        assert_eq!(tracker.record_failure("web"), Duration::from_secs(40));
        assert_eq!(tracker.record_failure("web"), Duration::from_secs(40));
        assert_eq!(tracker.consecutive_failures("web"), 4);
    }

    #[test]
    fn test_success_resets_the_escalation() {
        let mut tracker = BackoffTracker::new(Duration::from_secs(10), Duration::from_secs(300));

        tracker.record_failure("web");
        tracker.record_failure("web");
        tracker.record_success("web");

        assert_eq!(tracker.consecutive_failures("web"), 0);
        assert_eq!(tracker.record_failure("web"), Duration::from_secs(10));
    }

    #[test]
    fn test_targets_are_independent() {
        let mut tracker = BackoffTracker::new(Duration::from_secs(10), Duration::from_secs(300));

        tracker.record_failure("web");
        tracker.record_failure("web");

        assert_eq!(tracker.record_failure("worker"), Duration::from_secs(10));
        assert!(!tracker.blocked("healthy"));
    }

    #[tokio::test]
    async fn test_blocked_until_delay_elapses() {
        let mut tracker = BackoffTracker::new(Duration::from_millis(10), Duration::from_secs(1));

        tracker.record_failure("web");
        assert!(tracker.blocked("web"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!tracker.blocked("web"));
    }
}
