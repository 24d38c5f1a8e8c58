//! Directory replication wait.
//!
//! Role assignments need the principal to be visible in the directory, and
//! replication is eventually consistent. The wait is best effort: after the
//! attempt budget it logs a warning and the caller proceeds anyway, because
//! downstream role assignment may still succeed (or fail on its own terms).

use crate::azure::{LookupOutcome, PrincipalLookup};
use crate::config::{LOOKUP_BASE_DELAY_SECS, MAX_LOOKUP_ATTEMPTS};
use colored::Colorize;
use std::time::Duration;

/// Lookup schedule: no wait before the first attempt, then the base delay
/// doubling before each further attempt.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            max_attempts: MAX_LOOKUP_ATTEMPTS,
            base_delay: Duration::from_secs(LOOKUP_BASE_DELAY_SECS),
        }
    }
}

/// Delay to sleep before the given 1-based attempt, if any.
pub fn delay_before(policy: &BackoffPolicy, attempt: u32) -> Option<Duration> {
    if attempt <= 1 {
        None
    } else {
        Some(policy.base_delay * 2u32.pow(attempt - 2))
    }
}

/// How the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationWait {
    /// The principal resolved on the given attempt.
    Visible { attempts: u32 },
    /// Budget exhausted without the principal resolving.
    GaveUp { attempts: u32 },
}

/// Wait for a principal to become visible in the directory.
///
/// Returns immediately on the first successful lookup. Lookup errors are
/// logged and count like not-yet-visible. Never returns an error: giving up
/// is an outcome, not a failure.
pub async fn wait_for_replication(
    directory: &dyn PrincipalLookup,
    object_id: &str,
    policy: &BackoffPolicy,
) -> ReplicationWait {
    for attempt in 1..=policy.max_attempts {
        if let Some(delay) = delay_before(policy, attempt) {
            log::debug!(
                "Waiting {}s before directory lookup attempt {attempt}",
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;
        }

        match directory.principal_visible(object_id).await {
            Ok(LookupOutcome::Found) => {
                log::info!("Principal {object_id} visible after {attempt} lookup(s)");
                return ReplicationWait::Visible { attempts: attempt };
            }
            Ok(LookupOutcome::NotFound) => {
                log::info!(
                    "Principal {object_id} not visible yet (attempt {attempt}/{max})",
                    max = policy.max_attempts
                );
            }
            Err(e) => {
                log::warn!("Directory lookup attempt {attempt} failed: {e}");
            }
        }
    }

    log::warn!(
        "{giving_up}: principal {object_id} not visible after {max} attempts, proceeding anyway",
        giving_up = "Giving up".on_red(),
        max = policy.max_attempts
    );
    ReplicationWait::GaveUp {
        attempts: policy.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::Cell;
    use std::error::Error;

    /// Reports the principal visible from the n-th lookup onward (never, if 0).
    struct VisibleFromAttempt {
        visible_from: u32,
        calls: Cell<u32>,
    }

    impl VisibleFromAttempt {
        fn new(visible_from: u32) -> Self {
            VisibleFromAttempt {
                visible_from,
                calls: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl PrincipalLookup for VisibleFromAttempt {
        async fn principal_visible(
            &self,
            _object_id: &str,
        ) -> Result<LookupOutcome, Box<dyn Error>> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.visible_from > 0 && call >= self.visible_from {
                Ok(LookupOutcome::Found)
            } else {
                Ok(LookupOutcome::NotFound)
            }
        }
    }

    /// Every lookup fails at the transport level.
    struct AlwaysErrors {
        calls: Cell<u32>,
    }

    #[async_trait(?Send)]
    impl PrincipalLookup for AlwaysErrors {
        async fn principal_visible(
            &self,
            _object_id: &str,
        ) -> Result<LookupOutcome, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            Err("connection reset".into())
        }
    }

    fn instant_policy() -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: MAX_LOOKUP_ATTEMPTS,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_schedule_is_8_16_32() {
        let policy = BackoffPolicy::default();
        assert_eq!(delay_before(&policy, 1), None);
        assert_eq!(delay_before(&policy, 2), Some(Duration::from_secs(8)));
        assert_eq!(delay_before(&policy, 3), Some(Duration::from_secs(16)));
        assert_eq!(delay_before(&policy, 4), Some(Duration::from_secs(32)));
    }

    #[test]
    fn test_worst_case_total_wait_is_56s() {
        let policy = BackoffPolicy::default();
        let total: Duration = (1..=policy.max_attempts)
            .filter_map(|attempt| delay_before(&policy, attempt))
            .sum();
        assert_eq!(total, Duration::from_secs(56));
    }

    #[tokio::test]
    async fn test_immediate_visibility_does_one_lookup() {
        let directory = VisibleFromAttempt::new(1);
        let outcome = wait_for_replication(&directory, "obj-1", &instant_policy()).await;
        assert_eq!(outcome, ReplicationWait::Visible { attempts: 1 });
        assert_eq!(directory.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_success_on_attempt_k_stops_there() {
        for k in 2..=4 {
            let directory = VisibleFromAttempt::new(k);
            let outcome = wait_for_replication(&directory, "obj-1", &instant_policy()).await;
            assert_eq!(outcome, ReplicationWait::Visible { attempts: k });
            assert_eq!(directory.calls.get(), k, "no extra lookups after success");
        }
    }

    #[tokio::test]
    async fn test_exhaustion_gives_up_without_error() {
        let directory = VisibleFromAttempt::new(0);
        let outcome = wait_for_replication(&directory, "obj-1", &instant_policy()).await;
        assert_eq!(outcome, ReplicationWait::GaveUp { attempts: 4 });
        assert_eq!(directory.calls.get(), 4);
    }

    #[tokio::test]
    async fn test_lookup_errors_count_as_attempts() {
        let directory = AlwaysErrors {
            calls: Cell::new(0),
        };
        let outcome = wait_for_replication(&directory, "obj-1", &instant_policy()).await;
        assert_eq!(outcome, ReplicationWait::GaveUp { attempts: 4 });
        assert_eq!(directory.calls.get(), 4);
    }
}
