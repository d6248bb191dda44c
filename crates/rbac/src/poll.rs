//! Bounded polling of eventually consistent resources
//!
//! Every mutating control-plane call returns before the resource is usable.
//! [`StatePoller`] re-evaluates a status predicate at a fixed interval until
//! it holds, the attempt budget runs out, the predicate fails, or the caller
//! cancels.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::core::{ElastiCacheError, Operation, RemoteError, ResourceId, ResourceKind, Result};

/// Default number of status checks
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Default pause between status checks
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Attempt budget and pacing for a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Maximum number of predicate evaluations
    pub max_attempts: u32,
    /// Pause between evaluations that came back `false`
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// How a poll loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate returned `true`
    Satisfied,
    /// Every attempt returned `false`
    Exhausted {
        /// Attempts performed
        attempts: u32,
    },
    /// The predicate failed; no further attempts were made
    Aborted(RemoteError),
    /// The cancellation token fired
    Cancelled,
}

impl PollOutcome {
    /// Whether the awaited condition was reached
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// Map a failed wait on `id` into the lifecycle error taxonomy.
    ///
    /// `operation` labels cancellation; aborted predicates are reported
    /// against the describe call for `kind`.
    pub fn into_result(
        self,
        kind: ResourceKind,
        id: &ResourceId,
        operation: Operation,
    ) -> Result<()> {
        match self {
            Self::Satisfied => Ok(()),
            Self::Exhausted { attempts } => Err(ElastiCacheError::NeverActive {
                kind,
                id: id.to_string(),
                attempts,
            }),
            Self::Aborted(source) => Err(ElastiCacheError::remote(
                describe_operation(kind),
                id.as_str(),
                source,
            )),
            Self::Cancelled => Err(ElastiCacheError::Cancelled {
                operation,
                id: id.to_string(),
            }),
        }
    }
}

fn describe_operation(kind: ResourceKind) -> Operation {
    match kind {
        ResourceKind::User => Operation::DescribeUsers,
        ResourceKind::UserGroup => Operation::DescribeUserGroups,
        ResourceKind::ReplicationGroup => Operation::DescribeReplicationGroups,
    }
}

/// Re-evaluates a remote predicate under a [`PollPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StatePoller {
    policy: PollPolicy,
}

impl StatePoller {
    /// Create a poller with the given policy
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// Active policy
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Evaluate `predicate` until it returns `Ok(true)`.
    ///
    /// `Err` from the predicate stops the loop at once. There is no pause
    /// after the final attempt, and a cancelled token interrupts the pause.
    pub async fn await_condition<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut predicate: F,
    ) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<bool, RemoteError>>,
    {
        let max_attempts = self.policy.max_attempts;
        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            match predicate().await {
                Ok(true) => return PollOutcome::Satisfied,
                Ok(false) => trace!(attempt, max_attempts, "condition not met yet"),
                Err(error) => return PollOutcome::Aborted(error),
            }

            if attempt < max_attempts && !self.wait_with_cancellation(cancel).await {
                return PollOutcome::Cancelled;
            }
        }

        PollOutcome::Exhausted {
            attempts: max_attempts,
        }
    }

    /// Sleep one interval; `false` if cancelled first.
    async fn wait_with_cancellation(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            () = tokio::time::sleep(self.policy.interval) => true,
            () = cancel.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn counting_predicate(
        calls: &Arc<AtomicU32>,
        ready_on: u32,
    ) -> impl FnMut() -> std::future::Ready<std::result::Result<bool, RemoteError>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(n >= ready_on))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let outcome = StatePoller::default()
            .await_condition(&CancellationToken::new(), counting_predicate(&calls, 1))
            .await;

        assert!(outcome.is_satisfied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_after_a_few_intervals() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let outcome = StatePoller::default()
            .await_condition(&CancellationToken::new(), counting_predicate(&calls, 4))
            .await;

        assert_eq!(outcome, PollOutcome::Satisfied);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_trailing_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let outcome = StatePoller::default()
            .await_condition(&CancellationToken::new(), counting_predicate(&calls, u32::MAX))
            .await;

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 50 });
        assert_eq!(calls.load(Ordering::SeqCst), 50);
        assert_eq!(started.elapsed(), Duration::from_secs(49 * 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_aborts_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let outcome = StatePoller::default()
            .await_condition(&CancellationToken::new(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(RemoteError::new(ErrorCode::Throttling, "slow down")))
            })
            .await;

        assert!(!outcome.is_satisfied());
        assert!(matches!(outcome, PollOutcome::Aborted(ref e) if e.code == ErrorCode::Throttling));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });
        let started = Instant::now();

        let outcome = StatePoller::default()
            .await_condition(&cancel, counting_predicate(&calls, u32::MAX))
            .await;

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = StatePoller::default()
            .await_condition(&cancel, counting_predicate(&calls, 1))
            .await;

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = StatePoller::new(PollPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(10),
        });
        let started = Instant::now();

        let outcome = poller
            .await_condition(&CancellationToken::new(), counting_predicate(&calls, u32::MAX))
            .await;

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 3 });
        assert_eq!(started.elapsed(), Duration::from_millis(20));
    }

    #[test]
    fn test_outcome_mapping() {
        let id = ResourceId::normalize("cluster");

        let err = PollOutcome::Exhausted { attempts: 50 }
            .into_result(ResourceKind::UserGroup, &id, Operation::CreateUserGroup)
            .unwrap_err();
        assert!(err.is_timeout());

        let err = PollOutcome::Aborted(RemoteError::new(ErrorCode::Throttling, "slow down"))
            .into_result(ResourceKind::User, &id, Operation::CreateUser)
            .unwrap_err();
        assert!(matches!(
            err,
            ElastiCacheError::Remote { operation: Operation::DescribeUsers, .. }
        ));

        let err = PollOutcome::Cancelled
            .into_result(ResourceKind::User, &id, Operation::DeleteUser)
            .unwrap_err();
        assert_eq!(err.to_string(), "delete-user cancelled while waiting on 'cluster'");

        assert!(
            PollOutcome::Satisfied
                .into_result(ResourceKind::User, &id, Operation::ModifyUser)
                .is_ok()
        );
    }
}
