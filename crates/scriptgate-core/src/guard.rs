//! Process-wide failed-authentication accounting.
//!
//! The guard owns the only shared mutable state on the request path. Once
//! the configured number of failures is reached it invokes its
//! [`LockoutAction`], which in production terminates the whole process
//! without a response for the request that tripped it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};

/// Exit status used when the lockout fires.
pub const LOCKOUT_EXIT_CODE: i32 = 255;

/// How many failed attempts the process tolerates before terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutPolicy {
    Disabled,
    After(u64),
}

impl LockoutPolicy {
    /// Value of the `--sensitive` knob that turns the lockout off.
    pub const DISABLED_SENTINEL: i64 = -1;

    /// Interprets the raw sensitivity value. `-1` disables the lockout,
    /// zero and positive values are thresholds, anything else is invalid.
    pub fn from_sensitivity(value: i64) -> Option<Self> {
        match value {
            Self::DISABLED_SENTINEL => Some(Self::Disabled),
            threshold if threshold >= 0 => Some(Self::After(threshold as u64)),
            _ => None,
        }
    }

    pub fn is_reached(&self, attempts: u64) -> bool {
        match self {
            Self::Disabled => false,
            Self::After(threshold) => attempts >= *threshold,
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::After(1)
    }
}

impl fmt::Display for LockoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::After(threshold) => write!(f, "after {} failed attempt(s)", threshold),
        }
    }
}

/// What happens when the lockout threshold is reached.
pub trait LockoutAction: Send + Sync {
    fn engage(&self, attempts: u64);
}

/// Irreversible self-termination. No destructors run, no response is sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitProcess;

impl LockoutAction for ExitProcess {
    fn engage(&self, attempts: u64) {
        error!(
            attempts,
            exit_code = LOCKOUT_EXIT_CODE,
            "Too many erroneous authentication attempts, terminating process"
        );
        std::process::exit(LOCKOUT_EXIT_CODE);
    }
}

pub struct CredentialGuard {
    failures: AtomicU64,
    policy: LockoutPolicy,
    action: Arc<dyn LockoutAction>,
}

impl fmt::Debug for CredentialGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialGuard")
            .field("failures", &self.attempt_count())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CredentialGuard {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self::with_action(policy, Arc::new(ExitProcess))
    }

    pub fn with_action(policy: LockoutPolicy, action: Arc<dyn LockoutAction>) -> Self {
        Self {
            failures: AtomicU64::new(0),
            policy,
            action,
        }
    }

    /// Counts one failed attempt and engages the lockout synchronously when
    /// the threshold is reached. Returns the updated attempt count, which is
    /// only observable when the configured action does not exit.
    pub fn record_failure(&self) -> u64 {
        let attempts = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(attempts, policy = %self.policy, "Authentication attempt rejected");

        if self.policy.is_reached(attempts) {
            self.action.engage(attempts);
        }

        attempts
    }

    pub fn attempt_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn threshold_exceeded(&self) -> bool {
        self.policy.is_reached(self.attempt_count())
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records engagements instead of exiting.
    #[derive(Default)]
    pub(crate) struct RecordingLockout {
        pub(crate) engaged_at: Mutex<Vec<u64>>,
    }

    impl LockoutAction for RecordingLockout {
        fn engage(&self, attempts: u64) {
            self.engaged_at.lock().unwrap().push(attempts);
        }
    }

    fn guard(policy: LockoutPolicy) -> (CredentialGuard, Arc<RecordingLockout>) {
        let action = Arc::new(RecordingLockout::default());
        (CredentialGuard::with_action(policy, action.clone()), action)
    }

    #[test]
    fn test_sensitivity_parsing() {
        assert_eq!(
            LockoutPolicy::from_sensitivity(-1),
            Some(LockoutPolicy::Disabled)
        );
        assert_eq!(
            LockoutPolicy::from_sensitivity(3),
            Some(LockoutPolicy::After(3))
        );
        assert_eq!(
            LockoutPolicy::from_sensitivity(0),
            Some(LockoutPolicy::After(0))
        );
        assert_eq!(LockoutPolicy::from_sensitivity(-2), None);
        assert_eq!(LockoutPolicy::default(), LockoutPolicy::After(1));
    }

    #[test]
    fn test_lockout_engages_exactly_at_threshold() {
        let (guard, action) = guard(LockoutPolicy::After(3));

        assert_eq!(guard.record_failure(), 1);
        assert_eq!(guard.record_failure(), 2);
        assert!(!guard.threshold_exceeded());
        assert!(action.engaged_at.lock().unwrap().is_empty());

        assert_eq!(guard.record_failure(), 3);
        assert!(guard.threshold_exceeded());
        assert_eq!(*action.engaged_at.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_default_policy_locks_out_on_first_failure() {
        let (guard, action) = guard(LockoutPolicy::default());
        guard.record_failure();
        assert_eq!(*action.engaged_at.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_disabled_policy_never_engages() {
        let (guard, action) = guard(LockoutPolicy::Disabled);
        for _ in 0..500 {
            guard.record_failure();
        }
        assert_eq!(guard.attempt_count(), 500);
        assert!(!guard.threshold_exceeded());
        assert!(action.engaged_at.lock().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let (guard, _action) = guard(LockoutPolicy::Disabled);
        let guard = Arc::new(guard);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        guard.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(guard.attempt_count(), 2000);
    }
}
