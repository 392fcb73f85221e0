use crate::error::ExecutionError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Optional admission control for simultaneous script executions.
///
/// Unbounded by default. A bounded limiter refuses new executions while
/// every slot is held instead of queueing them.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLimiter {
    slots: Option<(Arc<Semaphore>, usize)>,
}

/// Held for the lifetime of one execution; releases its slot on drop.
#[derive(Debug)]
pub struct ExecutionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ExecutionLimiter {
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self {
            slots: max_concurrent.map(|limit| (Arc::new(Semaphore::new(limit)), limit)),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.slots.as_ref().map(|(_, limit)| *limit)
    }

    pub fn try_acquire(&self) -> Result<ExecutionPermit, ExecutionError> {
        let Some((semaphore, limit)) = &self.slots else {
            return Ok(ExecutionPermit { _permit: None });
        };

        semaphore
            .clone()
            .try_acquire_owned()
            .map(|permit| ExecutionPermit {
                _permit: Some(permit),
            })
            .map_err(|_| ExecutionError::Busy(*limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_always_admits() {
        let limiter = ExecutionLimiter::new(None);
        let permits: Vec<_> = (0..64).map(|_| limiter.try_acquire().unwrap()).collect();
        assert_eq!(permits.len(), 64);
        assert_eq!(limiter.limit(), None);
    }

    #[test]
    fn test_bounded_refuses_when_full_and_recovers() {
        let limiter = ExecutionLimiter::new(Some(2));
        let first = limiter.try_acquire().unwrap();
        let _second = limiter.try_acquire().unwrap();
        assert!(matches!(
            limiter.try_acquire(),
            Err(ExecutionError::Busy(2))
        ));

        assert_eq!(limiter.limit(), Some(2));

        drop(first);
        assert!(limiter.try_acquire().is_ok());
    }
}
