//! Signaling lock (C3): a single-permit, client-requested semaphore used
//! to serialize multi-step operations (track add + renegotiation) that
//! must not interleave between participants (§4.7).

use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalingLockError {
    #[error("lock timeout")]
    Timeout,
    #[error("already unlocked")]
    AlreadyUnlocked,
}

pub struct SignalingLock {
    semaphore: Semaphore,
    held_since: tokio::sync::Mutex<Option<Instant>>,
}

impl SignalingLock {
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
            held_since: tokio::sync::Mutex::new(None),
        }
    }

    /// Acquires the lock, or returns `Timeout` after `timeout` elapses.
    pub async fn lock(&self, timeout: Duration) -> Result<(), SignalingLockError> {
        match tokio::time::timeout(timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                *self.held_since.lock().await = Some(Instant::now());
                Ok(())
            }
            Ok(Err(_)) => unreachable!("semaphore is never closed"),
            Err(_) => Err(SignalingLockError::Timeout),
        }
    }

    /// Non-blocking acquire attempt; returns whether it succeeded.
    pub async fn try_lock(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                *self.held_since.lock().await = Some(Instant::now());
                true
            }
            Err(_) => false,
        }
    }

    /// Releases the lock, returning how long it was held. Errors if it
    /// wasn't held (§4.7, §7.7 double-unlock is a fatal-class error).
    pub async fn unlock(&self) -> Result<Duration, SignalingLockError> {
        let mut held_since = self.held_since.lock().await;
        let Some(since) = held_since.take() else {
            return Err(SignalingLockError::AlreadyUnlocked);
        };
        self.semaphore.add_permits(1);
        Ok(since.elapsed())
    }
}

impl Default for SignalingLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_timeout_fails_immediately_when_held() {
        let lock = SignalingLock::new();
        assert!(lock.try_lock().await);
        let err = lock.lock(Duration::from_millis(0)).await.unwrap_err();
        assert_eq!(err, SignalingLockError::Timeout);
    }

    #[tokio::test]
    async fn unlock_then_lock_succeeds() {
        let lock = SignalingLock::new();
        assert!(lock.try_lock().await);
        lock.unlock().await.unwrap();
        lock.lock(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn try_lock_succeeds_exactly_once_between_unlocks() {
        let lock = SignalingLock::new();
        assert!(lock.try_lock().await);
        assert!(!lock.try_lock().await);
        lock.unlock().await.unwrap();
        assert!(lock.try_lock().await);
    }

    #[tokio::test]
    async fn double_unlock_errors() {
        let lock = SignalingLock::new();
        assert!(lock.try_lock().await);
        lock.unlock().await.unwrap();
        assert_eq!(lock.unlock().await.unwrap_err(), SignalingLockError::AlreadyUnlocked);
    }

    #[tokio::test]
    async fn waiter_succeeds_when_unlocked_before_deadline() {
        let lock = std::sync::Arc::new(SignalingLock::new());
        assert!(lock.try_lock().await);

        let lock2 = lock.clone();
        let waiter = tokio::spawn(async move { lock2.lock(Duration::from_millis(200)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        lock.unlock().await.unwrap();

        assert!(waiter.await.unwrap().is_ok());
    }
}
