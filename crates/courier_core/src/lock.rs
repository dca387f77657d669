//! Advisory path locks for recipient destinations.
//!
//! # Responsibility
//! - Serialize cooperating writers on one destination path.
//! - Bound the wait so a stuck holder cannot block delivery forever.
//!
//! # Invariants
//! - Locks are owned by the acquiring thread and re-entrant for it.
//! - `clear_locks` releases every lock held by the calling thread.

use crate::config::CourierConfig;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Another owner kept the lock past the bounded wait.
    Timeout { path: String, waited_ms: u128 },
    /// Lock table mutex was poisoned by a panicking holder.
    Poisoned,
}

impl Display for LockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited_ms } => {
                write!(f, "timed out after {waited_ms}ms waiting for lock on `{path}`")
            }
            Self::Poisoned => write!(f, "lock table is poisoned"),
        }
    }
}

impl Error for LockError {}

/// Cooperative path-keyed lock contract.
pub trait LockManager: Send + Sync {
    /// Acquires the lock on `path`, waiting at most the configured timeout.
    fn wait_for_lock(&self, path: &str) -> Result<(), LockError>;
    /// Releases all locks held by the caller.
    fn clear_locks(&self);
}

/// In-process lock manager backed by a mutex-guarded table and a condvar.
pub struct LocalLockManager {
    held: Mutex<HashMap<String, ThreadId>>,
    released: Condvar,
    timeout: Duration,
}

impl LocalLockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    pub fn from_config(config: &CourierConfig) -> Self {
        Self::new(Duration::from_millis(config.lock_timeout_ms))
    }

    /// Paths currently locked by any owner, sorted.
    pub fn held_locks(&self) -> Vec<String> {
        let Ok(held) = self.held.lock() else {
            return Vec::new();
        };
        let mut paths: Vec<String> = held.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl LockManager for LocalLockManager {
    fn wait_for_lock(&self, path: &str) -> Result<(), LockError> {
        let owner = thread::current().id();
        let started = Instant::now();
        let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;

        loop {
            match held.get(path) {
                None => {
                    held.insert(path.to_string(), owner);
                    return Ok(());
                }
                Some(holder) if *holder == owner => return Ok(()),
                Some(_) => {}
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                log::warn!(
                    "event=lock_timeout module=lock status=error waited_ms={}",
                    waited.as_millis()
                );
                return Err(LockError::Timeout {
                    path: path.to_string(),
                    waited_ms: waited.as_millis(),
                });
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, self.timeout - waited)
                .map_err(|_| LockError::Poisoned)?;
            held = guard;
        }
    }

    fn clear_locks(&self) {
        let owner = thread::current().id();
        let Ok(mut held) = self.held.lock() else {
            log::error!("event=lock_clear module=lock status=error reason=poisoned");
            return;
        };
        held.retain(|_, holder| *holder != owner);
        drop(held);
        self.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalLockManager, LockError, LockManager};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn owner_can_reacquire_and_clear() {
        let locks = LocalLockManager::new(Duration::from_millis(50));
        locks.wait_for_lock("/a").unwrap();
        locks.wait_for_lock("/a").unwrap();
        assert_eq!(locks.held_locks(), vec!["/a".to_string()]);
        locks.clear_locks();
        assert!(locks.held_locks().is_empty());
    }

    #[test]
    fn other_thread_times_out_while_lock_is_held() {
        let locks = Arc::new(LocalLockManager::new(Duration::from_millis(30)));
        locks.wait_for_lock("/busy").unwrap();

        let contender = Arc::clone(&locks);
        let result = thread::spawn(move || contender.wait_for_lock("/busy"))
            .join()
            .unwrap();
        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }

    #[test]
    fn waiter_acquires_after_release() {
        let locks = Arc::new(LocalLockManager::new(Duration::from_secs(5)));
        locks.wait_for_lock("/shared").unwrap();

        let contender = Arc::clone(&locks);
        let waiter = thread::spawn(move || {
            let result = contender.wait_for_lock("/shared");
            contender.clear_locks();
            result
        });
        thread::sleep(Duration::from_millis(20));
        locks.clear_locks();

        assert!(waiter.join().unwrap().is_ok());
        assert!(locks.held_locks().is_empty());
    }
}
