//! Spinlocks over lock words in the control block
//!
//! Two ways to take a lock:
//! - [`SpinLock::lock`]: bounded compare-and-swap loop with backoff, for the
//!   control thread. Gives up with [`DeckError::Busy`] after
//!   [`SpinPolicy::max_attempts`].
//! - [`SpinLock::try_lock`]: a single attempt. This is the only form the
//!   render thread uses, so it never waits on a lock.
//!
//! Release happens when the [`LockGuard`] is dropped.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};

use super::error::{DeckError, DeckResult};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// Default number of attempts before a control-thread spin reports `Busy`
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1_000_000;

/// Which lock word a spin was contending for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Track length, channel offset and sample store
    Sync,
    /// Drop position and counter writers
    Drop,
    /// Canonical stylus position
    Stylus,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockKind::Sync => "sync",
            LockKind::Drop => "drop",
            LockKind::Stylus => "stylus",
        };
        f.write_str(name)
    }
}

/// Retry budget for control-thread lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinPolicy {
    /// Failed compare-and-swap attempts tolerated before giving up
    pub max_attempts: u32,
}

impl Default for SpinPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SpinPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// A lock word borrowed from the control block
pub struct SpinLock<'a> {
    word: &'a AtomicU32,
    kind: LockKind,
}

impl<'a> SpinLock<'a> {
    pub(crate) fn new(word: &'a AtomicU32, kind: LockKind) -> Self {
        Self { word, kind }
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    /// Whether some thread currently holds the lock (a snapshot only)
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Relaxed) == LOCKED
    }

    /// Single acquisition attempt (render-thread safe)
    #[inline]
    pub fn try_lock(&self) -> Option<LockGuard<'a>> {
        self.word
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| LockGuard {
                word: self.word,
                kind: self.kind,
            })
    }

    /// Bounded spin until the lock is acquired (control thread only)
    pub fn lock(&self, policy: &SpinPolicy) -> DeckResult<LockGuard<'a>> {
        let backoff = Backoff::new();
        let max_attempts = policy.max_attempts.max(1);

        for _ in 0..max_attempts {
            if self
                .word
                .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(LockGuard {
                    word: self.word,
                    kind: self.kind,
                });
            }
            backoff.snooze();
        }

        log::warn!(
            "{} lock still held after {} attempts, giving up",
            self.kind,
            max_attempts
        );
        Err(DeckError::Busy {
            lock: self.kind,
            attempts: max_attempts,
        })
    }
}

/// Held lock; releasing is a `Release` store of the unlocked value
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    word: &'a AtomicU32,
    kind: LockKind,
}

impl LockGuard<'_> {
    pub fn kind(&self) -> LockKind {
        self.kind
    }
}

impl Drop for LockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.word.store(UNLOCKED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_lock_is_exclusive() {
        let word = AtomicU32::new(0);
        let lock = SpinLock::new(&word, LockKind::Sync);

        let guard = lock.try_lock().expect("free lock must be acquired");
        assert!(lock.is_locked());
        assert!(lock.try_lock().is_none());

        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_lock_gives_up_with_busy() {
        let word = AtomicU32::new(0);
        let lock = SpinLock::new(&word, LockKind::Stylus);
        let _held = lock.try_lock().unwrap();

        let err = lock.lock(&SpinPolicy::with_max_attempts(16)).err().unwrap();
        assert_eq!(
            err,
            DeckError::Busy {
                lock: LockKind::Stylus,
                attempts: 16
            }
        );
    }

    #[test]
    fn test_lock_waits_for_short_holder() {
        let word = AtomicU32::new(0);
        let lock = SpinLock::new(&word, LockKind::Drop);
        let held = lock.try_lock().unwrap();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(5));
                drop(held);
            });
            let guard = lock.lock(&SpinPolicy::default());
            assert!(guard.is_ok());
        });
    }

    #[test]
    fn test_guards_serialize_increments() {
        let word = AtomicU32::new(0);
        let counter = AtomicU32::new(0);
        let policy = SpinPolicy::default();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let lock = SpinLock::new(&word, LockKind::Sync);
                    for _ in 0..1000 {
                        let _guard = lock.lock(&policy).unwrap();
                        // Non-atomic read-modify-write made safe by the lock
                        let value = counter.load(Ordering::Relaxed);
                        counter.store(value + 1, Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(counter.load(Ordering::Relaxed), 4000);
    }
}
