//! Container-scoped locks guarding in-place mutation of declarations.
//!
//! Every mutation of a declaration payload happens while holding the lock of
//! its container: the declaration itself for files and classes, otherwise
//! the innermost enclosing one. Locks are re-entrant, so a call chain that
//! already holds a container lock may take it again.
//!
//! The resolvers never hold two different container locks at once. All
//! dependency resolution happens before a lock is taken, and a transform
//! only reads other declarations through their published facts.

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::hir::DeclId;
use super::error::{ResolveError, ResolveResult};

type ContainerLock = Arc<ReentrantMutex<()>>;

#[derive(Debug, Default)]
pub struct LockProvider {
    locks: Mutex<FxHashMap<DeclId, ContainerLock>>,
}

impl LockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: DeclId) -> ContainerLock {
        self.locks.lock().entry(key).or_default().clone()
    }

    /// Run `body` while holding the lock of `key`.
    ///
    /// The lock is released when `body` returns or unwinds.
    pub fn with_lock<R>(&self, key: DeclId, body: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        trace!(container = %key, "container lock acquired");
        body()
    }

    /// Like [`LockProvider::with_lock`], checking `token` before waiting and
    /// again once the lock is held.
    pub fn with_lock_checked<R>(
        &self,
        key: DeclId,
        token: &CancellationToken,
        body: impl FnOnce() -> ResolveResult<R>,
    ) -> ResolveResult<R> {
        if token.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        trace!(container = %key, "container lock acquired");
        if token.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        body()
    }

    /// Run `body` only if the lock of `key` is free or already held by this
    /// thread.
    pub fn try_with_lock<R>(&self, key: DeclId, body: impl FnOnce() -> R) -> Option<R> {
        let lock = self.lock_for(key);
        let _guard = lock.try_lock()?;
        Some(body())
    }

    /// Whether some thread currently holds the lock of `key`.
    pub fn is_locked(&self, key: DeclId) -> bool {
        self.locks
            .lock()
            .get(&key)
            .is_some_and(|lock| lock.is_locked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_reentrant_on_same_thread() {
        let locks = LockProvider::new();
        let key = DeclId::new(1);

        let depth = locks.with_lock(key, || locks.with_lock(key, || locks.with_lock(key, || 3)));

        assert_eq!(depth, 3);
        assert!(!locks.is_locked(key));
    }

    #[test]
    fn test_released_on_unwind() {
        let locks = Arc::new(LockProvider::new());
        let key = DeclId::new(1);

        let panicking = Arc::clone(&locks);
        let result = thread::spawn(move || {
            panicking.with_lock(key, || panic!("transform blew up"));
        })
        .join();

        assert!(result.is_err());
        assert!(!locks.is_locked(key));
    }

    #[test]
    fn test_same_container_serializes_distinct_containers_do_not() {
        let locks = Arc::new(LockProvider::new());
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = Arc::clone(&locks);
        let handle = thread::spawn(move || {
            holder.with_lock(DeclId::new(1), || {
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            });
        });
        held_rx.recv().unwrap();

        assert!(locks.try_with_lock(DeclId::new(1), || ()).is_none());
        assert_eq!(locks.try_with_lock(DeclId::new(2), || 7), Some(7));

        release_tx.send(()).unwrap();
        handle.join().unwrap();
        assert!(locks.try_with_lock(DeclId::new(1), || ()).is_some());
    }

    #[test]
    fn test_checked_lock_observes_cancellation() {
        let locks = LockProvider::new();
        let token = CancellationToken::new();
        token.cancel();

        let result = locks.with_lock_checked(DeclId::new(1), &token, || Ok(1));

        assert_eq!(result, Err(ResolveError::Cancelled));
    }
}
