use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use sieve_core::{Error, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::timeout;

/// Fixed set of pre-cloned working trees, handed out one task at a time.
///
/// The semaphore counts idle trees; the queue holds them in FIFO order. A
/// permit is only ever returned after its tree is back in the queue, so a
/// permit holder always finds a tree to pop.
#[derive(Debug)]
pub struct RepoPool {
    idle: Mutex<VecDeque<PathBuf>>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl RepoPool {
    /// Build a pool over `paths`.
    ///
    /// # Errors
    /// Returns `Error::PoolExhausted` if `paths` is empty, or
    /// `Error::MissingWorkingTree` for the first path that does not exist. No
    /// pool is created in either case.
    pub fn new(paths: Vec<PathBuf>) -> Result<Arc<Self>> {
        if paths.is_empty() {
            return Err(Error::PoolExhausted);
        }
        if let Some(missing) = paths.iter().find(|path| !path.is_dir()) {
            return Err(Error::MissingWorkingTree {
                path: missing.clone(),
            });
        }

        let capacity = paths.len();
        tracing::info!("Working tree pool ready with {capacity} slots");

        Ok(Arc::new(Self {
            idle: Mutex::new(paths.into()),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }))
    }

    /// Borrow a working tree, waiting as long as it takes for one to free up.
    ///
    /// # Errors
    /// Returns an error only if the pool's internal semaphore was closed.
    pub async fn acquire(self: &Arc<Self>) -> Result<SlotGuard> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|err| Error::Internal(format!("working tree pool closed: {err}")))?;
        self.checkout(permit)
    }

    /// Borrow a working tree, giving up after `limit`.
    ///
    /// # Errors
    /// Returns `Error::AcquireTimeout` if no tree frees up in time.
    pub async fn acquire_timeout(self: &Arc<Self>, limit: Duration) -> Result<SlotGuard> {
        let start = Instant::now();
        timeout(limit, self.acquire())
            .await
            .map_err(|_| Error::AcquireTimeout {
                waited_ms: start.elapsed().as_millis() as u64,
            })?
    }

    /// Borrow a working tree only if one is idle right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotGuard> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => self.checkout(permit).ok(),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }

    /// Number of idle trees. Racy under concurrency; for observability only.
    pub fn len(&self) -> usize {
        self.lock_idle().len()
    }

    /// Whether every tree is currently borrowed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of trees managed by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn checkout(self: &Arc<Self>, permit: OwnedSemaphorePermit) -> Result<SlotGuard> {
        let path = self
            .lock_idle()
            .pop_front()
            .ok_or_else(|| Error::Internal("working tree pool out of sync".to_owned()))?;

        tracing::debug!("Checked out working tree {}", path.display());

        Ok(SlotGuard {
            pool: Arc::clone(self),
            path: Some(path),
            _permit: permit,
        })
    }

    fn release(&self, path: PathBuf) {
        tracing::debug!("Returned working tree {}", path.display());
        self.lock_idle().push_back(path);
    }

    // A panic while the lock is held cannot leave the queue half-modified, so
    // a poisoned lock is still safe to use.
    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<PathBuf>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive loan of one working tree. Returned to the pool on drop.
#[derive(Debug)]
pub struct SlotGuard {
    pool: Arc<RepoPool>,
    path: Option<PathBuf>,
    // Dropped after `Drop::drop` has pushed the path back.
    _permit: OwnedSemaphorePermit,
}

impl SlotGuard {
    /// Root of the borrowed working tree.
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            self.pool.release(path);
        }
    }
}
