//! Bounded-concurrency draining of a shared work pool.
//!
//! [`run_bounded`] starts a fixed number of workers over a [`WorkPool`]. Each
//! worker pops one item, awaits the handler on it, then immediately pops the
//! next, so the number of handler invocations in flight never exceeds the
//! worker count and a slow item only ever occupies one slot.
//!
//! ```text
//!   WorkPool (LIFO) ──pop──► worker 0 ──► handler(item) ──┐
//!                   ──pop──► worker 1 ──► handler(item) ──┼─► join_all
//!                   ──pop──► worker N ──► handler(item) ──┘
//! ```
//!
//! The module is generic; it knows nothing about files or URLs.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::debug;

/// A shared, lock-protected pool of pending work items.
///
/// Items are removed from the end of the pool (LIFO). Clones share the same
/// underlying storage, so an owner can inspect or clear the pool while
/// workers are draining it.
#[derive(Debug)]
pub struct WorkPool<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for WorkPool<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for WorkPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for WorkPool<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }
}

impl<T> WorkPool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    /// Add an item. It will be the next one popped.
    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Remove the most recently added item.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Drop every pending item. Workers stop at their next pop.
    pub fn clear(&self) {
        self.items.lock().clear();
    }

    /// Replace the pending items.
    pub fn replace(&self, items: Vec<T>) {
        *self.items.lock() = items;
    }

    /// Take every pending item out of the pool.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl<T: Clone> WorkPool<T> {
    /// Copy of the pending items, in pool order.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

/// Drain `pool` with at most `concurrency` handler invocations in flight.
///
/// The worker count is `min(concurrency, pool.len())` taken at call time; if
/// it is zero the call returns immediately without invoking `handler`.
///
/// The returned future completes only after every worker has settled,
/// including handler invocations that were in flight when another one
/// failed. The first error is returned. Once an error has been observed no
/// worker pulls a new item, so the pool may still hold items afterwards.
///
/// All workers are polled inside the caller's task.
pub async fn run_bounded<T, E, F, Fut>(
    pool: &WorkPool<T>,
    concurrency: usize,
    handler: F,
) -> Result<(), E>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let workers = concurrency.min(pool.len());
    if workers == 0 {
        return Ok(());
    }

    debug!(workers, pending = pool.len(), "Starting bounded run");

    let failed = AtomicBool::new(false);
    let first_error: Mutex<Option<E>> = Mutex::new(None);
    {
        let failed = &failed;
        let first_error = &first_error;
        let handler = &handler;

        join_all((0..workers).map(|_| async move {
            while !failed.load(Ordering::SeqCst) {
                let Some(item) = pool.pop() else {
                    break;
                };
                if let Err(e) = handler(item).await {
                    failed.store(true, Ordering::SeqCst);
                    first_error.lock().get_or_insert(e);
                    break;
                }
            }
        }))
        .await;
    }

    match first_error.into_inner() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
