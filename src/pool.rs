//! # Worker Pool Driver
//!
//! Fans work items out over a bounded pool of workers, aggregates per-item
//! errors into a single multi-error, and respects cancellation and the
//! batch deadline.
//!
//! The pool is a rayon thread pool sized to the requested concurrency, so
//! at most `concurrency` items run at once and each worker runs one item
//! end-to-end. Workers never share mutable state; results are collected
//! per item. Cancellation is cooperative: it is observed between items, not
//! mid-network-call, and outstanding items are tagged as cancelled rather
//! than silently dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::retry::deadline_exceeded;

/// A cooperative cancellation signal shared between the driver and its
/// caller (e.g. a signal handler).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation. Workers stop picking up new items.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Run `work` over every item with at most `concurrency` items in flight.
///
/// Every item produces exactly one entry in the returned vector, in input
/// order. Items that were not started before cancellation or deadline
/// expiry yield the error produced by `cancelled` for that item.
pub fn run_items<T, R, W, C>(
    items: &[T],
    concurrency: usize,
    cancel: &CancelToken,
    deadline: Option<Instant>,
    work: W,
    cancelled: C,
) -> Vec<Result<R>>
where
    T: Sync,
    R: Send,
    W: Fn(&T) -> Result<R> + Sync,
    C: Fn(&T) -> Error + Sync,
{
    use rayon::prelude::*;

    if items.is_empty() {
        return Vec::new();
    }
    let threads = concurrency.clamp(1, items.len());
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            // A pool that cannot be built fails every item identically.
            return items
                .iter()
                .map(|_| {
                    Err(Error::Config {
                        message: format!("failed to build worker pool: {}", e),
                        hint: None,
                    })
                })
                .collect();
        }
    };

    pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                if cancel.is_cancelled() || deadline_exceeded(deadline) {
                    return Err(cancelled(item));
                }
                work(item)
            })
            .collect()
    })
}

/// Split results into successes and collected errors.
pub fn partition_results<R>(results: Vec<Result<R>>) -> (Vec<R>, Vec<Error>) {
    let mut successes = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => successes.push(value),
            Err(err) => errors.push(err),
        }
    }
    (successes, errors)
}

/// Fold collected errors into a single batch error, or `Ok` when empty.
pub fn into_batch_result(errors: Vec<Error>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Batch { errors })
    }
}
