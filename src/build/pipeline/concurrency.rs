//! Concurrency primitives available to plugins.
//!
//! Two shapes cover what plugins need:
//!
//! - [`WorkerPool::run_concurrently`] maps a fallible closure over items on a
//!   fixed-size thread pool. Each task owns exactly one item, so no locking
//!   is needed; the first error is returned after every task has finished.
//! - [`fan_out`] runs independent async operations (network fetches) under
//!   a semaphore and collects every outcome in input order.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use tokio::sync::Semaphore;

use super::error::ResourceError;

// =============================================================================
// Worker pool
// =============================================================================

/// A fixed-size pool for CPU-bound per-item work.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` threads (at least one).
    pub fn new(size: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let size = size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("folio-worker-{i}"))
            .build()?;
        Ok(Self { pool, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task` once per element of `items`, in parallel.
    ///
    /// Blocks until every task has completed, then returns the first error
    /// observed, if any. Tasks are not cancelled when one fails and items
    /// already mutated are not rolled back.
    pub fn run_concurrently<T, E, F>(&self, items: &mut [T], task: F) -> Result<(), E>
    where
        T: Send,
        E: Send,
        F: Fn(&mut T) -> Result<(), E> + Sync,
    {
        let first_error: Mutex<Option<E>> = Mutex::new(None);

        self.pool.install(|| {
            items.par_iter_mut().with_max_len(1).for_each(|item| {
                if let Err(e) = task(item) {
                    let mut slot = first_error.lock().unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                }
            });
        });

        match first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Fan-out
// =============================================================================

/// Run every operation with at most `limit` in flight, collecting each result.
///
/// The returned vector is in input order and has one entry per operation.
/// A failing operation never affects the others; a panicking one is
/// reported as a [`ResourceError`] for its own slot.
pub async fn fan_out<T, Fut>(limit: usize, operations: Vec<Fut>) -> Vec<Result<T, ResourceError>>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, ResourceError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));

    let handles: Vec<_> = operations
        .into_iter()
        .map(|operation| {
            let semaphore = Arc::clone(&semaphore);
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                operation.await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => Err(ResourceError::new(format!("task {index}"), e.to_string())),
        });
    }
    results
}

/// The first failure among fan-out results, in input order.
pub fn first_error<T>(results: &[Result<T, ResourceError>]) -> Option<&ResourceError> {
    results.iter().find_map(|r| r.as_ref().err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn transform(n: &mut u64) {
        *n = n.wrapping_mul(2654435761).rotate_left(7) ^ 0x5bd1e995;
    }

    #[test]
    fn test_matches_sequential_for_every_pool_size() {
        let input: Vec<u64> = (0..64).collect();
        let mut expected = input.clone();
        expected.iter_mut().for_each(transform);

        for size in 1..=8 {
            let pool = WorkerPool::new(size).unwrap();
            let mut items = input.clone();
            pool.run_concurrently(&mut items, |n| {
                transform(n);
                Ok::<(), String>(())
            })
            .unwrap();
            assert_eq!(items, expected, "pool size {size}");
        }
    }

    #[test]
    fn test_error_returned_after_all_tasks_complete() {
        let pool = WorkerPool::new(4).unwrap();
        let completed = AtomicUsize::new(0);
        let mut items: Vec<usize> = (0..10).collect();

        let result = pool.run_concurrently(&mut items, |n| {
            std::thread::sleep(Duration::from_millis(5));
            completed.fetch_add(1, Ordering::SeqCst);
            if *n == 3 {
                Err(format!("item {n} failed"))
            } else {
                *n += 100;
                Ok(())
            }
        });

        assert_eq!(result, Err("item 3 failed".to_string()));
        assert_eq!(completed.load(Ordering::SeqCst), 10);
        // No rollback: the other items kept their updates
        assert_eq!(items[0], 100);
        assert_eq!(items[3], 3);
        assert_eq!(items[9], 109);
    }

    #[test]
    fn test_empty_slice() {
        let pool = WorkerPool::new(2).unwrap();
        let mut items: Vec<u8> = Vec::new();
        assert!(pool.run_concurrently(&mut items, |_| Err("unreachable")).is_ok());
    }

    #[test]
    fn test_zero_size_pool_gets_one_thread() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_collects_every_result() {
        let completed = Arc::new(AtomicUsize::new(0));
        let operations: Vec<_> = (1..=5)
            .map(|task| {
                let completed = Arc::clone(&completed);
                async move {
                    tokio::time::sleep(Duration::from_millis(10 * (6 - task as u64))).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    if task == 3 {
                        Err(ResourceError::new(format!("task-{task}"), "connection refused"))
                    } else {
                        Ok(task * 10)
                    }
                }
            })
            .collect();

        let results = fan_out(2, operations).await;

        assert_eq!(completed.load(Ordering::SeqCst), 5);
        assert_eq!(results.len(), 5);
        assert_eq!(
            first_error(&results),
            Some(&ResourceError::new("task-3", "connection refused"))
        );
        let successes: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(successes, vec![&10, &20, &40, &50]);
    }

    #[tokio::test]
    async fn test_fan_out_respects_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let operations: Vec<_> = (0..12)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), ResourceError>(())
                }
            })
            .collect();

        let results = fan_out(3, operations).await;

        assert!(results.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
