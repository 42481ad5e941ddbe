//! Bounded fan-out for per-item work.

use crate::errors::{AgentError, AgentResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Upper bound on concurrently running workers.
pub const MAX_WORKERS: usize = 10;

/// Runs one job per item with at most `workers` jobs in flight.
///
/// Results come back in input order. A job that panics yields an
/// `Err` for its own item only.
#[derive(Debug, Clone)]
pub struct BoundedPool {
    workers: usize,
}

impl BoundedPool {
    /// A pool of `workers` workers, clamped to `1..=MAX_WORKERS`.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.clamp(1, MAX_WORKERS),
        }
    }

    /// A pool sized `min(MAX_WORKERS, item_count)`.
    pub fn for_items(item_count: usize) -> Self {
        Self::new(item_count)
    }

    pub const fn workers(&self) -> usize {
        self.workers
    }

    pub async fn map<T, R, F, Fut>(&self, items: Vec<T>, job: F) -> Vec<AgentResult<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let work = job(item);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| AgentError::Internal {
                        component: "worker_pool".to_string(),
                        reason: err.to_string(),
                    })?;
                Ok(work.await)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(err) => Err(AgentError::from(err)),
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn worker_count_is_capped() {
        assert_eq!(BoundedPool::for_items(3).workers(), 3);
        assert_eq!(BoundedPool::for_items(25).workers(), MAX_WORKERS);
        assert_eq!(BoundedPool::for_items(0).workers(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn keeps_input_order_and_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = BoundedPool::new(2);

        let results = pool
            .map((0..6u64).collect(), |n| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5 * (6 - n))).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    n * 10
                }
            })
            .await;

        let values: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn panicking_job_only_fails_its_item() {
        let results = BoundedPool::new(4)
            .map(vec![1, 2, 3], |n| async move {
                assert!(n != 2, "boom");
                n
            })
            .await;

        assert_eq!(results[0].as_ref().ok(), Some(&1));
        assert!(matches!(&results[1], Err(AgentError::Internal { reason, .. }) if reason == "task panicked"));
        assert_eq!(results[2].as_ref().ok(), Some(&3));
    }
}
