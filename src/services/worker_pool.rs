//! Bounded submit / await-all worker pool.
//!
//! Used at both parallelism tiers: shards of locations (async units) and the
//! signal columns of one location (blocking units). Each unit reports back
//! under its key, either with its value or with a [`UnitFailure`]; a failing
//! or panicking unit never takes its siblings down.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Why a unit produced no value.
#[derive(Debug, thiserror::Error)]
pub enum UnitFailure<E> {
    #[error("{0}")]
    Failed(E),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("worker was cancelled")]
    Cancelled,
}

impl<E> UnitFailure<E> {
    fn from_join_error(err: JoinError) -> Self {
        if err.is_panic() {
            UnitFailure::Panicked(panic_message(err.into_panic()))
        } else {
            UnitFailure::Cancelled
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub type UnitResult<K, T, E> = (K, Result<T, UnitFailure<E>>);

/// At most `size` units run at once; the rest wait for a permit.
pub struct WorkerPool<K, T, E> {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<UnitResult<K, T, E>>,
}

impl<K, T, E> WorkerPool<K, T, E>
where
    K: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(name: &'static str, size: usize) -> Self {
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(size.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Submit a CPU-bound unit. It runs on the blocking thread pool once a
    /// permit is free.
    pub fn submit_blocking<F>(&mut self, key: K, work: F)
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        self.tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (key, Err(UnitFailure::Cancelled)),
            };
            let outcome = match tokio::task::spawn_blocking(work).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(UnitFailure::Failed(e)),
                Err(join_err) => Err(UnitFailure::from_join_error(join_err)),
            };
            (key, outcome)
        });
    }

    /// Submit an async unit. It is spawned as its own task so a panic inside
    /// it is caught and reported under `key`.
    pub fn submit<F>(&mut self, key: K, work: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        self.tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (key, Err(UnitFailure::Cancelled)),
            };
            let outcome = match tokio::spawn(work).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(UnitFailure::Failed(e)),
                Err(join_err) => Err(UnitFailure::from_join_error(join_err)),
            };
            (key, outcome)
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every submitted unit. Results come back in completion order.
    pub async fn join_all(mut self) -> Vec<UnitResult<K, T, E>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                // The wrapper task only fails if the runtime is shutting down.
                Err(e) => tracing::error!("{} pool: lost a unit: {}", self.name, e),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_are_keyed() {
        let mut pool: WorkerPool<u32, u32, String> = WorkerPool::new("test", 2);
        for i in 0..5 {
            pool.submit_blocking(i, move || Ok(i * 10));
        }
        assert_eq!(pool.len(), 5);
        let mut results: Vec<(u32, u32)> = pool
            .join_all()
            .await
            .into_iter()
            .map(|(k, r)| (k, r.unwrap()))
            .collect();
        results.sort();
        assert_eq!(results, vec![(0, 0), (1, 10), (2, 20), (3, 30), (4, 40)]);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let mut pool: WorkerPool<&'static str, u32, String> = WorkerPool::new("test", 4);
        pool.submit_blocking("ok", || Ok(1));
        pool.submit_blocking("boom", || panic!("model exploded"));
        pool.submit_blocking("err", || Err("bad input".to_string()));

        let results = pool.join_all().await;
        assert_eq!(results.len(), 3);
        for (key, result) in results {
            match key {
                "ok" => assert_eq!(result.unwrap(), 1),
                "boom" => match result {
                    Err(UnitFailure::Panicked(msg)) => assert!(msg.contains("model exploded")),
                    other => panic!("expected panic failure, got {:?}", other),
                },
                "err" => assert!(matches!(result, Err(UnitFailure::Failed(ref e)) if e == "bad input")),
                _ => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn test_async_panic_is_isolated() {
        let mut pool: WorkerPool<u8, u8, String> = WorkerPool::new("test", 2);
        pool.submit(1, async { Ok(1) });
        pool.submit(2, async {
            if true {
                panic!("shard died");
            }
            Ok(2)
        });
        let mut results = pool.join_all().await;
        results.sort_by_key(|(k, _)| *k);
        assert_eq!(results[0].1.as_ref().unwrap(), &1);
        assert!(matches!(results[1].1, Err(UnitFailure::Panicked(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut pool: WorkerPool<usize, (), String> = WorkerPool::new("test", 2);

        for i in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit_blocking(i, move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let results = pool.join_all().await;
        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let pool: WorkerPool<u8, u8, String> = WorkerPool::new("test", 0);
        assert!(pool.is_empty());
        assert!(pool.join_all().await.is_empty());
    }
}
