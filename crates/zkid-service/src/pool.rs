//! # Worker Pool
//!
//! Proving and pairing checks are CPU-bound and must not run on async
//! executor threads. [`WorkerPool`] runs each job on tokio's blocking pool,
//! gated by a semaphore sized to the machine's parallelism, so at most
//! `workers` jobs execute at once and the rest queue.
//!
//! A queued job waits at most `queue_timeout` for a permit. On timeout it is
//! dropped with [`PoolError::QueueTimeout`] before it starts.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::PoolError;

pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Concurrent jobs; `None` means `available_parallelism`.
    pub workers: Option<usize>,
    /// Longest a job may wait for a free worker.
    #[serde(with = "millis")]
    pub queue_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: None,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn resolved_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    queue_timeout: Duration,
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Result<Self, PoolError> {
        let workers = config.resolved_workers();
        if workers == 0 || workers > Semaphore::MAX_PERMITS {
            return Err(PoolError::InvalidConfig(format!("workers must be in 1..={}", Semaphore::MAX_PERMITS)));
        }
        if config.queue_timeout.is_zero() {
            return Err(PoolError::InvalidConfig("queue_timeout must be positive".into()));
        }
        tracing::debug!(workers, queue_timeout = ?config.queue_timeout, "worker pool ready");
        Ok(Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            queue_timeout: config.queue_timeout,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Workers currently free.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting jobs. Running jobs finish; queued ones fail with `Closed`.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run `job` on a worker once one is free.
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = match tokio::time::timeout(self.queue_timeout, Arc::clone(&self.permits).acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                tracing::warn!(timeout = ?self.queue_timeout, "job dropped: no worker available");
                return Err(PoolError::QueueTimeout(self.queue_timeout));
            }
        };
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| {
            if e.is_panic() {
                tracing::error!("worker job panicked");
                PoolError::Panicked
            } else {
                PoolError::Closed
            }
        })
    }

    /// Run every job through the pool; results come back in input order.
    pub async fn run_batch<F, T>(&self, jobs: Vec<F>) -> Vec<Result<T, PoolError>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut results: Vec<Result<T, PoolError>> = (0..jobs.len()).map(|_| Err(PoolError::Closed)).collect();
        let mut set = JoinSet::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let pool = self.clone();
            set.spawn(async move { (index, pool.run(job).await) });
        }
        while let Some(joined) = set.join_next().await {
            if let Ok((index, result)) = joined {
                results[index] = result;
            }
        }
        results
    }
}
