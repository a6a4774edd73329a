//! Bounded concurrency for store requests.
//!
//! A [Pool] caps the number of tasks that are running at once across every caller holding a
//! clone of it. Callers beyond the cap wait for capacity to free up.

use async_lock::Semaphore;
use commonware_macros::select;
use commonware_runtime::Signal;
use futures::{future, stream::FuturesUnordered, StreamExt};
use prometheus_client::metrics::gauge::Gauge;
use std::{future::Future, num::NonZeroUsize, pin::pin, sync::Arc};
use thiserror::Error;

/// Errors that can occur when running tasks on a [Pool].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error<E> {
    #[error("task failed: {0}")]
    Task(E),
    #[error("cancelled")]
    Cancelled,
}

/// Resolves once `stop` fires.
///
/// A [Signal] whose [commonware_runtime::Signaler] was dropped without signalling
/// never fires.
pub async fn stopped(stop: &Signal) {
    if stop.clone().await.is_err() {
        future::pending::<()>().await;
    }
}

/// Tracks a running task in a [Gauge] until dropped.
struct Active<'a>(&'a Gauge);

impl<'a> Active<'a> {
    fn new(gauge: &'a Gauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for Active<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Caps the number of concurrently running tasks.
///
/// Clones share the same capacity.
#[derive(Clone)]
pub struct Pool {
    permits: Arc<Semaphore>,
    capacity: NonZeroUsize,
    active: Gauge,
}

impl Pool {
    /// Create a pool allowing at most `capacity` tasks to run at once.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.get())),
            capacity,
            active: Gauge::default(),
        }
    }

    /// Maximum number of tasks that may run at once.
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Gauge tracking the number of tasks currently running.
    pub fn active(&self) -> &Gauge {
        &self.active
    }

    /// Run a single task once capacity is available.
    pub async fn submit<T, F>(&self, task: impl FnOnce() -> F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.permits.acquire_arc().await;
        let _active = Active::new(&self.active);
        task().await
    }

    /// Run all `tasks`, returning their outputs in submission order.
    ///
    /// Tasks complete in any order. The first task to fail, or `stop` firing, stops
    /// every outstanding task and is returned as the result.
    pub async fn run<T, E, F, G>(
        &self,
        tasks: impl IntoIterator<Item = G>,
        stop: &Signal,
    ) -> Result<Vec<T>, Error<E>>
    where
        G: FnOnce() -> F,
        F: Future<Output = Result<T, E>>,
    {
        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| async move { (index, self.submit(task).await) })
            .collect();
        let mut results: Vec<Option<T>> = (0..pending.len()).map(|_| None).collect();

        let mut stopping = pin!(stopped(stop));
        loop {
            select! {
                _ = &mut stopping => {
                    return Err(Error::Cancelled);
                },
                next = pending.next() => {
                    match next {
                        Some((index, Ok(value))) => results[index] = Some(value),
                        Some((_, Err(err))) => return Err(Error::Task(err)),
                        None => break,
                    }
                },
            }
        }
        Ok(results.into_iter().flatten().collect())
    }
}
