//! A [Store] wrapper that tracks metrics.

use super::{Error, Store};
use crate::nmt::Id;
use bytes::Bytes;
use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::counter::Counter;
use std::sync::Arc;

struct Metrics {
    gets: Counter,
    misses: Counter,
    get_bytes: Counter,
    puts: Counter,
    put_bytes: Counter,
}

impl Metrics {
    fn init(context: &impl RuntimeMetrics) -> Self {
        let metrics = Self {
            gets: Counter::default(),
            misses: Counter::default(),
            get_bytes: Counter::default(),
            puts: Counter::default(),
            put_bytes: Counter::default(),
        };
        context.register("gets", "Total number of gets", metrics.gets.clone());
        context.register(
            "misses",
            "Total number of gets that found nothing",
            metrics.misses.clone(),
        );
        context.register(
            "get_bytes",
            "Total amount of data returned by gets",
            metrics.get_bytes.clone(),
        );
        context.register("puts", "Total number of blobs put", metrics.puts.clone());
        context.register(
            "put_bytes",
            "Total amount of data put",
            metrics.put_bytes.clone(),
        );
        metrics
    }
}

/// A wrapper around a [Store] implementation that tracks metrics.
#[derive(Clone)]
pub struct Metered<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S: Store> Metered<S> {
    /// Wrap `inner`, registering metrics with `context`.
    pub fn new(context: impl RuntimeMetrics, inner: S) -> Self {
        Self {
            inner,
            metrics: Metrics::init(&context).into(),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Store> Store for Metered<S> {
    async fn get(&self, id: &Id) -> Result<Bytes, Error> {
        self.metrics.gets.inc();
        let result = self.inner.get(id).await;
        match &result {
            Ok(blob) => {
                self.metrics.get_bytes.inc_by(blob.len() as u64);
            }
            Err(Error::NotFound(_)) => {
                self.metrics.misses.inc();
            }
            Err(_) => {}
        }
        result
    }

    async fn put_batch(&self, blobs: Vec<Bytes>) -> Result<Vec<Id>, Error> {
        let count = blobs.len() as u64;
        let bytes = blobs.iter().map(|blob| blob.len() as u64).sum();
        let ids = self.inner.put_batch(blobs).await?;
        self.metrics.puts.inc_by(count);
        self.metrics.put_bytes.inc_by(bytes);
        Ok(ids)
    }
}
