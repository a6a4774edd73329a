//! Buffered writes to a [Store].

use super::{Error, Store};
use crate::nmt::Id;
use bytes::Bytes;
use std::num::NonZeroUsize;
use tracing::debug;

/// Collects blobs and writes them to a [Store] in groups of at most `size`.
///
/// Blobs are written when the buffer fills and on [Batch::commit]. Dropping a [Batch]
/// without committing discards anything still buffered.
pub struct Batch<S: Store> {
    store: S,
    size: NonZeroUsize,
    buffer: Vec<Bytes>,
    committed: Vec<Id>,
}

impl<S: Store> Batch<S> {
    /// Create a batch writing to `store` in groups of `size`.
    pub fn new(store: S, size: NonZeroUsize) -> Self {
        Self {
            store,
            size,
            buffer: Vec::with_capacity(size.get()),
            committed: Vec::new(),
        }
    }

    /// Buffer `blob`, flushing if the buffer is full.
    pub async fn add(&mut self, blob: Bytes) -> Result<(), Error> {
        self.buffer.push(blob);
        if self.buffer.len() >= self.size.get() {
            self.flush().await?;
        }
        Ok(())
    }

    /// Number of buffered blobs not yet written.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    async fn flush(&mut self) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let blobs = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.size.get()));
        let count = blobs.len();
        let ids = self.store.put_batch(blobs).await?;
        debug!(count, "flushed batch");
        self.committed.extend(ids);
        Ok(())
    }

    /// Write any buffered blobs, returning the [Id] of every blob added, in order.
    pub async fn commit(mut self) -> Result<Vec<Id>, Error> {
        self.flush().await?;
        Ok(self.committed)
    }
}
