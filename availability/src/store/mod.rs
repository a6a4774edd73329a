//! Content-addressed storage of tree nodes.
//!
//! A [Store] maps the [Id] of a node (the hash of its bytes) to those bytes. Retrieval only
//! ever reads from a store. Writing happens when a square is imported, through a [Batch] that
//! buffers nodes and commits them in groups.

use crate::{
    header::{line_tree, DataAvailabilityHeader},
    nmt::Id,
    share::Share,
    square::{self, Axis, ExtendedDataSquare},
};
use bytes::Bytes;
use commonware_codec::Encode;
use commonware_utils::hex;
use std::{future::Future, num::NonZeroUsize};
use thiserror::Error;

mod batch;
pub use batch::Batch;
mod memory;
pub use memory::Memory;
mod metered;
pub use metered::Metered;

/// Errors that can occur when interacting with a [Store].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found: {}", hex(.0))]
    NotFound(Id),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur when importing a square.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("store error: {0}")]
    Store(#[from] Error),
    #[error("square error: {0}")]
    Square(#[from] square::Error),
}

/// Interface to a content-addressed store of node bytes.
///
/// Handles are cheap to clone and safe to use from many tasks at once.
pub trait Store: Clone + Send + Sync + 'static {
    /// Fetch the bytes stored under `id`.
    fn get(&self, id: &Id) -> impl Future<Output = Result<Bytes, Error>> + Send;

    /// Store `blobs`, returning the [Id] of each in order.
    fn put_batch(&self, blobs: Vec<Bytes>) -> impl Future<Output = Result<Vec<Id>, Error>> + Send;
}

/// Number of nodes in the row trees of a square of `width`: enough for a [Batch] to commit
/// a whole square at once.
pub fn batch_size(width: usize) -> NonZeroUsize {
    NonZeroUsize::new(width * (2 * width).saturating_sub(1)).unwrap_or(NonZeroUsize::MIN)
}

/// Write every node of every row tree of `eds` to `store`, returning the header committing
/// to it.
///
/// The square is stored as-is: no check is made that it is a valid extension.
pub async fn import<S: Store>(
    store: &S,
    eds: &ExtendedDataSquare,
    batch_size: NonZeroUsize,
) -> Result<DataAvailabilityHeader, ImportError> {
    let mut batch = Batch::new(store.clone(), batch_size);
    let mut row_roots = Vec::with_capacity(eds.width());
    for row in 0..eds.width() {
        let tree = line_tree(eds, Axis::Row, row);
        for node in tree.nodes() {
            batch.add(node.encode().freeze()).await?;
        }
        row_roots.push(tree.root());
    }
    batch.commit().await?;

    let col_roots = (0..eds.width())
        .map(|col| line_tree(eds, Axis::Col, col).root())
        .collect();
    Ok(DataAvailabilityHeader::new(row_roots, col_roots))
}

/// Extend `original` and [import] the resulting square.
pub async fn import_shares<S: Store>(
    store: &S,
    original: Vec<Share>,
    batch_size: NonZeroUsize,
) -> Result<(ExtendedDataSquare, DataAvailabilityHeader), ImportError> {
    let eds = ExtendedDataSquare::extend(original)?;
    let dah = import(store, &eds, batch_size).await?;
    Ok((eds, dah))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mocks, nmt::Node};
    use commonware_codec::DecodeExt;
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Runner};
    use rand::{rngs::StdRng, SeedableRng};

    #[test_traced]
    fn test_import_matches_header() {
        let executor = deterministic::Runner::default();
        executor.start(|_| async move {
            let mut rng = StdRng::seed_from_u64(0);
            let store = Memory::default();
            let original = mocks::random_shares(&mut rng, 9);
            let (eds, dah) = import_shares(&store, original, batch_size(6)).await.unwrap();
            assert_eq!(dah, DataAvailabilityHeader::from_eds(&eds));

            // Every row root is resolvable, and every leaf is present
            for root in dah.row_roots() {
                let bytes = store.get(&root.hash).await.unwrap();
                assert!(matches!(Node::decode(bytes), Ok(Node::Inner { .. })));
            }
            for row in 0..eds.width() {
                for col in 0..eds.width() {
                    assert!(store.contains(&mocks::leaf_id(&eds, row, col)));
                }
            }
            assert_eq!(store.len(), 6 * (2 * 6 - 1));
        });
    }

    #[test_traced]
    fn test_import_small_batches() {
        let executor = deterministic::Runner::default();
        executor.start(|_| async move {
            let mut rng = StdRng::seed_from_u64(1);
            let store = Memory::default();
            let eds = mocks::random_eds(&mut rng, 2);
            let dah = import(&store, &eds, NonZeroUsize::new(3).unwrap())
                .await
                .unwrap();
            assert_eq!(dah, DataAvailabilityHeader::from_eds(&eds));
            assert_eq!(store.len(), 4 * 7);
        });
    }

    #[test]
    fn test_not_found_renders_hex() {
        let mut id = [0u8; 32];
        id[0] = 0xab;
        id[31] = 0x01;
        let rendered = Error::NotFound(id).to_string();
        assert_eq!(rendered, format!("not found: ab{}01", "00".repeat(30)));
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(2).get(), 6);
        assert_eq!(batch_size(0).get(), 1);
    }
}
