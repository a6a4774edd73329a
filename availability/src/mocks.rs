//! Fixtures for exercising retrieval.

use crate::{
    nmt::{self, Node},
    share::{Share, NAMESPACE_SIZE, PARITY_NAMESPACE, SHARE_SIZE},
    square::{leaf_namespace, ExtendedDataSquare},
    store::Memory,
};
use rand::{Rng, RngCore};

/// Generate `n` random shares, sorted by namespace.
///
/// Namespaces never collide with [PARITY_NAMESPACE].
pub fn random_shares(rng: &mut impl RngCore, n: usize) -> Vec<Share> {
    let mut shares: Vec<Share> = (0..n)
        .map(|_| {
            let mut data = vec![0u8; SHARE_SIZE];
            rng.fill_bytes(&mut data);
            data[0] = rng.gen_range(0..PARITY_NAMESPACE[0]);
            Share::new(data).expect("share has the right size")
        })
        .collect();
    shares.sort_by_key(|share| share.namespace());
    shares
}

/// Generate a random square extended from a `k × k` original block.
pub fn random_eds(rng: &mut impl RngCore, k: usize) -> ExtendedDataSquare {
    ExtendedDataSquare::extend(random_shares(rng, k * k)).expect("original block is square")
}

/// Overwrite the payload of the share at (`row`, `col`) with the payload of the share at
/// (`row`, `from`), keeping its namespace. The result is no longer a valid extension.
pub fn corrupt(eds: &ExtendedDataSquare, row: usize, col: usize, from: usize) -> ExtendedDataSquare {
    let width = eds.width();
    let mut shares = eds.shares().to_vec();
    let mut data = shares[row * width + col].as_ref().to_vec();
    data[NAMESPACE_SIZE..].copy_from_slice(shares[row * width + from].payload());
    shares[row * width + col] = Share::new(data).expect("share has the right size");
    ExtendedDataSquare::from_shares(shares).expect("width is unchanged")
}

/// Content address of the leaf holding the share at (`row`, `col`).
pub fn leaf_id(eds: &ExtendedDataSquare, row: usize, col: usize) -> nmt::Id {
    let share = eds.get(row, col).expect("position in bounds").clone();
    let namespace = leaf_namespace(eds.width(), row, col, &share);
    Node::Leaf { namespace, share }.digest().hash
}

/// Make the share at (`row`, `col`) unreachable in `store`.
pub fn withhold(store: &Memory, eds: &ExtendedDataSquare, row: usize, col: usize) {
    store.remove(&leaf_id(eds, row, col));
}
