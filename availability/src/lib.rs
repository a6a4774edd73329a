//! Retrieve and verify erasure-coded data squares from a content-addressed store.
//!
//! # Overview
//!
//! A block's data is laid out as a `k × k` square of fixed-size [Share]s and extended with
//! Reed-Solomon parity to a `2k × 2k` [ExtendedDataSquare], so that every row and column can
//! be recovered from any half of it. Each row and column is committed to by the root of a
//! namespaced Merkle tree, and the lists of roots form a [DataAvailabilityHeader].
//!
//! The nodes of every row tree are kept in a [store::Store], addressed by their hash. Given
//! only a header, a [Retriever] fetches one quadrant of the square, repairs the rest, and
//! verifies the result against every committed root. If the committed data is not a valid
//! extension, retrieval produces a [ByzantineProof] of the inconsistency.
//!
//! # Status
//!
//! `commonware-availability` is **ALPHA** software and is not yet recommended for production
//! use. Developers should expect breaking changes and occasional instability.

#![doc(
    html_logo_url = "https://commonware.xyz/imgs/rustdoc_logo.svg",
    html_favicon_url = "https://commonware.xyz/favicon.ico"
)]

pub mod byzantine;
pub mod coding;
pub mod header;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod nmt;
pub mod pool;
pub mod repair;
pub mod retriever;
pub mod sampler;
pub mod share;
pub mod square;
pub mod store;

pub use byzantine::ByzantineProof;
pub use header::DataAvailabilityHeader;
pub use retriever::{Config, Error, Retriever};
pub use share::{Namespace, Share, NAMESPACE_SIZE, PARITY_NAMESPACE, SHARE_SIZE};
pub use square::{Axis, ExtendedDataSquare, Quadrant};
