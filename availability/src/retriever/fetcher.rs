//! Fetch the shares of a single quadrant by walking row trees.
//!
//! Each row root in a header addresses an inner node whose children are the two halves of
//! the row. The fetcher descends into the half covering the quadrant's columns and keeps the
//! digest of the other half, so every fetched share can later be proven against its row root.
//! Rows are walked together one level at a time: every node of a level is requested through
//! the [Pool] before any node of the next.

use super::metrics::Metrics;
use crate::{
    byzantine::Sample,
    header::DataAvailabilityHeader,
    nmt::{self, split, Id, Node, NodeDigest},
    pool::{self, Pool},
    share::Share,
    square::{leaf_namespace, Quadrant},
    store::{self, Store},
};
use commonware_codec::DecodeExt;
use commonware_runtime::Signal;
use commonware_utils::hex;
use thiserror::Error;

/// Reasons a quadrant could not be fetched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] store::Error),
    #[error("bytes do not match address: {}", hex(.0))]
    Mismatch(Id),
    #[error("malformed node: {0}")]
    Malformed(#[from] commonware_codec::Error),
    #[error("unexpected node at row {row}, leaves {start}..{end}")]
    Unexpected {
        row: usize,
        start: usize,
        end: usize,
    },
    #[error("timed out")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
}

impl From<pool::Error<Error>> for Error {
    fn from(err: pool::Error<Error>) -> Self {
        match err {
            pool::Error::Task(err) => err,
            pool::Error::Cancelled => Self::Cancelled,
        }
    }
}

/// Shares of a quadrant and the evidence needed to prove them.
pub struct Fetched {
    /// Shares of the quadrant, row-major.
    pub shares: Vec<Share>,
    pub sample: Sample,
}

/// A subtree of a row still to be fetched.
struct Pending {
    row: usize,
    start: usize,
    end: usize,
    digest: NodeDigest,
}

/// Fetch `id` from `store`, rejecting bytes that do not hash to it.
async fn fetch<S: Store>(store: S, metrics: &Metrics, id: Id) -> Result<Node, Error> {
    let bytes = store.get(&id).await?;
    metrics.nodes_fetched.inc();
    if nmt::id(&bytes) != id {
        return Err(Error::Mismatch(id));
    }
    Ok(Node::decode(bytes)?)
}

/// Fetch every node in `level` through `pool`, in order.
async fn fetch_level<S: Store>(
    store: &S,
    pool: &Pool,
    metrics: &Metrics,
    level: &[Pending],
    stop: &Signal,
) -> Result<Vec<Node>, Error> {
    let tasks = level.iter().map(|pending| {
        let store = store.clone();
        let id = pending.digest.hash;
        move || fetch(store, metrics, id)
    });
    Ok(pool.run(tasks, stop).await?)
}

/// Fetch the shares of `quadrant` of the square committed to by `dah`.
pub async fn quadrant<S: Store>(
    store: &S,
    pool: &Pool,
    metrics: &Metrics,
    dah: &DataAvailabilityHeader,
    quadrant: Quadrant,
    stop: &Signal,
) -> Result<Fetched, Error> {
    let width = dah.width();
    let k = width / 2;
    let rows = quadrant.rows(k);
    let cols = quadrant.cols(k);

    // Resolve the row roots into their halves
    let roots: Vec<Pending> = rows
        .clone()
        .map(|row| Pending {
            row,
            start: 0,
            end: width,
            digest: dah.row_roots()[row],
        })
        .collect();
    let nodes = fetch_level(store, pool, metrics, &roots, stop).await?;
    let mut siblings = Vec::with_capacity(k);
    let mut level = Vec::with_capacity(k);
    for (pending, node) in roots.into_iter().zip(nodes) {
        let Node::Inner { left, right } = node else {
            return Err(Error::Unexpected {
                row: pending.row,
                start: pending.start,
                end: pending.end,
            });
        };
        let (half, sibling) = if quadrant.is_right() {
            (right, left)
        } else {
            (left, right)
        };
        siblings.push(sibling);
        level.push(Pending {
            row: pending.row,
            start: cols.start,
            end: cols.end,
            digest: half,
        });
    }

    // Descend until every remaining node is a leaf
    let mut shares: Vec<Option<Share>> = vec![None; k * k];
    while !level.is_empty() {
        let nodes = fetch_level(store, pool, metrics, &level, stop).await?;
        let mut next = Vec::with_capacity(2 * level.len());
        for (pending, node) in level.into_iter().zip(nodes) {
            let Pending {
                row, start, end, ..
            } = pending;
            match node {
                Node::Leaf { namespace, share }
                    if end - start == 1 && namespace == leaf_namespace(width, row, start, &share) =>
                {
                    shares[(row - rows.start) * k + (start - cols.start)] = Some(share);
                }
                Node::Inner { left, right } if end - start > 1 => {
                    let mid = start + split(end - start);
                    next.push(Pending {
                        row,
                        start,
                        end: mid,
                        digest: left,
                    });
                    next.push(Pending {
                        row,
                        start: mid,
                        end,
                        digest: right,
                    });
                }
                _ => return Err(Error::Unexpected { row, start, end }),
            }
        }
        level = next;
    }

    let shares = shares
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(Error::Unexpected {
            row: rows.start,
            start: cols.start,
            end: cols.end,
        })?;
    Ok(Fetched {
        shares,
        sample: Sample { quadrant, siblings },
    })
}
