//! Commitment to an [ExtendedDataSquare]: the root of every row and column.

use crate::{
    nmt::{NodeDigest, Tree},
    square::{leaf_namespace, Axis, ExtendedDataSquare},
};
use bytes::BufMut;
use commonware_codec::{Encode, EncodeSize, FixedSize, Write};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// Minimum width of an extended square (a single original share).
pub const MIN_WIDTH: usize = 2;

/// Reasons a [DataAvailabilityHeader] is rejected before any data is requested.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("row and column counts differ: {rows} != {cols}")]
    Mismatch { rows: usize, cols: usize },
    #[error("width must be even: {0}")]
    OddWidth(usize),
    #[error("width below minimum: {0}")]
    TooSmall(usize),
    #[error("width exceeds maximum: {width} > {max}")]
    TooLarge { width: usize, max: usize },
}

/// Ordered row and column roots committing to a square.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataAvailabilityHeader {
    row_roots: Vec<NodeDigest>,
    col_roots: Vec<NodeDigest>,
}

impl DataAvailabilityHeader {
    /// Create a header from roots computed elsewhere.
    pub fn new(row_roots: Vec<NodeDigest>, col_roots: Vec<NodeDigest>) -> Self {
        Self {
            row_roots,
            col_roots,
        }
    }

    /// Compute the header of a square.
    pub fn from_eds(eds: &ExtendedDataSquare) -> Self {
        let row_roots = (0..eds.width())
            .map(|row| line_tree(eds, Axis::Row, row).root())
            .collect();
        let col_roots = (0..eds.width())
            .map(|col| line_tree(eds, Axis::Col, col).root())
            .collect();
        Self {
            row_roots,
            col_roots,
        }
    }

    /// Check the shape of the header against the largest square we accept.
    pub fn validate(&self, max_width: usize) -> Result<(), Error> {
        let (rows, cols) = (self.row_roots.len(), self.col_roots.len());
        if rows != cols {
            return Err(Error::Mismatch { rows, cols });
        }
        if rows < MIN_WIDTH {
            return Err(Error::TooSmall(rows));
        }
        if rows % 2 != 0 {
            return Err(Error::OddWidth(rows));
        }
        if rows > max_width {
            return Err(Error::TooLarge {
                width: rows,
                max: max_width,
            });
        }
        Ok(())
    }

    /// Width of the committed square.
    pub fn width(&self) -> usize {
        self.row_roots.len()
    }

    /// Row roots, in order.
    pub fn row_roots(&self) -> &[NodeDigest] {
        &self.row_roots
    }

    /// Column roots, in order.
    pub fn col_roots(&self) -> &[NodeDigest] {
        &self.col_roots
    }

    /// Root of line `index` along `axis`.
    pub fn root(&self, axis: Axis, index: usize) -> Option<&NodeDigest> {
        match axis {
            Axis::Row => self.row_roots.get(index),
            Axis::Col => self.col_roots.get(index),
        }
    }

    /// Hash of the encoded header.
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(self.encode()).into()
    }
}

impl Write for DataAvailabilityHeader {
    fn write(&self, buf: &mut impl BufMut) {
        for roots in [&self.row_roots, &self.col_roots] {
            (roots.len() as u32).write(buf);
            for root in roots {
                root.write(buf);
            }
        }
    }
}

impl EncodeSize for DataAvailabilityHeader {
    fn encode_size(&self) -> usize {
        2 * u32::SIZE + (self.row_roots.len() + self.col_roots.len()) * NodeDigest::SIZE
    }
}

/// Build the tree over line `index` of `axis`.
///
/// # Panics
///
/// Panics if `index` is out of bounds.
pub fn line_tree(eds: &ExtendedDataSquare, axis: Axis, index: usize) -> Tree {
    let width = eds.width();
    let line = eds.line(axis, index).expect("line out of bounds");
    Tree::new(line.into_iter().enumerate().map(|(position, share)| {
        let (row, col) = crate::square::coordinates(axis, index, position);
        (leaf_namespace(width, row, col, &share), share)
    }))
}
