//! The extended (erasure-coded) data square.
//!
//! An original `k × k` block of shares is extended into a `2k × 2k` square:
//!
//! ```text
//!  ------- -------
//! |       |       |
//! |  Q0   |  Q1   |   Q0: original data
//! |       |       |   Q1: row parity of Q0
//!  ------- -------
//! |       |       |   Q2: column parity of Q0
//! |  Q2   |  Q3   |   Q3: row parity of Q2 (equivalently, column parity of Q1)
//! |       |       |
//!  ------- -------
//! ```
//!
//! Every row and every column of the square is a Reed-Solomon codeword, so any single
//! quadrant determines the other three.

use crate::{
    coding,
    share::{Namespace, Share, PARITY_NAMESPACE},
};
use std::ops::Range;
use thiserror::Error;

/// Errors that can occur when constructing an [ExtendedDataSquare].
#[derive(Debug, Error)]
pub enum Error {
    #[error("share count {0} is not a square")]
    NotSquare(usize),
    #[error("width must be even and non-zero: {0}")]
    InvalidWidth(usize),
    #[error("coding error: {0}")]
    Coding(#[from] coding::Error),
}

/// The direction of a line in a square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Col,
}

impl Axis {
    /// The other axis.
    pub fn orthogonal(self) -> Self {
        match self {
            Self::Row => Self::Col,
            Self::Col => Self::Row,
        }
    }
}

/// One `k × k` quarter of an [ExtendedDataSquare].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    /// All quadrants, in index order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    /// Position of the quadrant in [Quadrant::ALL].
    pub fn index(self) -> usize {
        match self {
            Self::TopLeft => 0,
            Self::TopRight => 1,
            Self::BottomLeft => 2,
            Self::BottomRight => 3,
        }
    }

    /// Rows covered by the quadrant in a square with original width `k`.
    pub fn rows(self, k: usize) -> Range<usize> {
        match self {
            Self::TopLeft | Self::TopRight => 0..k,
            Self::BottomLeft | Self::BottomRight => k..2 * k,
        }
    }

    /// Columns covered by the quadrant in a square with original width `k`.
    pub fn cols(self, k: usize) -> Range<usize> {
        match self {
            Self::TopLeft | Self::BottomLeft => 0..k,
            Self::TopRight | Self::BottomRight => k..2 * k,
        }
    }

    /// Returns true if the quadrant covers the right half of each of its rows.
    pub fn is_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight)
    }
}

/// Namespace under which the share at (`row`, `col`) is inserted into a tree.
///
/// Shares of the original quadrant keep their own namespace; every other share is parity.
pub fn leaf_namespace(width: usize, row: usize, col: usize, share: &Share) -> Namespace {
    let k = width / 2;
    if row < k && col < k {
        share.namespace()
    } else {
        PARITY_NAMESPACE
    }
}

/// Position of the share at `position` along line `index` of `axis`, as (row, col).
pub fn coordinates(axis: Axis, index: usize, position: usize) -> (usize, usize) {
    match axis {
        Axis::Row => (index, position),
        Axis::Col => (position, index),
    }
}

/// A `2k × 2k` square of shares, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedDataSquare {
    width: usize,
    shares: Vec<Share>,
}

impl ExtendedDataSquare {
    /// Extend a row-major `k × k` block of original shares into a full square.
    pub fn extend(original: Vec<Share>) -> Result<Self, Error> {
        let k = exact_sqrt(original.len()).ok_or(Error::NotSquare(original.len()))?;
        if k == 0 {
            return Err(Error::InvalidWidth(0));
        }

        let width = 2 * k;
        let mut rows: Vec<Vec<Share>> = Vec::with_capacity(width);

        // Extend the top half row by row
        for row in original.chunks(k) {
            let mut line = row.to_vec();
            line.extend(coding::encode(row)?);
            rows.push(line);
        }

        // Extend every column of the top half downwards
        let mut bottom: Vec<Vec<Share>> = vec![Vec::with_capacity(width); k];
        for col in 0..width {
            let column: Vec<Share> = rows.iter().map(|row| row[col].clone()).collect();
            for (row, share) in coding::encode(&column)?.into_iter().enumerate() {
                bottom[row].push(share);
            }
        }
        rows.extend(bottom);

        Ok(Self {
            width,
            shares: rows.into_iter().flatten().collect(),
        })
    }

    /// Wrap an already extended, row-major square without checking its encoding.
    pub fn from_shares(shares: Vec<Share>) -> Result<Self, Error> {
        let width = exact_sqrt(shares.len()).ok_or(Error::NotSquare(shares.len()))?;
        if width == 0 || width % 2 != 0 {
            return Err(Error::InvalidWidth(width));
        }
        Ok(Self { width, shares })
    }

    /// Number of shares along each side.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of shares along each side of the original block (`k`).
    pub fn original_width(&self) -> usize {
        self.width / 2
    }

    /// Gets the share at the specified row and column.
    pub fn get(&self, row: usize, col: usize) -> Option<&Share> {
        (row < self.width && col < self.width).then(|| &self.shares[row * self.width + col])
    }

    /// Returns the shares of a row.
    pub fn row(&self, row: usize) -> Option<&[Share]> {
        (row < self.width).then(|| {
            let start = row * self.width;
            &self.shares[start..start + self.width]
        })
    }

    /// Returns an iterator over the shares of a column.
    pub fn col(&self, col: usize) -> Option<impl Iterator<Item = &Share>> {
        (col < self.width).then(|| self.shares.iter().skip(col).step_by(self.width))
    }

    /// Returns the shares of line `index` along `axis`.
    pub fn line(&self, axis: Axis, index: usize) -> Option<Vec<Share>> {
        match axis {
            Axis::Row => self.row(index).map(<[Share]>::to_vec),
            Axis::Col => self.col(index).map(|col| col.cloned().collect()),
        }
    }

    /// Returns the shares of a quadrant, row-major.
    pub fn quadrant(&self, quadrant: Quadrant) -> Vec<Share> {
        let k = self.original_width();
        quadrant
            .rows(k)
            .flat_map(|row| {
                let start = row * self.width;
                self.shares[start + quadrant.cols(k).start..start + quadrant.cols(k).end]
                    .iter()
                    .cloned()
            })
            .collect()
    }

    /// The original `k × k` block, row-major.
    pub fn original(&self) -> Vec<Share> {
        self.quadrant(Quadrant::TopLeft)
    }

    /// All shares of the square, row-major.
    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    /// Consume the square, returning its shares row-major.
    pub fn into_shares(self) -> Vec<Share> {
        self.shares
    }
}

/// Integer square root, if `n` is a perfect square.
fn exact_sqrt(n: usize) -> Option<usize> {
    let root = n.isqrt();
    (root * root == n).then_some(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks;
    use rand::{rngs::StdRng, SeedableRng};
    use test_case::test_case;

    #[test]
    fn test_exact_sqrt() {
        assert_eq!(exact_sqrt(0), Some(0));
        assert_eq!(exact_sqrt(1), Some(1));
        assert_eq!(exact_sqrt(2), None);
        assert_eq!(exact_sqrt(16), Some(4));
        assert_eq!(exact_sqrt(17), None);
        assert_eq!(exact_sqrt(65536), Some(256));
        assert_eq!(exact_sqrt(65537), None);
    }

    #[test]
    fn test_quadrant_ranges() {
        assert_eq!(Quadrant::TopLeft.rows(4), 0..4);
        assert_eq!(Quadrant::TopLeft.cols(4), 0..4);
        assert_eq!(Quadrant::TopRight.rows(4), 0..4);
        assert_eq!(Quadrant::TopRight.cols(4), 4..8);
        assert_eq!(Quadrant::BottomLeft.rows(4), 4..8);
        assert_eq!(Quadrant::BottomLeft.cols(4), 0..4);
        assert_eq!(Quadrant::BottomRight.rows(4), 4..8);
        assert_eq!(Quadrant::BottomRight.cols(4), 4..8);
        for (i, quadrant) in Quadrant::ALL.iter().enumerate() {
            assert_eq!(quadrant.index(), i);
        }
    }

    #[test]
    fn test_extend_rejects_non_square() {
        let mut rng = StdRng::seed_from_u64(0);
        let shares = mocks::random_shares(&mut rng, 3);
        assert!(matches!(
            ExtendedDataSquare::extend(shares),
            Err(Error::NotSquare(3))
        ));
        assert!(matches!(
            ExtendedDataSquare::extend(Vec::new()),
            Err(Error::InvalidWidth(0))
        ));
    }

    #[test]
    fn test_from_shares_rejects_odd_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let shares = mocks::random_shares(&mut rng, 9);
        assert!(matches!(
            ExtendedDataSquare::from_shares(shares),
            Err(Error::InvalidWidth(3))
        ));
    }

    #[test_case(1; "k=1")]
    #[test_case(2; "k=2")]
    #[test_case(3; "k=3")]
    #[test_case(8; "k=8")]
    fn test_extend_lines_are_codewords(k: usize) {
        let mut rng = StdRng::seed_from_u64(k as u64);
        let original = mocks::random_shares(&mut rng, k * k);
        let eds = ExtendedDataSquare::extend(original.clone()).unwrap();
        assert_eq!(eds.width(), 2 * k);
        assert_eq!(eds.original(), original);

        for axis in [Axis::Row, Axis::Col] {
            for index in 0..eds.width() {
                let line = eds.line(axis, index).unwrap();
                let parity = coding::encode(&line[..k]).unwrap();
                assert_eq!(&line[k..], parity.as_slice(), "{axis:?} {index}");
            }
        }
    }

    #[test]
    fn test_accessors() {
        let mut rng = StdRng::seed_from_u64(7);
        let eds = mocks::random_eds(&mut rng, 2);
        assert_eq!(eds.get(1, 2), Some(&eds.shares()[6]));
        assert_eq!(eds.get(4, 0), None);
        assert_eq!(eds.row(3).unwrap().len(), 4);
        assert!(eds.row(4).is_none());
        let col: Vec<_> = eds.col(1).unwrap().cloned().collect();
        assert_eq!(col, eds.line(Axis::Col, 1).unwrap());
        assert_eq!(eds.quadrant(Quadrant::BottomRight)[0], eds.get(2, 2).unwrap().clone());
        assert_eq!(coordinates(Axis::Col, 1, 3), (3, 1));
        assert_eq!(leaf_namespace(4, 2, 0, eds.get(2, 0).unwrap()), PARITY_NAMESPACE);
        assert_eq!(
            leaf_namespace(4, 0, 1, eds.get(0, 1).unwrap()),
            eds.get(0, 1).unwrap().namespace()
        );
    }
}
