//! Verify a repaired square against its header and prove any inconsistency.
//!
//! # Proving a bad line
//!
//! A square is inconsistent with its header when some line of the repaired square has a root
//! that differs from the committed one. To convince a third party holding only the header, a
//! [ByzantineProof] carries `k` shares of that line, each with an inclusion proof against a
//! committed root. Decoding those shares yields the only codeword through them; if its root
//! differs from the committed root of the line, the committed data cannot be a valid
//! extension.
//!
//! Shares are authenticated in one of two ways:
//! - Against the roots of the crossing lines (columns for a bad row, rows for a bad column)
//!   whose recomputed roots match the header. Their inclusion proofs are built from the
//!   repaired square.
//! - Against the row roots of the sampled quadrant, using the shares that were fetched and the
//!   digest of the half of each sampled row that was not fetched.
//!
//! When every line of the square mismatches and none of them crosses the sampled quadrant,
//! no proof can be built and the result is inconclusive.

use crate::{
    coding,
    header::{self, line_tree, DataAvailabilityHeader},
    nmt::{Node, NodeDigest, Proof, Tree},
    share::Share,
    square::{coordinates, leaf_namespace, Axis, ExtendedDataSquare, Quadrant},
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// The quadrant a square was repaired from, along with what is needed to prove its shares
/// against the row roots.
#[derive(Clone, Debug)]
pub struct Sample {
    pub quadrant: Quadrant,
    /// Digest of the half of each sampled row that was not fetched, in row order.
    pub siblings: Vec<NodeDigest>,
}

/// A share along a bad line and its inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareProof {
    /// Position of the share along the bad line.
    pub position: usize,
    pub share: Share,
    pub proof: Proof,
}

/// Evidence that the data committed to by a header is not a valid extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByzantineProof {
    /// Axis of the bad line.
    pub axis: Axis,
    /// Index of the bad line.
    pub index: usize,
    /// Root of the bad line, as committed to by the header.
    pub root: NodeDigest,
    /// Axis of the roots that authenticate [ByzantineProof::shares].
    ///
    /// When equal to [ByzantineProof::axis], every share is proven against the bad line's
    /// root. Otherwise, each share is proven against the root of the line crossing the bad
    /// line at its position.
    pub proof_axis: Axis,
    pub shares: Vec<ShareProof>,
}

/// Reasons a [ByzantineProof] fails to demonstrate an inconsistency.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("invalid header: {0}")]
    Header(#[from] header::Error),
    #[error("line index out of bounds: {0}")]
    InvalidIndex(usize),
    #[error("root does not match header")]
    RootMismatch,
    #[error("expected {expected} shares, got {actual}")]
    ShareCount { expected: usize, actual: usize },
    #[error("position out of bounds: {0}")]
    InvalidPosition(usize),
    #[error("duplicate position: {0}")]
    DuplicatePosition(usize),
    #[error("invalid inclusion proof at position: {0}")]
    InvalidInclusion(usize),
    #[error("coding error: {0}")]
    Coding(#[from] coding::Error),
    #[error("line is consistent with its root")]
    Consistent,
}

impl ByzantineProof {
    /// Check the proof against `dah`, succeeding only if it demonstrates an inconsistency.
    pub fn verify(&self, dah: &DataAvailabilityHeader) -> Result<(), ProofError> {
        dah.validate(usize::MAX)?;
        let width = dah.width();
        let k = width / 2;
        let root = dah
            .root(self.axis, self.index)
            .ok_or(ProofError::InvalidIndex(self.index))?;
        if *root != self.root {
            return Err(ProofError::RootMismatch);
        }
        if self.shares.len() != k {
            return Err(ProofError::ShareCount {
                expected: k,
                actual: self.shares.len(),
            });
        }

        let mut seen = HashSet::with_capacity(k);
        for ShareProof {
            position,
            share,
            proof,
        } in &self.shares
        {
            if *position >= width {
                return Err(ProofError::InvalidPosition(*position));
            }
            if !seen.insert(*position) {
                return Err(ProofError::DuplicatePosition(*position));
            }

            let (row, col) = coordinates(self.axis, self.index, *position);
            let leaf = Node::Leaf {
                namespace: leaf_namespace(width, row, col, share),
                share: share.clone(),
            }
            .digest();
            let (anchor, leaf_index) = if self.proof_axis == self.axis {
                (root, *position)
            } else {
                let anchor = dah
                    .root(self.proof_axis, *position)
                    .ok_or(ProofError::InvalidPosition(*position))?;
                (anchor, self.index)
            };
            if !proof.verify(anchor, width, leaf_index, &leaf) {
                return Err(ProofError::InvalidInclusion(*position));
            }
        }

        // Rebuild the line and compare against the committed root
        let known: Vec<(usize, &Share)> = self
            .shares
            .iter()
            .map(|share| (share.position, &share.share))
            .collect();
        let line = coding::decode(k, &known)?;
        let tree = Tree::new(line.into_iter().enumerate().map(|(position, share)| {
            let (row, col) = coordinates(self.axis, self.index, position);
            (leaf_namespace(width, row, col, &share), share)
        }));
        if tree.root() == *root {
            return Err(ProofError::Consistent);
        }
        Ok(())
    }
}

/// Outcomes of verification other than success.
#[derive(Debug, Error)]
pub enum Error {
    #[error("byzantine {:?} {}", .0.axis, .0.index)]
    Byzantine(Box<ByzantineProof>),
    #[error("inconclusive: rows {rows:?}, cols {cols:?}")]
    Inconclusive { rows: Vec<usize>, cols: Vec<usize> },
}

struct Detector<'a> {
    eds: &'a ExtendedDataSquare,
    dah: &'a DataAvailabilityHeader,
    sample: &'a Sample,
    row_trees: Vec<Tree>,
    col_trees: Vec<Tree>,
}

impl Detector<'_> {
    fn trees(&self, axis: Axis) -> &[Tree] {
        match axis {
            Axis::Row => &self.row_trees,
            Axis::Col => &self.col_trees,
        }
    }

    fn mismatches(&self, axis: Axis) -> Vec<usize> {
        self.trees(axis)
            .iter()
            .enumerate()
            .filter(|(index, tree)| self.dah.root(axis, *index) != Some(&tree.root()))
            .map(|(index, _)| index)
            .collect()
    }

    fn share(&self, axis: Axis, index: usize, position: usize) -> Option<Share> {
        let (row, col) = coordinates(axis, index, position);
        self.eds.get(row, col).cloned()
    }

    /// Prove line `index` of `axis` using crossing lines that match the header.
    fn prove_by_crossings(&self, axis: Axis, index: usize) -> Option<ByzantineProof> {
        let k = self.eds.original_width();
        let crossing = axis.orthogonal();
        let positions: Vec<usize> = self
            .trees(crossing)
            .iter()
            .enumerate()
            .filter(|(position, tree)| self.dah.root(crossing, *position) == Some(&tree.root()))
            .map(|(position, _)| position)
            .take(k)
            .collect();
        if positions.len() < k {
            return None;
        }

        let shares = positions
            .into_iter()
            .map(|position| {
                let proof = self.trees(crossing)[position].prove(index)?;
                Some(ShareProof {
                    position,
                    share: self.share(axis, index, position)?,
                    proof,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(ByzantineProof {
            axis,
            index,
            root: *self.dah.root(axis, index)?,
            proof_axis: crossing,
            shares,
        })
    }

    /// Prove an inclusion of the share at `col` of sampled `row` against the row root.
    fn prove_sampled(&self, row: usize, col: usize) -> Option<Proof> {
        let k = self.eds.original_width();
        let rows = self.sample.quadrant.rows(k);
        let cols = self.sample.quadrant.cols(k);
        if !rows.contains(&row) || !cols.contains(&col) {
            return None;
        }

        let width = self.eds.width();
        let half = cols
            .clone()
            .map(|c| {
                let share = self.share(Axis::Row, row, c)?;
                Some((leaf_namespace(width, row, c, &share), share))
            })
            .collect::<Option<Vec<_>>>()?;
        let half = Tree::new(half);
        let mut proof = half.prove(col - cols.start)?;
        proof
            .siblings
            .push(*self.sample.siblings.get(row - rows.start)?);
        Some(proof)
    }

    /// Prove line `index` of `axis` using the shares of the sampled quadrant.
    fn prove_by_sample(&self, axis: Axis, index: usize) -> Option<ByzantineProof> {
        let k = self.eds.original_width();
        let quadrant = self.sample.quadrant;
        let positions = match axis {
            Axis::Row if quadrant.rows(k).contains(&index) => quadrant.cols(k),
            Axis::Col if quadrant.cols(k).contains(&index) => quadrant.rows(k),
            _ => return None,
        };

        let shares = positions
            .map(|position| {
                let (row, col) = coordinates(axis, index, position);
                Some(ShareProof {
                    position,
                    share: self.share(axis, index, position)?,
                    proof: self.prove_sampled(row, col)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(ByzantineProof {
            axis,
            index,
            root: *self.dah.root(axis, index)?,
            proof_axis: Axis::Row,
            shares,
        })
    }
}

/// Check every row and column root of `eds` against `dah`.
///
/// On mismatch, bad rows are considered before bad columns, lowest index first, and the
/// first one that can be proven is returned.
pub fn verify(
    eds: &ExtendedDataSquare,
    dah: &DataAvailabilityHeader,
    sample: &Sample,
) -> Result<(), Error> {
    let width = eds.width();
    let detector = Detector {
        eds,
        dah,
        sample,
        row_trees: (0..width).map(|i| line_tree(eds, Axis::Row, i)).collect(),
        col_trees: (0..width).map(|i| line_tree(eds, Axis::Col, i)).collect(),
    };
    let rows = detector.mismatches(Axis::Row);
    let cols = detector.mismatches(Axis::Col);
    if rows.is_empty() && cols.is_empty() {
        return Ok(());
    }
    debug!(?rows, ?cols, "roots mismatch");

    let candidates = rows
        .iter()
        .map(|&index| (Axis::Row, index))
        .chain(cols.iter().map(|&index| (Axis::Col, index)));
    for (axis, index) in candidates {
        let proofs = [
            detector.prove_by_crossings(axis, index),
            detector.prove_by_sample(axis, index),
        ];
        for proof in proofs.into_iter().flatten() {
            match proof.verify(dah) {
                Ok(()) => {
                    warn!(?axis, index, "byzantine data detected");
                    return Err(Error::Byzantine(Box::new(proof)));
                }
                Err(err) => debug!(?axis, index, ?err, "unable to prove line"),
            }
        }
    }
    Err(Error::Inconclusive { rows, cols })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mocks, repair::repair};
    use rand::{rngs::StdRng, SeedableRng};

    /// Sample `quadrant` of `committed`, as a retrieval would.
    fn sample(committed: &ExtendedDataSquare, quadrant: Quadrant) -> Sample {
        let k = committed.original_width();
        let siblings = quadrant
            .rows(k)
            .map(|row| {
                let other = if quadrant.is_right() { 0..k } else { k..2 * k };
                let width = committed.width();
                Tree::new(other.map(|col| {
                    let share = committed.get(row, col).unwrap().clone();
                    (leaf_namespace(width, row, col, &share), share)
                }))
                .root()
            })
            .collect();
        Sample { quadrant, siblings }
    }

    fn check(
        committed: &ExtendedDataSquare,
        quadrant: Quadrant,
    ) -> (DataAvailabilityHeader, Result<(), Error>) {
        let k = committed.original_width();
        let dah = DataAvailabilityHeader::from_eds(committed);
        let repaired = repair(quadrant, k, committed.quadrant(quadrant)).unwrap();
        let result = verify(&repaired, &dah, &sample(committed, quadrant));
        (dah, result)
    }

    #[test]
    fn test_valid_square() {
        let mut rng = StdRng::seed_from_u64(0);
        for k in [1, 2, 5] {
            let eds = mocks::random_eds(&mut rng, k);
            for quadrant in Quadrant::ALL {
                let (_, result) = check(&eds, quadrant);
                assert!(result.is_ok(), "k={k} {quadrant:?}");
            }
        }
    }

    #[test]
    fn test_single_corruption_from_every_quadrant() {
        let mut rng = StdRng::seed_from_u64(1);
        let k = 8;
        let eds = mocks::random_eds(&mut rng, k);
        let corrupted = mocks::corrupt(&eds, 0, 14, 15);
        for quadrant in Quadrant::ALL {
            let (dah, result) = check(&corrupted, quadrant);
            let Err(Error::Byzantine(proof)) = result else {
                panic!("expected byzantine for {quadrant:?}");
            };
            assert!(
                matches!((proof.axis, proof.index), (Axis::Row, 0) | (Axis::Col, 14)),
                "{quadrant:?}: {:?} {}",
                proof.axis,
                proof.index
            );
            proof.verify(&dah).unwrap();

            // Proofs do not hold against the honest header
            let honest = DataAvailabilityHeader::from_eds(&eds);
            assert!(proof.verify(&honest).is_err());
        }
    }

    #[test]
    fn test_corruption_outside_sample() {
        let mut rng = StdRng::seed_from_u64(2);
        let k = 4;
        let eds = mocks::random_eds(&mut rng, k);

        // Corrupt the bottom-right quadrant, sample the top-left
        let corrupted = mocks::corrupt(&eds, 6, 5, 4);
        let (dah, result) = check(&corrupted, Quadrant::TopLeft);
        let Err(Error::Byzantine(proof)) = result else {
            panic!("expected byzantine");
        };
        assert_eq!((proof.axis, proof.index), (Axis::Row, 6));
        assert_eq!(proof.proof_axis, Axis::Col);
        proof.verify(&dah).unwrap();
    }

    #[test]
    fn test_many_corruptions_proven_from_sample() {
        let mut rng = StdRng::seed_from_u64(3);
        let k = 4;
        let eds = mocks::random_eds(&mut rng, k);

        // Replace every share outside of the top-left quadrant
        let width = eds.width();
        let garbage = mocks::random_shares(&mut rng, width * width);
        let shares = eds
            .shares()
            .iter()
            .enumerate()
            .map(|(i, share)| {
                let (row, col) = (i / width, i % width);
                if row < k && col < k {
                    share.clone()
                } else {
                    garbage[i].clone()
                }
            })
            .collect();
        let corrupted = ExtendedDataSquare::from_shares(shares).unwrap();
        let (dah, result) = check(&corrupted, Quadrant::TopLeft);
        let Err(Error::Byzantine(proof)) = result else {
            panic!("expected byzantine");
        };
        assert_eq!((proof.axis, proof.index), (Axis::Row, 0));
        assert_eq!(proof.proof_axis, Axis::Row);
        proof.verify(&dah).unwrap();
    }

    #[test]
    fn test_proof_rejects_tampering() {
        let mut rng = StdRng::seed_from_u64(4);
        let k = 4;
        let eds = mocks::random_eds(&mut rng, k);
        let corrupted = mocks::corrupt(&eds, 2, 1, 0);
        let (dah, result) = check(&corrupted, Quadrant::BottomRight);
        let Err(Error::Byzantine(proof)) = result else {
            panic!("expected byzantine");
        };
        proof.verify(&dah).unwrap();

        let mut short = proof.clone();
        short.shares.pop();
        assert!(matches!(
            short.verify(&dah),
            Err(ProofError::ShareCount { .. })
        ));

        let mut duplicate = proof.clone();
        duplicate.shares[1] = duplicate.shares[0].clone();
        assert!(matches!(
            duplicate.verify(&dah),
            Err(ProofError::DuplicatePosition(_))
        ));

        let mut swapped = proof.clone();
        swapped.shares[0].share = mocks::random_shares(&mut rng, 1).pop().unwrap();
        assert!(matches!(
            swapped.verify(&dah),
            Err(ProofError::InvalidInclusion(_))
        ));

        let mut wrong_root = proof.clone();
        wrong_root.index = (proof.index + 1) % (2 * k);
        assert!(matches!(
            wrong_root.verify(&dah),
            Err(ProofError::RootMismatch) | Err(ProofError::InvalidInclusion(_))
        ));
    }

    #[test]
    fn test_inconclusive_without_authenticated_shares() {
        let mut rng = StdRng::seed_from_u64(5);
        let k = 2;
        let eds = mocks::random_eds(&mut rng, k);
        let other = mocks::random_eds(&mut rng, k);

        // A header for entirely different data, with no sampled siblings to prove against
        let dah = DataAvailabilityHeader::from_eds(&other);
        let sample = Sample {
            quadrant: Quadrant::TopLeft,
            siblings: Vec::new(),
        };
        let result = verify(&eds, &dah, &sample);
        assert!(matches!(
            result,
            Err(Error::Inconclusive { rows, cols }) if rows.len() == 4 && cols.len() == 4
        ));
    }
}
