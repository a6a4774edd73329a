//! Reconstruct a full square from any one of its quadrants.

use crate::{
    coding,
    share::Share,
    square::{self, ExtendedDataSquare, Quadrant},
};
use thiserror::Error;

/// Errors that can occur during repair.
#[derive(Debug, Error)]
pub enum Error {
    #[error("expected {expected} shares, got {actual}")]
    ShareCount { expected: usize, actual: usize },
    #[error("coding error: {0}")]
    Coding(#[from] coding::Error),
    #[error("square error: {0}")]
    Square(#[from] square::Error),
}

/// Decode the original half of each line from its parity half.
///
/// `lines` holds `k` parity shares per line. Returns the `k` original shares of each line.
fn recover_originals(k: usize, lines: Vec<Vec<Share>>) -> Result<Vec<Vec<Share>>, Error> {
    lines
        .into_iter()
        .map(|parity| {
            let known: Vec<(usize, &Share)> = parity
                .iter()
                .enumerate()
                .map(|(i, share)| (k + i, share))
                .collect();
            let mut line = coding::decode(k, &known)?;
            line.truncate(k);
            Ok(line)
        })
        .collect()
}

/// Split a row-major `k × k` block into rows.
fn rows(k: usize, shares: Vec<Share>) -> Vec<Vec<Share>> {
    shares.chunks(k).map(<[Share]>::to_vec).collect()
}

/// Transpose a `k × k` block given as rows.
fn transpose(rows: Vec<Vec<Share>>) -> Vec<Vec<Share>> {
    let k = rows.len();
    (0..k)
        .map(|col| rows.iter().map(|row| row[col].clone()).collect())
        .collect()
}

/// Reconstruct the square from the `k × k` shares (row-major) of `quadrant`.
///
/// The original quadrant is recovered algebraically and then re-extended, so the returned
/// square always contains `shares` unchanged at the position of `quadrant`.
pub fn repair(
    quadrant: Quadrant,
    k: usize,
    shares: Vec<Share>,
) -> Result<ExtendedDataSquare, Error> {
    if k == 0 || shares.len() != k * k {
        return Err(Error::ShareCount {
            expected: k * k,
            actual: shares.len(),
        });
    }

    let original = match quadrant {
        Quadrant::TopLeft => rows(k, shares),
        // Each top row is [original | parity]
        Quadrant::TopRight => recover_originals(k, rows(k, shares))?,
        // Each left column is [original ; parity]
        Quadrant::BottomLeft => transpose(recover_originals(k, transpose(rows(k, shares)))?),
        // Each bottom row is [bottom-left | parity], then each left column as above
        Quadrant::BottomRight => {
            let bottom_left = recover_originals(k, rows(k, shares))?;
            transpose(recover_originals(k, transpose(bottom_left))?)
        }
    };

    Ok(ExtendedDataSquare::extend(
        original.into_iter().flatten().collect(),
    )?)
}
