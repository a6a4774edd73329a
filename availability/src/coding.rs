//! Reed-Solomon coding of a single row or column of a square.
//!
//! A line of width `2k` holds `k` original shares followed by `k` parity shares. Any `k`
//! shares of a line (at known positions) determine the rest.

use crate::share::{self, Share, SHARE_SIZE};
use bytes::Bytes;
use reed_solomon_simd::{Error as RsError, ReedSolomonDecoder, ReedSolomonEncoder};
use thiserror::Error;

/// Errors that can occur when encoding or decoding a line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameters")]
    InvalidParameters,
    #[error("reed-solomon error: {0}")]
    ReedSolomon(#[from] RsError),
    #[error("not enough shares: {0}")]
    NotEnoughShares(usize),
    #[error("duplicate index: {0}")]
    DuplicateIndex(usize),
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),
    #[error("share error: {0}")]
    Share(#[from] share::Error),
    #[error("missing restored share: {0}")]
    MissingShare(usize),
}

/// Compute the `k` parity shares for `k` original shares.
pub fn encode(originals: &[Share]) -> Result<Vec<Share>, Error> {
    let k = originals.len();
    if k == 0 {
        return Err(Error::InvalidParameters);
    }
    let mut encoder = ReedSolomonEncoder::new(k, k, SHARE_SIZE)?;
    for share in originals {
        encoder.add_original_shard(share)?;
    }
    let result = encoder.encode()?;
    result
        .recovery_iter()
        .map(|shard| Share::new(Bytes::copy_from_slice(shard)).map_err(Error::from))
        .collect()
}

/// Reconstruct a full line of width `2k` from exactly `k` shares at distinct positions.
///
/// Known shares are returned unchanged at their positions.
pub fn decode(k: usize, known: &[(usize, &Share)]) -> Result<Vec<Share>, Error> {
    if k == 0 {
        return Err(Error::InvalidParameters);
    }
    if known.len() < k {
        return Err(Error::NotEnoughShares(known.len()));
    }

    let width = 2 * k;
    let mut line: Vec<Option<Share>> = vec![None; width];
    for (index, share) in known.iter().take(k) {
        if *index >= width {
            return Err(Error::IndexOutOfBounds(*index));
        }
        if line[*index].is_some() {
            return Err(Error::DuplicateIndex(*index));
        }
        line[*index] = Some((*share).clone());
    }

    // Restore any missing originals
    if line[..k].iter().any(Option::is_none) {
        let mut decoder = ReedSolomonDecoder::new(k, k, SHARE_SIZE)?;
        for (index, share) in line.iter().enumerate() {
            let Some(share) = share else {
                continue;
            };
            if index < k {
                decoder.add_original_shard(index, share)?;
            } else {
                decoder.add_recovery_shard(index - k, share)?;
            }
        }
        let result = decoder.decode()?;
        for (index, shard) in result.restored_original_iter() {
            line[index] = Some(Share::new(Bytes::copy_from_slice(shard))?);
        }
    }
    let originals = line[..k]
        .iter()
        .enumerate()
        .map(|(index, share)| share.clone().ok_or(Error::MissingShare(index)))
        .collect::<Result<Vec<_>, _>>()?;

    // Derive parity from the (restored) originals
    let parity = encode(&originals)?;
    for (index, share) in parity.into_iter().enumerate() {
        line[k + index].get_or_insert(share);
    }
    line.into_iter()
        .enumerate()
        .map(|(index, share)| share.ok_or(Error::MissingShare(index)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_encode_empty() {
        assert!(matches!(encode(&[]), Err(Error::InvalidParameters)));
    }

    #[test]
    fn test_decode_from_any_half() {
        let mut rng = StdRng::seed_from_u64(0);
        let k = 4;
        let originals = mocks::random_shares(&mut rng, k);
        let mut line = originals.clone();
        line.extend(encode(&originals).unwrap());

        for positions in [
            vec![0, 1, 2, 3],
            vec![4, 5, 6, 7],
            vec![0, 2, 5, 7],
            vec![7, 1, 4, 2],
        ] {
            let known: Vec<_> = positions.iter().map(|&i| (i, &line[i])).collect();
            let decoded = decode(k, &known).unwrap();
            assert_eq!(decoded, line, "positions {positions:?}");
        }
    }

    #[test]
    fn test_decode_single_original() {
        let mut rng = StdRng::seed_from_u64(1);
        let originals = mocks::random_shares(&mut rng, 1);
        let parity = encode(&originals).unwrap();
        let decoded = decode(1, &[(1, &parity[0])]).unwrap();
        assert_eq!(decoded[0], originals[0]);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let mut rng = StdRng::seed_from_u64(2);
        let shares = mocks::random_shares(&mut rng, 2);
        assert!(matches!(
            decode(2, &[(0, &shares[0])]),
            Err(Error::NotEnoughShares(1))
        ));
        assert!(matches!(
            decode(2, &[(0, &shares[0]), (0, &shares[1])]),
            Err(Error::DuplicateIndex(0))
        ));
        assert!(matches!(
            decode(2, &[(0, &shares[0]), (4, &shares[1])]),
            Err(Error::IndexOutOfBounds(4))
        ));
    }
}
