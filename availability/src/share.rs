//! Fixed-size, namespace-prefixed units of data.

use bytes::Bytes;
use thiserror::Error;

/// Size of a [Share] in bytes.
pub const SHARE_SIZE: usize = 512;

/// Size of a [Namespace] in bytes.
pub const NAMESPACE_SIZE: usize = 8;

/// Identifies the application a [Share] belongs to.
pub type Namespace = [u8; NAMESPACE_SIZE];

/// Namespace assigned to every share outside of the original quadrant when it is
/// inserted into a tree.
pub const PARITY_NAMESPACE: Namespace = [0xff; NAMESPACE_SIZE];

/// Errors that can occur when constructing a [Share].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid share size: {0}")]
    InvalidSize(usize),
}

/// The smallest addressable unit of data in a square: `namespace || payload`.
///
/// Cloning is cheap, the underlying bytes are reference counted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Share(Bytes);

impl Share {
    /// Wrap `data` as a share, rejecting anything that is not exactly [SHARE_SIZE] bytes.
    pub fn new(data: impl Into<Bytes>) -> Result<Self, Error> {
        let data = data.into();
        if data.len() != SHARE_SIZE {
            return Err(Error::InvalidSize(data.len()));
        }
        Ok(Self(data))
    }

    /// Build a share from a namespace and a payload of `SHARE_SIZE - NAMESPACE_SIZE` bytes.
    pub fn with_namespace(namespace: &Namespace, payload: &[u8]) -> Result<Self, Error> {
        let mut data = Vec::with_capacity(NAMESPACE_SIZE + payload.len());
        data.extend_from_slice(namespace);
        data.extend_from_slice(payload);
        Self::new(data)
    }

    /// The namespace prefix of the share.
    pub fn namespace(&self) -> Namespace {
        let mut namespace = [0u8; NAMESPACE_SIZE];
        namespace.copy_from_slice(&self.0[..NAMESPACE_SIZE]);
        namespace
    }

    /// The bytes following the namespace.
    pub fn payload(&self) -> &[u8] {
        &self.0[NAMESPACE_SIZE..]
    }

    /// The raw bytes of the share.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl AsRef<[u8]> for Share {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_size() {
        assert_eq!(
            Share::new(vec![0u8; SHARE_SIZE - 1]),
            Err(Error::InvalidSize(SHARE_SIZE - 1))
        );
        assert_eq!(
            Share::new(vec![0u8; SHARE_SIZE + 1]),
            Err(Error::InvalidSize(SHARE_SIZE + 1))
        );
        assert!(Share::new(vec![0u8; SHARE_SIZE]).is_ok());
    }

    #[test]
    fn test_share_namespace() {
        let namespace = [1, 2, 3, 4, 5, 6, 7, 8];
        let payload = vec![9u8; SHARE_SIZE - NAMESPACE_SIZE];
        let share = Share::with_namespace(&namespace, &payload).unwrap();
        assert_eq!(share.namespace(), namespace);
        assert_eq!(share.payload(), payload.as_slice());
        assert_eq!(share.as_ref().len(), SHARE_SIZE);
    }
}
