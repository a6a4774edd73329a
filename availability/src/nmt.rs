//! A namespaced Merkle tree over a line of shares.
//!
//! Every node commits to the range of namespaces found beneath it. A node's digest is
//! `min || max || sha256(bytes)`, where the bytes of a node are:
//!
//! ```text
//! leaf:  0x00 || namespace || share
//! inner: 0x01 || left digest || right digest
//! ```
//!
//! The sha256 component of a digest is the node's [Id]: the key under which its bytes are
//! kept in a content-addressed store. A row root in a header is therefore also the address of
//! the row's root node, from which the whole row can be walked.
//!
//! A subtree over `n > 1` leaves splits them at `ceil(n / 2)`. For a line of even width this
//! makes each half of the line a direct child of the root.

use crate::share::{Namespace, Share, NAMESPACE_SIZE, SHARE_SIZE};
use bytes::{Buf, BufMut};
use commonware_codec::{Encode, EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;

/// Size of an [Id] in bytes.
pub const ID_SIZE: usize = 32;

/// Content address of a node.
pub type Id = [u8; ID_SIZE];

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;

/// Commitment to a subtree: its namespace range and hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeDigest {
    pub min: Namespace,
    pub max: Namespace,
    pub hash: Id,
}

impl Write for NodeDigest {
    fn write(&self, buf: &mut impl BufMut) {
        self.min.write(buf);
        self.max.write(buf);
        self.hash.write(buf);
    }
}

impl Read for NodeDigest {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        Ok(Self {
            min: Namespace::read(buf)?,
            max: Namespace::read(buf)?,
            hash: Id::read(buf)?,
        })
    }
}

impl FixedSize for NodeDigest {
    const SIZE: usize = 2 * NAMESPACE_SIZE + ID_SIZE;
}

/// A node of the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Leaf { namespace: Namespace, share: Share },
    Inner { left: NodeDigest, right: NodeDigest },
}

impl Write for Node {
    fn write(&self, buf: &mut impl BufMut) {
        match self {
            Self::Leaf { namespace, share } => {
                LEAF_PREFIX.write(buf);
                namespace.write(buf);
                buf.put_slice(share.as_ref());
            }
            Self::Inner { left, right } => {
                INNER_PREFIX.write(buf);
                left.write(buf);
                right.write(buf);
            }
        }
    }
}

impl Read for Node {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        match u8::read(buf)? {
            LEAF_PREFIX => {
                let namespace = Namespace::read(buf)?;
                if buf.remaining() < SHARE_SIZE {
                    return Err(Error::EndOfBuffer);
                }
                let share = Share::new(buf.copy_to_bytes(SHARE_SIZE))
                    .map_err(|_| Error::Invalid("Node", "invalid share"))?;
                Ok(Self::Leaf { namespace, share })
            }
            INNER_PREFIX => Ok(Self::Inner {
                left: NodeDigest::read(buf)?,
                right: NodeDigest::read(buf)?,
            }),
            _ => Err(Error::Invalid("Node", "unknown prefix")),
        }
    }
}

impl EncodeSize for Node {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Leaf { .. } => NAMESPACE_SIZE + SHARE_SIZE,
                Self::Inner { .. } => 2 * NodeDigest::SIZE,
            }
    }
}

impl Node {
    /// Compute the digest of the node.
    pub fn digest(&self) -> NodeDigest {
        let hash = id(&self.encode());
        match self {
            Self::Leaf { namespace, .. } => NodeDigest {
                min: *namespace,
                max: *namespace,
                hash,
            },
            Self::Inner { left, right } => NodeDigest {
                min: left.min.min(right.min),
                max: left.max.max(right.max),
                hash,
            },
        }
    }
}

/// Content address of encoded node bytes.
pub fn id(bytes: &[u8]) -> Id {
    Sha256::digest(bytes).into()
}

/// Index at which a subtree over `n > 1` leaves is split.
pub(crate) fn split(n: usize) -> usize {
    n.div_ceil(2)
}

/// Inclusion proof for a single leaf, siblings ordered from the leaf up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub siblings: Vec<NodeDigest>,
}

impl Proof {
    /// Verify that `leaf` is at `index` of a tree with `width` leaves and the given `root`.
    pub fn verify(&self, root: &NodeDigest, width: usize, index: usize, leaf: &NodeDigest) -> bool {
        if index >= width {
            return false;
        }

        // Walk down to find which side the leaf falls on at each level
        let mut sides = Vec::with_capacity(self.siblings.len());
        let (mut start, mut end) = (0, width);
        while end - start > 1 {
            let mid = start + split(end - start);
            if index < mid {
                sides.push(true);
                end = mid;
            } else {
                sides.push(false);
                start = mid;
            }
        }
        if sides.len() != self.siblings.len() {
            return false;
        }

        // Fold back up
        let mut current = *leaf;
        for (is_left, sibling) in sides.iter().rev().zip(&self.siblings) {
            let node = if *is_left {
                Node::Inner {
                    left: current,
                    right: *sibling,
                }
            } else {
                Node::Inner {
                    left: *sibling,
                    right: current,
                }
            };
            current = node.digest();
        }
        current == *root
    }
}

/// A tree built over a line of leaves.
pub struct Tree {
    width: usize,
    leaves: Vec<Node>,
    inner: Vec<Node>,
    digests: HashMap<(usize, usize), NodeDigest>,
    root: NodeDigest,
}

impl Tree {
    /// Build a tree over `(namespace, share)` leaves.
    ///
    /// # Panics
    ///
    /// Panics if no leaves are provided.
    pub fn new(leaves: impl IntoIterator<Item = (Namespace, Share)>) -> Self {
        let leaves: Vec<Node> = leaves
            .into_iter()
            .map(|(namespace, share)| Node::Leaf { namespace, share })
            .collect();
        assert!(!leaves.is_empty(), "tree must have at least one leaf");

        let width = leaves.len();
        let mut digests = HashMap::with_capacity(2 * width);
        let mut inner = Vec::with_capacity(width - 1);
        let leaf_digests: Vec<NodeDigest> = leaves.iter().map(Node::digest).collect();
        let root = Self::build(&leaf_digests, 0, &mut digests, &mut inner);
        Self {
            width,
            leaves,
            inner,
            digests,
            root,
        }
    }

    fn build(
        leaves: &[NodeDigest],
        offset: usize,
        digests: &mut HashMap<(usize, usize), NodeDigest>,
        inner: &mut Vec<Node>,
    ) -> NodeDigest {
        let digest = if leaves.len() == 1 {
            leaves[0]
        } else {
            let mid = split(leaves.len());
            let left = Self::build(&leaves[..mid], offset, digests, inner);
            let right = Self::build(&leaves[mid..], offset + mid, digests, inner);
            let node = Node::Inner { left, right };
            let digest = node.digest();
            inner.push(node);
            digest
        };
        digests.insert((offset, offset + leaves.len()), digest);
        digest
    }

    /// Number of leaves.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Root of the tree.
    pub fn root(&self) -> NodeDigest {
        self.root
    }

    /// Digest of the leaf at `index`.
    pub fn leaf(&self, index: usize) -> Option<NodeDigest> {
        self.digests.get(&(index, index + 1)).copied()
    }

    /// Every node of the tree (leaves first), for insertion into a store.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.leaves.iter().chain(self.inner.iter())
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn prove(&self, index: usize) -> Option<Proof> {
        if index >= self.width {
            return None;
        }
        let mut siblings = Vec::new();
        let (mut start, mut end) = (0, self.width);
        while end - start > 1 {
            let mid = start + split(end - start);
            if index < mid {
                siblings.push(self.digests[&(mid, end)]);
                end = mid;
            } else {
                siblings.push(self.digests[&(start, mid)]);
                start = mid;
            }
        }
        siblings.reverse();
        Some(Proof { siblings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mocks, share::PARITY_NAMESPACE};
    use bytes::Bytes;
    use commonware_codec::DecodeExt;
    use rand::{rngs::StdRng, SeedableRng};

    fn leaves(rng: &mut StdRng, n: usize) -> Vec<(Namespace, Share)> {
        mocks::random_shares(rng, n)
            .into_iter()
            .map(|share| (share.namespace(), share))
            .collect()
    }

    #[test]
    fn test_node_codec() {
        let mut rng = StdRng::seed_from_u64(0);
        let tree = Tree::new(leaves(&mut rng, 4));
        for node in tree.nodes() {
            let encoded = node.encode();
            assert_eq!(encoded.len(), node.encode_size());
            assert_eq!(Node::decode(encoded.clone()).unwrap(), *node);
            assert_eq!(node.digest().hash, id(&encoded));
        }
        assert_eq!(tree.nodes().count(), 7);

        let digest = tree.root();
        let encoded = digest.encode();
        assert_eq!(encoded.len(), NodeDigest::SIZE);
        assert_eq!(NodeDigest::decode(encoded).unwrap(), digest);
    }

    #[test]
    fn test_node_decode_errors() {
        assert!(matches!(Node::decode(Bytes::new()), Err(Error::EndOfBuffer)));
        assert!(matches!(
            Node::decode(&[7, 1, 2][..]),
            Err(Error::Invalid("Node", "unknown prefix"))
        ));
        assert!(matches!(
            Node::decode(&[INNER_PREFIX, 1, 2][..]),
            Err(Error::EndOfBuffer)
        ));
        assert!(matches!(
            Node::decode(&[LEAF_PREFIX][..]),
            Err(Error::EndOfBuffer)
        ));

        // A leaf truncated inside its share
        let mut leaf = vec![LEAF_PREFIX];
        leaf.extend_from_slice(&[0u8; NAMESPACE_SIZE + SHARE_SIZE - 1]);
        assert!(matches!(Node::decode(&leaf[..]), Err(Error::EndOfBuffer)));

        // Trailing bytes after a complete node
        let mut inner = vec![INNER_PREFIX];
        inner.extend_from_slice(&[0u8; 2 * NodeDigest::SIZE + 1]);
        assert!(matches!(Node::decode(&inner[..]), Err(Error::ExtraData(1))));
    }

    #[test]
    fn test_namespace_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut line = leaves(&mut rng, 2);
        line.sort_by_key(|(namespace, _)| *namespace);
        let (first, last) = (line[0].0, line[1].0);
        let parity = mocks::random_shares(&mut rng, 2);
        line.extend(parity.into_iter().map(|share| (PARITY_NAMESPACE, share)));

        let root = Tree::new(line).root();
        assert_eq!(root.min, first);
        assert_eq!(root.max, PARITY_NAMESPACE);
        assert!(first <= last);
    }

    #[test]
    fn test_root_changes_with_leaf() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut line = leaves(&mut rng, 6);
        let root = Tree::new(line.clone()).root();
        line[3].1 = mocks::random_shares(&mut rng, 1).pop().unwrap();
        assert_ne!(Tree::new(line).root(), root);
    }

    #[test]
    fn test_halves_are_children_of_root() {
        let mut rng = StdRng::seed_from_u64(3);
        for width in [2, 4, 6, 10, 16] {
            let line = leaves(&mut rng, width);
            let full = Tree::new(line.clone());
            let left = Tree::new(line[..width / 2].to_vec());
            let right = Tree::new(line[width / 2..].to_vec());
            let expected = Node::Inner {
                left: left.root(),
                right: right.root(),
            };
            assert_eq!(full.root(), expected.digest(), "width {width}");
        }
    }

    #[test]
    fn test_proofs() {
        let mut rng = StdRng::seed_from_u64(4);
        for width in [1, 2, 3, 5, 8, 12] {
            let tree = Tree::new(leaves(&mut rng, width));
            let root = tree.root();
            for index in 0..width {
                let proof = tree.prove(index).unwrap();
                let leaf = tree.leaf(index).unwrap();
                assert!(proof.verify(&root, width, index, &leaf));

                // Wrong position, width or leaf must fail
                if width > 1 {
                    let other = (index + 1) % width;
                    assert!(!proof.verify(&root, width, other, &leaf));
                    assert!(!proof.verify(&root, width, index, &tree.leaf(other).unwrap()));
                }
                assert!(!proof.verify(&root, width, width, &leaf));
            }
            assert!(tree.prove(width).is_none());
        }
    }
}
