use {
    blake3::Hasher,
    std::{array::TryFromSliceError, fmt},
};

pub const HASH_LEN: usize = blake3::OUT_LEN;

/// The `blake3::Hash` type doesn't give us a compact `[u8; 32]`-shaped value
/// we can freely embed in our own structs and use as a map key, so we wrap it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_LEN]);

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<blake3::Hash> for Hash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; HASH_LEN]>::try_from(bytes).map(Self)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Hash {
    pub fn into_bytes(self) -> [u8; HASH_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Hash a node's canonical encoding, the same prefix-and-length-prefixed
/// scheme the teacher uses for its leaf/internal node hashes, generalized to
/// the AVL node shape: height, size, version, key, and either the value
/// (leaf) or the two children's hashes (inner).
pub(crate) fn hasher() -> Hasher {
    Hasher::new()
}
