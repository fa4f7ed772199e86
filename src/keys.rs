//! Byte-level layout of the four keyspaces `NodeDb` maintains in the backend.
//! Mirrors spec.md §6 exactly; the prefix bytes themselves are an arbitrary
//! but stable choice (any injective, order-preserving-within-namespace
//! scheme works).

use crate::hash::Hash;

const NODE_PREFIX: u8 = b'n';
const ROOT_PREFIX: u8 = b'r';
const ORPHAN_PREFIX: u8 = b'o';
const FAST_NODE_PREFIX: u8 = b'f';

pub fn node_key(hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 32);
    key.push(NODE_PREFIX);
    key.extend_from_slice(hash.as_bytes());
    key
}

pub fn root_key(version: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8);
    key.push(ROOT_PREFIX);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

pub fn root_prefix() -> Vec<u8> {
    vec![ROOT_PREFIX]
}

pub fn root_range_end() -> Vec<u8> {
    vec![ROOT_PREFIX + 1]
}

pub fn decode_root_key(key: &[u8]) -> u64 {
    u64::from_be_bytes(key[1..9].try_into().expect("root key must be 9 bytes"))
}

/// `o/<be64 toVersion>/<be64 fromVersion>/<hash>`
pub fn orphan_key(to_version: u64, from_version: u64, hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + 8 + 32);
    key.push(ORPHAN_PREFIX);
    key.extend_from_slice(&to_version.to_be_bytes());
    key.extend_from_slice(&from_version.to_be_bytes());
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Range covering every orphan record whose `toVersion == version`.
pub fn orphan_range_for_to_version(version: u64) -> (Vec<u8>, Vec<u8>) {
    let mut start = Vec::with_capacity(1 + 8);
    start.push(ORPHAN_PREFIX);
    start.extend_from_slice(&version.to_be_bytes());

    let mut end = Vec::with_capacity(1 + 8);
    end.push(ORPHAN_PREFIX);
    end.extend_from_slice(&(version + 1).to_be_bytes());

    (start, end)
}

/// Range covering every orphan record for a given hash under a known
/// `fromVersion`, scanning across all `toVersion` values. Used by `unorphan`.
pub fn orphan_range_for_hash(from_version: u64, hash: &Hash) -> (Vec<u8>, Vec<u8>) {
    // orphan keys are ordered by toVersion first, so a hash can appear at any
    // toVersion >= fromVersion; scan the whole orphan keyspace and filter by
    // decoding each candidate (done by the caller).
    let _ = (from_version, hash);
    (vec![ORPHAN_PREFIX], vec![ORPHAN_PREFIX + 1])
}

pub fn decode_orphan_key(key: &[u8]) -> (u64, u64, Hash) {
    let to_version = u64::from_be_bytes(key[1..9].try_into().expect("orphan key malformed"));
    let from_version = u64::from_be_bytes(key[9..17].try_into().expect("orphan key malformed"));
    let hash = Hash::try_from(&key[17..49]).expect("orphan key malformed");
    (to_version, from_version, hash)
}

pub fn fast_node_key(user_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + user_key.len());
    key.push(FAST_NODE_PREFIX);
    key.extend_from_slice(user_key);
    key
}

pub fn fast_node_prefix() -> Vec<u8> {
    vec![FAST_NODE_PREFIX]
}

pub fn fast_node_range_end() -> Vec<u8> {
    vec![FAST_NODE_PREFIX + 1]
}

pub fn decode_fast_node_user_key(key: &[u8]) -> Vec<u8> {
    key[1..].to_vec()
}
