//! A versioned, authenticated key-value store on an AVL-balanced Merkle
//! tree.
//!
//! [`VersionedTree`] is the entry point: open one over a [`Backend`], read
//! and write the working copy with [`get`](VersionedTree::get) /
//! [`set`](VersionedTree::set) / [`remove`](VersionedTree::remove), and
//! [`save_version`](VersionedTree::save_version) to commit it as the next
//! immutable, content-addressed version. Past versions stay readable via
//! [`get_versioned`](VersionedTree::get_versioned) until
//! [`delete_version`](VersionedTree::delete_version) reclaims them.

mod avl;
pub mod backend;
pub mod error;
mod fast_iterator;
mod hash;
mod keys;
mod mutable_tree;
mod node;
mod node_db;
mod orphaning_tree;
mod proof;
pub mod unsaved_fast_iterator;
mod versioned_tree;

pub use {
    backend::{Backend, BackendIterator, MemBackend, WriteBatch},
    error::{Error, Result},
    hash::Hash,
    node::Node,
    proof::{verify_membership, Proof, ProofStep},
    versioned_tree::VersionedTree,
};

#[cfg(feature = "redb")]
pub use backend::RedbBackend;

#[cfg(feature = "debug")]
pub use node_db::NodeDb;
