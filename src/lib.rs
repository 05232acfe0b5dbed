//! An in-memory ordered map backed by a B+ tree.
//!
//! [`BPlusTree`] supports point lookup, insertion, deletion, and
//! bidirectional ordered traversal. Internal nodes hold only separator keys
//! and child links; leaves hold the key/value pairs and are threaded
//! together into a doubly-linked chain, so walking the map in order never
//! has to re-descend from the root. [`Cursor`] walks the chain forward,
//! [`RevCursor`] walks it backward.
//!
//! This crate has no persistence, concurrency, or I/O surface: it is a
//! single-threaded, purely in-memory index. Mutating the tree invalidates
//! any outstanding cursor; dereferencing an invalidated cursor returns
//! [`Error::OutOfRange`] instead of touching freed memory.

mod cursor;
mod error;
mod node;
mod tree;

pub use cursor::{Cursor, RevCursor};
pub use error::Error;
pub use tree::BPlusTree;
