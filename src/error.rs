use thiserror::Error as ThisError;

/// Errors produced by [`crate::BPlusTree`] and its cursors.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Raised by `at()` for a missing key, and by cursor accessors applied to
    /// a past-the-end (or past-the-start) cursor.
    #[error("key or cursor position is out of range")]
    OutOfRange,

    /// Raised by `BPlusTree::new` when the requested branching factor is
    /// too small to hold a valid node (`M < 3`).
    #[error("branching factor {branching_factor} is too small, must be >= 3")]
    ConfigError { branching_factor: usize },

    /// A lookup that was just guaranteed by an insert failed to find the
    /// key. This indicates a bug in the tree itself, never an expected
    /// runtime condition.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),
}
