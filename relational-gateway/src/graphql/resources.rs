//! The entity surface of the API: users, posts and comments.
//!
//! Each entity module defines the entity's response type, its projection policy, and a
//! stateless resolver set generic over the storage handle. Resolvers are leaves: the policy
//! table in [`policy`](super::policy) decides which middleware chain each one runs behind, and
//! the execution layer supplies the current field's
//! [`SelectionDescriptor`](super::projection::SelectionDescriptor).

pub mod comment;
pub mod post;
pub mod user;

/// Offset pagination arguments shared by every list resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows to return.
    pub first: usize,
    /// Number of rows to skip.
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            first: 10,
            offset: 0,
        }
    }
}

impl Page {
    /// The first `first` rows starting at `offset`.
    pub fn new(first: usize, offset: usize) -> Self {
        Self { first, offset }
    }
}
