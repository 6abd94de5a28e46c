//! Computation of minimal storage projections from client selection sets.
//!
//! For every read, the gateway fetches exactly the columns the response needs: the fields the
//! client selected at the immediate level of the returned type, plus the columns later resolver
//! stages depend on, minus the selection entries that are relations rather than physical
//! columns. This matters because some entities carry large binary payloads (user avatar
//! photos) which must never be fetched unless explicitly requested.

use itertools::Itertools;
use std::collections::HashSet;

/// The field names the client selected for the current object type at the current nesting
/// level.
///
/// Derived per call; nested selections on relation fields are not part of it, since those are
/// satisfied by separate resolver invocations rather than by this projection. Field names are
/// kept in selection order, first occurrence wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionDescriptor {
    fields: Vec<String>,
}

impl SelectionDescriptor {
    /// A descriptor for the given field names, deduplicated in selection order.
    pub fn new<I>(fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).unique().collect(),
        }
    }

    /// The immediate child field names of the field currently being resolved.
    ///
    /// This is the bridge to the external query-execution layer: it enumerates the current
    /// field's selection set without recursing into relation fields.
    pub fn from_context(ctx: &async_graphql::Context<'_>) -> Self {
        Self::new(ctx.field().selection_set().map(|field| field.name()))
    }

    /// The selected field names, in selection order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Per-entity projection policy.
///
/// `keep` lists columns that must always be fetched, typically the primary key, because a later
/// resolver stage reads them even when the client did not select them. `exclude` lists
/// selection entries that are relations resolved by separate lookups, not physical columns;
/// forwarding one of them to storage would be a storage-layer error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProjectionOptions {
    keep: &'static [&'static str],
    exclude: &'static [&'static str],
}

impl ProjectionOptions {
    /// A policy keeping `keep` and dropping `exclude`.
    pub const fn new(keep: &'static [&'static str], exclude: &'static [&'static str]) -> Self {
        Self { keep, exclude }
    }

    /// The columns that are always fetched.
    pub fn keep(&self) -> &'static [&'static str] {
        self.keep
    }

    /// The selection entries that never reach storage.
    pub fn exclude(&self) -> &'static [&'static str] {
        self.exclude
    }
}

/// Compute the minimal column list a storage lookup must retrieve.
///
/// The result is `(selection − exclude) ∪ keep`: the selected names that survive the exclusion,
/// in selection order, followed by the `keep` entries not already present, in their declared
/// order. Storage does not care about the order, but it is deterministic for testability.
pub fn project(selection: &SelectionDescriptor, options: &ProjectionOptions) -> Vec<String> {
    let excluded: HashSet<&str> = options.exclude.iter().copied().collect();
    let mut columns = selection
        .fields()
        .iter()
        .filter(|field| !excluded.contains(field.as_str()))
        .cloned()
        .collect_vec();
    for &keep in options.keep {
        if !columns.iter().any(|c| c == keep) {
            columns.push(keep.to_string());
        }
    }
    columns
}
