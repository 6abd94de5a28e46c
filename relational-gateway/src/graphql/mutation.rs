//! The transactional mutation protocol.
//!
//! Every mutation runs inside a single [`Transaction`](crate::store::Transaction) scope opened
//! against the storage handle. Update and delete first look the target up *within the scope*;
//! a miss fails with a not-found condition before any write, and the scope is still released
//! cleanly. The scope commits as part of returning from the orchestrated call, so a returned
//! post-mutation snapshot is always the committed state. On any failure the scope rolls back,
//! and no partial write is ever observable by a subsequent read.

use super::Error;
use crate::store::{Record, Store, Transaction};
use futures::future::BoxFuture;

/// Run `op` inside a transaction scope.
///
/// Commits if `op` succeeds (commit failures surface as failures of the call); rolls back and
/// propagates the original failure otherwise. Either way the scope is closed.
pub async fn transact<'s, S, T, F>(store: &'s S, op: F) -> Result<T, Error>
where
    S: Store,
    T: Send,
    F: for<'a> FnOnce(&'a mut S::Transaction<'s>) -> BoxFuture<'a, Result<T, Error>> + Send,
{
    let mut txn = store.begin().await.map_err(Error::storage)?;
    match op(&mut txn).await {
        Ok(value) => {
            txn.commit().await.map_err(Error::storage)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!("rollback failed after {err}: {rollback_err}");
            }
            Err(err)
        }
    }
}

/// Insert a new entity, committing the single insert step.
///
/// Storage-level constraint violations (e.g. uniqueness on an identifying field) are reported
/// as [`Error::Constraint`] rather than leaking the engine's error structurally.
pub async fn create<S: Store>(
    store: &S,
    table: &'static str,
    fields: Record,
) -> Result<Record, Error> {
    transact(store, |txn| {
        Box::pin(async move { txn.create(table, fields).await.map_err(Error::storage) })
    })
    .await
}

/// Update fields of the entity with primary key `key`, returning the post-commit snapshot.
///
/// The lookup happens inside the scope; a miss fails with `"{entity} with id {key} not found"`
/// before any write, and the scope rolls back with zero effect.
pub async fn update<S: Store>(
    store: &S,
    entity: &'static str,
    table: &'static str,
    key: u32,
    fields: Record,
) -> Result<Record, Error> {
    transact(store, |txn| {
        Box::pin(async move {
            let existing = txn
                .find_by_key(table, key, &[])
                .await
                .map_err(Error::storage)?;
            if existing.is_none() {
                return Err(Error::NotFound { entity, id: key });
            }
            txn.update(table, key, fields).await.map_err(Error::storage)
        })
    })
    .await
}

/// Delete the entity with primary key `key`.
///
/// Resolves to `true` only when the delete committed; every failure propagates as a failure,
/// so `false` is never produced.
pub async fn delete<S: Store>(
    store: &S,
    entity: &'static str,
    table: &'static str,
    key: u32,
) -> Result<bool, Error> {
    transact(store, |txn| {
        Box::pin(async move {
            let existing = txn
                .find_by_key(table, key, &[])
                .await
                .map_err(Error::storage)?;
            if existing.is_none() {
                return Err(Error::NotFound { entity, id: key });
            }
            txn.remove(table, key).await.map_err(Error::storage)?;
            Ok(true)
        })
    })
    .await
}
