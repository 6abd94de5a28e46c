//! Composition of middlewares in front of leaf resolvers.
//!
//! A [`Middleware`] adds one cross-cutting concern (credential verification, identity
//! enforcement) in front of whatever it wraps. A [`ResolverChain`] is an explicit ordered list
//! of middlewares; applying it to a leaf resolver yields a callable that is indistinguishable
//! from a plain resolver to its caller. Middlewares run in the order supplied, each deciding
//! whether to invoke the [`Next`] stage; a failure anywhere short-circuits the rest of the
//! chain and the leaf, and propagates unchanged.

use super::{context::RequestContext, Error};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// A composable wrapper around a resolver stage.
///
/// Middlewares are stateless: each call gets the request's own [`RequestContext`], and side
/// effects written into it (such as the authenticated identity) are visible to every stage
/// invoked after this one, never to earlier stages or to other calls.
#[async_trait]
pub trait Middleware<S: Send + Sync>: Send + Sync {
    /// Inspect or extend the context, then either invoke `next` or fail.
    async fn handle(&self, ctx: &mut RequestContext<S>, next: Next<'_, S>) -> Result<(), Error>;
}

/// The remaining stages of a middleware chain.
pub struct Next<'a, S> {
    middlewares: &'a [Arc<dyn Middleware<S>>],
}

impl<'a, S: Send + Sync> Next<'a, S> {
    /// Enter the next stage of the chain.
    pub async fn run(self, ctx: &mut RequestContext<S>) -> Result<(), Error> {
        match self.middlewares.split_first() {
            Some((middleware, rest)) => {
                middleware.handle(ctx, Next { middlewares: rest }).await
            }
            None => Ok(()),
        }
    }
}

/// An ordered list of middlewares which can be applied around any leaf resolver.
///
/// The empty chain is a valid composition: it invokes the leaf directly.
pub struct ResolverChain<S> {
    middlewares: Vec<Arc<dyn Middleware<S>>>,
}

// Manual impls: only the middleware list is cloned, so `S` needs no bounds.
impl<S> Clone for ResolverChain<S> {
    fn clone(&self) -> Self {
        Self {
            middlewares: self.middlewares.clone(),
        }
    }
}

impl<S: Send + Sync> Default for ResolverChain<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + Sync> ResolverChain<S> {
    /// A chain with no middlewares.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware to the end of the chain.
    ///
    /// Middlewares are entered in the order they were appended.
    pub fn with(mut self, middleware: Arc<dyn Middleware<S>>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Run the chain, then the leaf resolver.
    ///
    /// The leaf executes only if every middleware invoked its next stage; after any middleware
    /// fails, the leaf is never entered and the failure propagates unchanged to the caller.
    pub async fn resolve<T, F>(&self, ctx: &mut RequestContext<S>, leaf: F) -> Result<T, Error>
    where
        F: for<'a> FnOnce(&'a RequestContext<S>) -> BoxFuture<'a, Result<T, Error>> + Send,
    {
        Next {
            middlewares: &self.middlewares,
        }
        .run(ctx)
        .await?;
        leaf(ctx).await
    }
}
