//! Relational Gateway is the request-handling core of a GraphQL API gateway over a relational
//! store. It consists of two sections:
//!
//! * A [graphql] layer, which owns everything that happens between an incoming operation and the
//!   storage round-trip: a [composition](graphql::compose) mechanism that chains authentication
//!   and authorization middlewares in front of leaf resolvers, a
//!   [projection](graphql::projection) engine that derives the minimal set of storage columns
//!   from the client's selection set, and a [transactional mutation
//!   protocol](graphql::mutation) that guarantees atomicity and consistent error signaling for
//!   multi-step mutations.
//! * A [store] layer, which describes the contract the gateway consumes from a relational
//!   storage engine. The gateway is completely agnostic to the engine behind this contract; this
//!   crate ships an in-memory [mock](store::mock) instantiation which is useful for lightweight
//!   testing.
//!
//! The query language, type system and wire transport are external collaborators: the gateway
//! receives the bearer credential already extracted from the request and the selection set
//! already parsed, and every failure it produces surfaces as a single message string suitable
//! for a response's error list.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub mod graphql;
pub mod store;

pub use graphql::{Error, NormalizedError};

/// Initialize tracing.
pub fn init_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        color_eyre::install().unwrap();
        tracing_subscriber::fmt()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}
