//! The request-handling core shared by every GraphQL operation.
//!
//! Every operation enters through a [composed resolver](compose): an ordered chain of
//! middlewares (credential [verification and identity enforcement](auth)) wrapped around a leaf
//! resolver. Leaf resolvers consult the [projection](projection) engine to fetch only the
//! columns the response needs, route writes through the [transactional mutation
//! protocol](mutation), and report every failure as an [`Error`] whose display text is the one
//! and only client-visible representation.

use snafu::Snafu;

pub mod auth;
pub mod compose;
pub mod context;
pub mod mutation;
pub mod policy;
pub mod projection;
pub mod resources;

use crate::store;

/// A failure raised anywhere inside a resolver chain or transaction scope.
///
/// The variant drives control flow; the display text is the message shown to clients, and it
/// passes through the normalization boundary unmodified, prefix included, so operators can
/// distinguish failure kinds from logs and tests.
#[derive(Clone, Debug, Snafu, PartialEq, Eq)]
pub enum Error {
    /// No bearer credential was presented on a verified operation.
    #[snafu(display("authentication error: missing bearer credential"))]
    MissingCredential,

    /// The credential could not be parsed as a token.
    #[snafu(display("authentication error: malformed credential: {message}"))]
    MalformedCredential { message: String },

    /// The credential's signature did not verify against the shared secret.
    #[snafu(display("authentication error: invalid signature: {message}"))]
    InvalidSignature { message: String },

    /// The credential verified but is past its expiry.
    #[snafu(display("authentication error: expired credential: {message}"))]
    ExpiredCredential { message: String },

    /// An operation requiring an authenticated identity was invoked without one.
    #[snafu(display("not authorized"))]
    Unauthorized,

    /// A sign-in attempt presented an unknown email or a wrong password.
    #[snafu(display("unauthorized, wrong email or password"))]
    WrongCredentials,

    /// An entity lookup missed during a read or mutation.
    #[snafu(display("{entity} with id {id} not found"))]
    NotFound { entity: &'static str, id: u32 },

    /// The storage engine rejected a write, e.g. a uniqueness violation.
    #[snafu(display("constraint violation: {message}"))]
    Constraint { message: String },

    /// Any other storage failure.
    #[snafu(display("storage error: {message}"))]
    Storage { message: String },

    /// A failure internal to the gateway, passed through unchanged.
    #[snafu(display("{message}"))]
    Internal { message: String },
}

impl Error {
    /// Classify a storage engine failure.
    ///
    /// Constraint violations are reported as [`Error::Constraint`] so callers see a validation
    /// failure rather than the engine's own error structure; everything else becomes
    /// [`Error::Storage`] with the engine's message preserved.
    pub fn storage<E: store::Error>(err: E) -> Self {
        if err.is_constraint() {
            Self::Constraint {
                message: err.to_string(),
            }
        } else {
            Self::Storage {
                message: err.to_string(),
            }
        }
    }

    /// An internal failure with the given message.
    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }
}

/// The only externally observable error representation.
///
/// Always derived from an underlying failure's textual description, never from its structured
/// fields. The message is never invented and the underlying failure is never retried.
#[derive(Clone, Debug, Snafu, PartialEq, Eq)]
#[snafu(display("{}", message))]
pub struct NormalizedError {
    message: String,
}

impl NormalizedError {
    /// The failure's own string description, unmodified.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for NormalizedError {
    fn from(err: Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Normalize the outcome of a resolver or mutation call at the operation boundary.
///
/// This is the boundary for embeddings that do not go through a GraphQL executor. Inside one,
/// `async_graphql::Error: From<Error>` (via the display form, since [`Error`] implements
/// [`Display`](std::fmt::Display)) plays the same role: a failed field resolves to null plus a
/// message-only entry in the response's error list.
///
/// ```
/// use relational_gateway::graphql::{normalize, Error};
///
/// let err = normalize::<()>(Err(Error::Unauthorized)).unwrap_err();
/// assert_eq!(err.message(), "not authorized");
/// ```
pub fn normalize<T>(result: Result<T, Error>) -> Result<T, NormalizedError> {
    result.map_err(NormalizedError::from)
}
