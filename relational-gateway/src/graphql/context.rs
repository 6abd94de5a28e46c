//! Request-scoped state threaded through every resolver stage.

use std::sync::Arc;

/// The identity extracted from a verified credential.
///
/// Immutable once attached to a [`RequestContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// The subject's integer identifier.
    pub id: u32,
}

/// Per-operation context handed to every middleware and leaf resolver.
///
/// Created once per incoming operation and destroyed when it completes; never shared across
/// operations. All of its fields are declared here rather than accreted ad hoc by call sites:
/// a shared storage handle, the raw bearer credential the transport extracted (if any), and the
/// identity slot the credential verifier fills in.
#[derive(Clone, Debug)]
pub struct RequestContext<S> {
    store: Arc<S>,
    credential: Option<String>,
    identity: Option<AuthenticatedIdentity>,
}

impl<S> RequestContext<S> {
    /// A context for a fresh operation.
    pub fn new(store: Arc<S>, credential: Option<String>) -> Self {
        Self {
            store,
            credential,
            identity: None,
        }
    }

    /// The storage handle, shared read-only for the request's lifetime.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The raw bearer credential presented with the request, if any.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// The authenticated identity, if a verifier has attached one.
    pub fn identity(&self) -> Option<AuthenticatedIdentity> {
        self.identity
    }

    /// Attach the authenticated identity.
    ///
    /// Once set, the identity is never replaced or cleared for the remainder of the request;
    /// a second call has no effect.
    pub fn attach_identity(&mut self, identity: AuthenticatedIdentity) {
        if self.identity.is_none() {
            self.identity = Some(identity);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identity_is_set_once() {
        let mut ctx = RequestContext::new(Arc::new(()), None);
        assert_eq!(ctx.identity(), None);

        ctx.attach_identity(AuthenticatedIdentity { id: 1 });
        ctx.attach_identity(AuthenticatedIdentity { id: 2 });
        assert_eq!(ctx.identity(), Some(AuthenticatedIdentity { id: 1 }));
    }
}
