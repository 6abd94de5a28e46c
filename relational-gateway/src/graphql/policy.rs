//! The operation-level access policy.
//!
//! Which operations require an authenticated caller is declared here in one table rather than
//! scattered over the resolvers: an operation is either [`Public`](Access::Public) or
//! [`Protected`](Access::Protected), and [`Access::chain`] turns that classification into the
//! middleware chain the operation runs behind. Protected operations get the credential verifier
//! followed by the identity gate; public operations get the empty chain.

use super::{
    auth::{AuthGate, TokenVerifier},
    compose::ResolverChain,
};
use std::sync::Arc;

/// Whether an operation demands an authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Anyone may invoke the operation, with or without a credential.
    Public,
    /// The operation requires a verified credential.
    Protected,
}

impl Access {
    /// The middleware chain an operation with this access level runs behind.
    pub fn chain<S: Send + Sync>(&self, verifier: Arc<TokenVerifier>) -> ResolverChain<S> {
        match self {
            Self::Public => ResolverChain::new(),
            Self::Protected => ResolverChain::new().with(verifier).with(Arc::new(AuthGate)),
        }
    }
}

/// The access level of the named schema operation.
///
/// Operations not listed here are public. In particular, single-entity lookups and all post and
/// comment operations are open, while listing users and every operation acting on the caller's
/// own account require authentication.
pub fn access(operation: &str) -> Access {
    match operation {
        "users" | "currentUser" | "updateUser" | "updateUserPassword" | "deleteUser" => {
            Access::Protected
        }
        _ => Access::Public,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graphql::{auth::AuthConfig, context::RequestContext, Error};

    #[test]
    fn test_account_operations_are_protected() {
        for op in [
            "users",
            "currentUser",
            "updateUser",
            "updateUserPassword",
            "deleteUser",
        ] {
            assert_eq!(access(op), Access::Protected, "{op}");
        }
    }

    #[test]
    fn test_everything_else_is_public() {
        for op in [
            "user",
            "posts",
            "post",
            "comments",
            "createUser",
            "createToken",
            "createPost",
            "updatePost",
            "deletePost",
            "createComment",
            "updateComment",
            "deleteComment",
        ] {
            assert_eq!(access(op), Access::Public, "{op}");
        }
    }

    #[async_std::test]
    async fn test_protected_chain_rejects_anonymous_caller() {
        let verifier = Arc::new(TokenVerifier::new(AuthConfig::new("test-secret")));
        let chain = access("deleteUser").chain::<()>(verifier);
        let mut ctx = RequestContext::new(Arc::new(()), None);
        let err = chain
            .resolve::<(), _>(&mut ctx, |_| {
                Box::pin(async { panic!("leaf must not run") })
            })
            .await
            .unwrap_err();
        assert_eq!(err, Error::MissingCredential);
    }

    #[async_std::test]
    async fn test_public_chain_is_empty() {
        let verifier = Arc::new(TokenVerifier::new(AuthConfig::new("test-secret")));
        let chain = access("posts").chain::<()>(verifier);
        let mut ctx = RequestContext::new(Arc::new(()), None);
        let out = chain
            .resolve(&mut ctx, |_| Box::pin(async { Ok(1) }))
            .await
            .unwrap();
        assert_eq!(out, 1);
    }
}
