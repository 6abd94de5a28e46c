//! User accounts: queries, account mutations and sign-in.
//!
//! The `photo` column is an opaque blob and is only fetched when the client selects it. The
//! `password` column holds a bcrypt hash; it is never parsed into a [`User`] and only read
//! inside [`create_token`]'s verification.

use super::{post, Page};
use crate::{
    graphql::{
        auth::{issue_token, AuthConfig},
        context::RequestContext,
        mutation,
        projection::{project, ProjectionOptions, SelectionDescriptor},
        Error,
    },
    store::{Filter, Record, Store},
};

pub const TABLE: &str = "users";
pub const ENTITY: &str = "User";

/// The primary key always comes back for downstream stages; `posts` is a relation, not a
/// column.
pub const PROJECTION: ProjectionOptions = ProjectionOptions::new(&["id"], &["posts"]);

/// A user account, parsed from a projected row.
///
/// Fields left out of the projection are `None`. The password hash is deliberately absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: u32,
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<Vec<u8>>,
}

impl User {
    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.require("id").map_err(Error::internal)?,
            name: record.opt("name").map_err(Error::internal)?,
            email: record.opt("email").map_err(Error::internal)?,
            photo: record.opt("photo").map_err(Error::internal)?,
        })
    }
}

/// Fields for a new account.
#[derive(Clone, Debug)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    /// Plaintext; hashed before it reaches storage.
    pub password: String,
    pub photo: Option<Vec<u8>>,
}

/// Fields to change on the caller's account. `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<Vec<u8>>,
}

/// List accounts.
pub async fn users<S: Store>(
    ctx: &RequestContext<S>,
    page: Page,
    selection: &SelectionDescriptor,
) -> Result<Vec<User>, Error> {
    let columns = project(selection, &PROJECTION);
    ctx.store()
        .find_all(TABLE, None, page.first, page.offset, &columns)
        .await
        .map_err(Error::storage)?
        .iter()
        .map(User::from_record)
        .collect()
}

/// Look up one account by id.
pub async fn user<S: Store>(
    ctx: &RequestContext<S>,
    id: u32,
    selection: &SelectionDescriptor,
) -> Result<User, Error> {
    let columns = project(selection, &PROJECTION);
    let record = ctx
        .store()
        .find_by_key(TABLE, id, &columns)
        .await
        .map_err(Error::storage)?
        .ok_or(Error::NotFound { entity: ENTITY, id })?;
    User::from_record(&record)
}

/// The caller's own account.
pub async fn current_user<S: Store>(
    ctx: &RequestContext<S>,
    selection: &SelectionDescriptor,
) -> Result<User, Error> {
    let identity = ctx.identity().ok_or(Error::Unauthorized)?;
    user(ctx, identity.id, selection).await
}

/// The posts authored by `user`.
pub async fn posts<S: Store>(
    ctx: &RequestContext<S>,
    user: &User,
    page: Page,
    selection: &SelectionDescriptor,
) -> Result<Vec<post::Post>, Error> {
    let columns = project(selection, &post::PROJECTION);
    ctx.store()
        .find_all(
            post::TABLE,
            Some(Filter::eq("author", user.id)),
            page.first,
            page.offset,
            &columns,
        )
        .await
        .map_err(Error::storage)?
        .iter()
        .map(post::Post::from_record)
        .collect()
}

/// Register a new account.
pub async fn create_user<S: Store>(
    ctx: &RequestContext<S>,
    input: CreateUser,
) -> Result<User, Error> {
    let hash = bcrypt::hash(&input.password, bcrypt::DEFAULT_COST).map_err(Error::internal)?;
    let mut fields = Record::new()
        .with("name", input.name)
        .with("email", input.email)
        .with("password", hash);
    if let Some(photo) = input.photo {
        fields.insert("photo", photo);
    }
    let created = mutation::create(ctx.store(), TABLE, fields).await?;
    User::from_record(&created)
}

/// Change fields of the caller's account.
pub async fn update_user<S: Store>(
    ctx: &RequestContext<S>,
    input: UpdateUser,
) -> Result<User, Error> {
    let identity = ctx.identity().ok_or(Error::Unauthorized)?;
    let mut fields = Record::new();
    if let Some(name) = input.name {
        fields.insert("name", name);
    }
    if let Some(email) = input.email {
        fields.insert("email", email);
    }
    if let Some(photo) = input.photo {
        fields.insert("photo", photo);
    }
    let updated = mutation::update(ctx.store(), ENTITY, TABLE, identity.id, fields).await?;
    User::from_record(&updated)
}

/// Replace the caller's password.
pub async fn update_user_password<S: Store>(
    ctx: &RequestContext<S>,
    password: String,
) -> Result<bool, Error> {
    let identity = ctx.identity().ok_or(Error::Unauthorized)?;
    let hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST).map_err(Error::internal)?;
    mutation::update(
        ctx.store(),
        ENTITY,
        TABLE,
        identity.id,
        Record::new().with("password", hash),
    )
    .await?;
    Ok(true)
}

/// Delete the caller's account.
pub async fn delete_user<S: Store>(ctx: &RequestContext<S>) -> Result<bool, Error> {
    let identity = ctx.identity().ok_or(Error::Unauthorized)?;
    mutation::delete(ctx.store(), ENTITY, TABLE, identity.id).await
}

/// Sign in: verify `password` against the account registered under `email` and issue a bearer
/// token for it.
///
/// An unknown email and a wrong password fail identically, so callers cannot probe which
/// addresses are registered.
pub async fn create_token<S: Store>(
    ctx: &RequestContext<S>,
    config: &AuthConfig,
    email: &str,
    password: &str,
) -> Result<String, Error> {
    let rows = ctx
        .store()
        .find_all(
            TABLE,
            Some(Filter::eq("email", email)),
            1,
            0,
            &["id".into(), "password".into()],
        )
        .await
        .map_err(Error::storage)?;
    let Some(row) = rows.first() else {
        return Err(Error::WrongCredentials);
    };
    let hash: String = row.require("password").map_err(Error::internal)?;
    if !bcrypt::verify(password, &hash).map_err(Error::internal)? {
        return Err(Error::WrongCredentials);
    }
    let id: u32 = row.require("id").map_err(Error::internal)?;
    tracing::info!(subject = id, "issued bearer token");
    issue_token(config, id)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        graphql::{auth::TokenVerifier, policy},
        init_logging,
        store::mock,
    };
    use std::sync::Arc;

    // Low cost keeps the hashing in tests fast; production callers use the default.
    fn hash(password: &str) -> String {
        bcrypt::hash(password, 4).unwrap()
    }

    async fn fixture() -> mock::Store {
        let store = mock::Store::create();
        store
            .create_table_with_rows(
                TABLE,
                &["name", "email", "password", "photo"],
                &["email"],
                [
                    Record::new()
                        .with("name", "Peter")
                        .with("email", "peter@mail.com")
                        .with("password", hash("1234"))
                        .with("photo", vec![0xffu8, 0xd8]),
                    Record::new()
                        .with("name", "Maria")
                        .with("email", "maria@mail.com")
                        .with("password", hash("5678"))
                        .with("photo", Vec::<u8>::new()),
                ],
            )
            .await
            .unwrap();
        store
            .create_table_with_rows(
                post::TABLE,
                &["title", "content", "photo", "author"],
                &[],
                [Record::new()
                    .with("title", "Hello")
                    .with("content", "First post")
                    .with("photo", "hello.png")
                    .with("author", 1u32)],
            )
            .await
            .unwrap();
        store
    }

    fn ctx(store: mock::Store, credential: Option<String>) -> RequestContext<mock::Store> {
        RequestContext::new(Arc::new(store), credential)
    }

    #[async_std::test]
    async fn test_photo_not_fetched_unless_selected() {
        init_logging();
        let ctx = ctx(fixture().await, None);

        let selection = SelectionDescriptor::new(["name", "email"]);
        let found = user(&ctx, 1, &selection).await.unwrap();
        assert_eq!(found.name.as_deref(), Some("Peter"));
        assert_eq!(found.email.as_deref(), Some("peter@mail.com"));
        assert_eq!(found.photo, None);

        let selection = SelectionDescriptor::new(["photo"]);
        let found = user(&ctx, 1, &selection).await.unwrap();
        assert_eq!(found.photo, Some(vec![0xff, 0xd8]));
        assert_eq!(found.name, None);
    }

    #[async_std::test]
    async fn test_user_lookup_miss() {
        init_logging();
        let ctx = ctx(fixture().await, None);
        let err = user(&ctx, 7, &SelectionDescriptor::new(["name"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User with id 7 not found");
    }

    #[async_std::test]
    async fn test_users_pagination() {
        init_logging();
        let ctx = ctx(fixture().await, None);
        let selection = SelectionDescriptor::new(["name"]);

        let all = users(&ctx, Page::default(), &selection).await.unwrap();
        assert_eq!(all.len(), 2);

        let second = users(&ctx, Page::new(1, 1), &selection).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name.as_deref(), Some("Maria"));
    }

    #[async_std::test]
    async fn test_posts_relation_filters_by_author() {
        init_logging();
        let ctx = ctx(fixture().await, None);
        let selection = SelectionDescriptor::new(["name"]);

        let peter = user(&ctx, 1, &selection).await.unwrap();
        let peters = posts(
            &ctx,
            &peter,
            Page::default(),
            &SelectionDescriptor::new(["title"]),
        )
        .await
        .unwrap();
        assert_eq!(peters.len(), 1);
        assert_eq!(peters[0].title.as_deref(), Some("Hello"));

        let maria = user(&ctx, 2, &selection).await.unwrap();
        let marias = posts(
            &ctx,
            &maria,
            Page::default(),
            &SelectionDescriptor::new(["title"]),
        )
        .await
        .unwrap();
        assert!(marias.is_empty());
    }

    #[async_std::test]
    async fn test_create_user_hashes_password() {
        init_logging();
        let store = fixture().await;
        let ctx = ctx(store.clone(), None);

        let created = create_user(
            &ctx,
            CreateUser {
                name: "Ana".into(),
                email: "ana@mail.com".into(),
                password: "secret".into(),
                photo: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.name.as_deref(), Some("Ana"));

        let row = store
            .find_by_key(TABLE, created.id, &["password".into()])
            .await
            .unwrap()
            .unwrap();
        let stored: String = row.require("password").unwrap();
        assert_ne!(stored, "secret");
        assert!(bcrypt::verify("secret", &stored).unwrap());
    }

    #[async_std::test]
    async fn test_create_user_duplicate_email() {
        init_logging();
        let ctx = ctx(fixture().await, None);
        let err = create_user(
            &ctx,
            CreateUser {
                name: "Impostor".into(),
                email: "peter@mail.com".into(),
                password: "secret".into(),
                photo: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Constraint { .. }), "{err:?}");
    }

    #[async_std::test]
    async fn test_create_token_and_protected_flow() {
        init_logging();
        let store = fixture().await;
        let config = AuthConfig::new("test-secret");
        let anonymous = ctx(store.clone(), None);

        let token = create_token(&anonymous, &config, "peter@mail.com", "1234")
            .await
            .unwrap();

        // The issued token passes the protected chain and resolves the caller's own account.
        let verifier = Arc::new(TokenVerifier::new(config));
        let chain = policy::access("currentUser").chain(verifier);
        let mut authed = ctx(store, Some(token));
        let me = chain
            .resolve(&mut authed, |ctx| {
                Box::pin(async move {
                    current_user(ctx, &SelectionDescriptor::new(["name", "email"])).await
                })
            })
            .await
            .unwrap();
        assert_eq!(me.id, 1);
        assert_eq!(me.name.as_deref(), Some("Peter"));
    }

    #[async_std::test]
    async fn test_create_token_rejects_bad_credentials() {
        init_logging();
        let ctx = ctx(fixture().await, None);
        let config = AuthConfig::new("test-secret");

        let wrong_password = create_token(&ctx, &config, "peter@mail.com", "bad")
            .await
            .unwrap_err();
        let unknown_email = create_token(&ctx, &config, "nobody@mail.com", "1234")
            .await
            .unwrap_err();

        // Unknown email and wrong password are indistinguishable.
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(
            wrong_password.to_string(),
            "unauthorized, wrong email or password"
        );
    }

    #[async_std::test]
    async fn test_current_user_requires_identity() {
        init_logging();
        let ctx = ctx(fixture().await, None);
        let err = current_user(&ctx, &SelectionDescriptor::new(["name"]))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Unauthorized);
    }

    #[async_std::test]
    async fn test_update_user_targets_identity() {
        init_logging();
        let store = fixture().await;
        let mut ctx = ctx(store, None);
        ctx.attach_identity(crate::graphql::context::AuthenticatedIdentity { id: 2 });

        let updated = update_user(
            &ctx,
            UpdateUser {
                name: Some("Mary".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.id, 2);
        assert_eq!(updated.name.as_deref(), Some("Mary"));
        assert_eq!(updated.email.as_deref(), Some("maria@mail.com"));
    }

    #[async_std::test]
    async fn test_update_password_then_sign_in() {
        init_logging();
        let store = fixture().await;
        let config = AuthConfig::new("test-secret");
        let mut authed = ctx(store.clone(), None);
        authed.attach_identity(crate::graphql::context::AuthenticatedIdentity { id: 1 });

        assert!(update_user_password(&authed, "new-pass".into())
            .await
            .unwrap());

        let anonymous = ctx(store, None);
        assert!(
            create_token(&anonymous, &config, "peter@mail.com", "1234")
                .await
                .is_err()
        );
        assert!(
            create_token(&anonymous, &config, "peter@mail.com", "new-pass")
                .await
                .is_ok()
        );
    }

    #[async_std::test]
    async fn test_delete_user_removes_account() {
        init_logging();
        let store = fixture().await;
        let mut authed = ctx(store.clone(), None);
        authed.attach_identity(crate::graphql::context::AuthenticatedIdentity { id: 1 });

        assert!(delete_user(&authed).await.unwrap());
        assert!(store
            .find_by_key(TABLE, 1, &[])
            .await
            .unwrap()
            .is_none());

        // The identity now names a missing row.
        let err = delete_user(&authed).await.unwrap_err();
        assert_eq!(err.to_string(), "User with id 1 not found");
    }
}
