//! Comments: per-post listing, relations back to user and post, and mutations.

use super::{post, user, Page};
use crate::{
    graphql::{
        context::RequestContext,
        mutation,
        projection::{project, ProjectionOptions, SelectionDescriptor},
        Error,
    },
    store::{Filter, Record, Store},
};

pub const TABLE: &str = "comments";
pub const ENTITY: &str = "Comment";

/// Both foreign keys ride along for the relation resolvers; every selectable field is a
/// physical column, so nothing is excluded.
pub const PROJECTION: ProjectionOptions = ProjectionOptions::new(&["id", "user", "post"], &[]);

/// A comment, parsed from a projected row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub id: u32,
    pub comment: Option<String>,
    /// Foreign key to the commenting user.
    pub user: u32,
    /// Foreign key to the commented post.
    pub post: u32,
}

impl Comment {
    pub(crate) fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.require("id").map_err(Error::internal)?,
            comment: record.opt("comment").map_err(Error::internal)?,
            user: record.require("user").map_err(Error::internal)?,
            post: record.require("post").map_err(Error::internal)?,
        })
    }
}

/// Fields for a new comment.
#[derive(Clone, Debug)]
pub struct CreateComment {
    pub comment: String,
    pub user: u32,
    pub post: u32,
}

/// List the comments on one post.
pub async fn comments_by_post<S: Store>(
    ctx: &RequestContext<S>,
    post_id: u32,
    page: Page,
    selection: &SelectionDescriptor,
) -> Result<Vec<Comment>, Error> {
    let columns = project(selection, &PROJECTION);
    ctx.store()
        .find_all(
            TABLE,
            Some(Filter::eq("post", post_id)),
            page.first,
            page.offset,
            &columns,
        )
        .await
        .map_err(Error::storage)?
        .iter()
        .map(Comment::from_record)
        .collect()
}

/// The user who wrote `comment`.
pub async fn author<S: Store>(
    ctx: &RequestContext<S>,
    comment: &Comment,
    selection: &SelectionDescriptor,
) -> Result<user::User, Error> {
    user::user(ctx, comment.user, selection).await
}

/// The post `comment` was written on.
pub async fn parent_post<S: Store>(
    ctx: &RequestContext<S>,
    comment: &Comment,
    selection: &SelectionDescriptor,
) -> Result<post::Post, Error> {
    post::post(ctx, comment.post, selection).await
}

/// Write a new comment.
pub async fn create_comment<S: Store>(
    ctx: &RequestContext<S>,
    input: CreateComment,
) -> Result<Comment, Error> {
    let fields = Record::new()
        .with("comment", input.comment)
        .with("user", input.user)
        .with("post", input.post);
    let created = mutation::create(ctx.store(), TABLE, fields).await?;
    Comment::from_record(&created)
}

/// Change the text of a comment.
pub async fn update_comment<S: Store>(
    ctx: &RequestContext<S>,
    id: u32,
    comment: String,
) -> Result<Comment, Error> {
    let updated = mutation::update(
        ctx.store(),
        ENTITY,
        TABLE,
        id,
        Record::new().with("comment", comment),
    )
    .await?;
    Comment::from_record(&updated)
}

/// Delete a comment.
pub async fn delete_comment<S: Store>(ctx: &RequestContext<S>, id: u32) -> Result<bool, Error> {
    mutation::delete(ctx.store(), ENTITY, TABLE, id).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{init_logging, store::mock};
    use std::sync::Arc;

    async fn fixture() -> mock::Store {
        let store = mock::Store::create();
        store
            .create_table_with_rows(
                user::TABLE,
                &["name", "email", "password", "photo"],
                &["email"],
                [Record::new()
                    .with("name", "Peter")
                    .with("email", "peter@mail.com")
                    .with("password", "hash")],
            )
            .await
            .unwrap();
        store
            .create_table_with_rows(
                post::TABLE,
                &["title", "content", "photo", "author"],
                &[],
                [
                    Record::new()
                        .with("title", "Hello")
                        .with("content", "First post")
                        .with("author", 1u32),
                    Record::new()
                        .with("title", "Again")
                        .with("content", "Second post")
                        .with("author", 1u32),
                ],
            )
            .await
            .unwrap();
        store
            .create_table_with_rows(
                TABLE,
                &["comment", "user", "post"],
                &[],
                [
                    Record::new()
                        .with("comment", "Nice")
                        .with("user", 1u32)
                        .with("post", 1u32),
                    Record::new()
                        .with("comment", "Agreed")
                        .with("user", 1u32)
                        .with("post", 1u32),
                    Record::new()
                        .with("comment", "Offtopic")
                        .with("user", 1u32)
                        .with("post", 2u32),
                ],
            )
            .await
            .unwrap();
        store
    }

    fn ctx(store: mock::Store) -> RequestContext<mock::Store> {
        RequestContext::new(Arc::new(store), None)
    }

    #[async_std::test]
    async fn test_comments_by_post_filters_and_paginates() {
        init_logging();
        let ctx = ctx(fixture().await);
        let selection = SelectionDescriptor::new(["comment"]);

        let on_first = comments_by_post(&ctx, 1, Page::default(), &selection)
            .await
            .unwrap();
        assert_eq!(on_first.len(), 2);
        assert!(on_first.iter().all(|c| c.post == 1));

        let second_page = comments_by_post(&ctx, 1, Page::new(1, 1), &selection)
            .await
            .unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].comment.as_deref(), Some("Agreed"));
    }

    #[async_std::test]
    async fn test_relations_resolve_through_foreign_keys() {
        init_logging();
        let ctx = ctx(fixture().await);

        // Only the text is selected; the foreign keys still come back.
        let found = comments_by_post(&ctx, 2, Page::default(), &SelectionDescriptor::new(["comment"]))
            .await
            .unwrap();
        let comment = &found[0];

        let who = author(&ctx, comment, &SelectionDescriptor::new(["name"]))
            .await
            .unwrap();
        assert_eq!(who.name.as_deref(), Some("Peter"));

        let on = parent_post(&ctx, comment, &SelectionDescriptor::new(["title"]))
            .await
            .unwrap();
        assert_eq!(on.title.as_deref(), Some("Again"));
    }

    #[async_std::test]
    async fn test_create_update_delete_comment() {
        init_logging();
        let ctx = ctx(fixture().await);

        let created = create_comment(
            &ctx,
            CreateComment {
                comment: "First!".into(),
                user: 1,
                post: 2,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.comment.as_deref(), Some("First!"));

        let updated = update_comment(&ctx, created.id, "Edited".into()).await.unwrap();
        assert_eq!(updated.comment.as_deref(), Some("Edited"));
        assert_eq!(updated.post, 2);

        assert!(delete_comment(&ctx, created.id).await.unwrap());
        let err = update_comment(&ctx, created.id, "Ghost".into())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Comment with id {} not found", created.id)
        );
    }
}
