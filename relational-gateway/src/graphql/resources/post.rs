//! Posts: queries, author/comment relations and mutations.

use super::{comment, user, Page};
use crate::{
    graphql::{
        context::RequestContext,
        mutation,
        projection::{project, ProjectionOptions, SelectionDescriptor},
        Error,
    },
    store::{Filter, Record, Store},
};

pub const TABLE: &str = "posts";
pub const ENTITY: &str = "Post";

/// `author` rides along even when unselected: the relation resolver needs the foreign key.
/// `comments` is a relation, not a column.
pub const PROJECTION: ProjectionOptions = ProjectionOptions::new(&["id", "author"], &["comments"]);

/// A post, parsed from a projected row. The `photo` column holds an image URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: u32,
    pub title: Option<String>,
    pub content: Option<String>,
    pub photo: Option<String>,
    /// Foreign key to the authoring user.
    pub author: u32,
}

impl Post {
    pub(crate) fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.require("id").map_err(Error::internal)?,
            title: record.opt("title").map_err(Error::internal)?,
            content: record.opt("content").map_err(Error::internal)?,
            photo: record.opt("photo").map_err(Error::internal)?,
            author: record.require("author").map_err(Error::internal)?,
        })
    }
}

/// Fields for a new post.
#[derive(Clone, Debug)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub photo: Option<String>,
    pub author: u32,
}

/// Fields to change on a post. `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub photo: Option<String>,
}

/// List posts.
pub async fn posts<S: Store>(
    ctx: &RequestContext<S>,
    page: Page,
    selection: &SelectionDescriptor,
) -> Result<Vec<Post>, Error> {
    let columns = project(selection, &PROJECTION);
    ctx.store()
        .find_all(TABLE, None, page.first, page.offset, &columns)
        .await
        .map_err(Error::storage)?
        .iter()
        .map(Post::from_record)
        .collect()
}

/// Look up one post by id.
pub async fn post<S: Store>(
    ctx: &RequestContext<S>,
    id: u32,
    selection: &SelectionDescriptor,
) -> Result<Post, Error> {
    let columns = project(selection, &PROJECTION);
    let record = ctx
        .store()
        .find_by_key(TABLE, id, &columns)
        .await
        .map_err(Error::storage)?
        .ok_or(Error::NotFound { entity: ENTITY, id })?;
    Post::from_record(&record)
}

/// The user who authored `post`.
///
/// A dangling foreign key surfaces as the user's own not-found failure.
pub async fn author<S: Store>(
    ctx: &RequestContext<S>,
    post: &Post,
    selection: &SelectionDescriptor,
) -> Result<user::User, Error> {
    user::user(ctx, post.author, selection).await
}

/// The comments on `post`.
pub async fn comments<S: Store>(
    ctx: &RequestContext<S>,
    post: &Post,
    page: Page,
    selection: &SelectionDescriptor,
) -> Result<Vec<comment::Comment>, Error> {
    let columns = project(selection, &comment::PROJECTION);
    ctx.store()
        .find_all(
            comment::TABLE,
            Some(Filter::eq("post", post.id)),
            page.first,
            page.offset,
            &columns,
        )
        .await
        .map_err(Error::storage)?
        .iter()
        .map(comment::Comment::from_record)
        .collect()
}

/// Publish a new post.
pub async fn create_post<S: Store>(
    ctx: &RequestContext<S>,
    input: CreatePost,
) -> Result<Post, Error> {
    let mut fields = Record::new()
        .with("title", input.title)
        .with("content", input.content)
        .with("author", input.author);
    if let Some(photo) = input.photo {
        fields.insert("photo", photo);
    }
    let created = mutation::create(ctx.store(), TABLE, fields).await?;
    Post::from_record(&created)
}

/// Change fields of a post.
pub async fn update_post<S: Store>(
    ctx: &RequestContext<S>,
    id: u32,
    input: UpdatePost,
) -> Result<Post, Error> {
    let mut fields = Record::new();
    if let Some(title) = input.title {
        fields.insert("title", title);
    }
    if let Some(content) = input.content {
        fields.insert("content", content);
    }
    if let Some(photo) = input.photo {
        fields.insert("photo", photo);
    }
    let updated = mutation::update(ctx.store(), ENTITY, TABLE, id, fields).await?;
    Post::from_record(&updated)
}

/// Delete a post.
pub async fn delete_post<S: Store>(ctx: &RequestContext<S>, id: u32) -> Result<bool, Error> {
    mutation::delete(ctx.store(), ENTITY, TABLE, id).await
}
