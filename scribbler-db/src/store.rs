use async_trait::async_trait;
use scribbler_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication},
    author::{Author, AuthorMarker, Credentials, NewAuthor, Username},
    comment::{Comment, NewComment},
    group::{Group, GroupMarker, NewGroup, Slug},
    post::{NewPost, Post, PostContent, PostMarker},
};
use std::fmt::Debug;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A unique value was already taken: {0}")]
    Conflict(&'static str),
    #[error("A referenced row does not exist: {0}")]
    MissingReference(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Which posts a listing covers. Every listing is ordered newest first.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<AuthorMarker>),
    /// Posts by every author the given author follows.
    FollowedBy(Id<AuthorMarker>),
}

/// Persistence for authors, groups, posts, comments and follows.
///
/// Lookups return `Ok(None)` for missing rows; `Err` is reserved for
/// failures of the store itself and for constraint violations
/// ([`DbError::Conflict`], [`DbError::MissingReference`]).
#[async_trait]
pub trait Store: Send + Sync + Debug {
    async fn create_author(&self, author: &NewAuthor) -> Result<Author>;
    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>>;
    async fn fetch_author_by_username(&self, username: &Username) -> Result<Option<Author>>;
    async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn create_group(&self, group: &NewGroup) -> Result<Group>;
    async fn fetch_group_by_slug(&self, slug: &Slug) -> Result<Option<Group>>;
    /// Ordered by title.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    async fn create_post(&self, post: &NewPost) -> Result<Post>;
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;
    /// Only finds the post if it was written by `username`.
    async fn fetch_author_post(
        &self,
        username: &Username,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Post>>;
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;
    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> Result<Vec<Post>>;
    async fn count_posts(&self, filter: PostFilter) -> Result<u64>;

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment>;
    /// Oldest first.
    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Makes `user` follow `author` unless it already does. Returns whether
    /// a new follow was recorded.
    async fn follow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool>;
    /// Returns whether a follow existed.
    async fn unfollow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool>;
    async fn is_following(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>)
    -> Result<bool>;
}
