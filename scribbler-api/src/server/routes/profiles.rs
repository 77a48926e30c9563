use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, Viewer},
    response::{Found, Json},
    routes::{PageQuery, paginate},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use scribbler_common::{
    model::{
        author::{Author, Username},
        post::Post,
    },
    paginator::Page,
};
use scribbler_db::{PostFilter, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(profile)
        .typed_get(profile_follow)
        .typed_get(profile_unfollow)
}

#[derive(Clone, Debug, Serialize)]
struct ProfilePage {
    author: Author,
    page: Page<Post>,
    count_posts: u64,
    /// Always `false` for anonymous viewers.
    following: bool,
}

async fn fetch_author(store: &dyn Store, username: Username) -> Result<Author> {
    store
        .fetch_author_by_username(&username)
        .await?
        .ok_or(ServerError::AuthorNotFound(username))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/", rejection(ServerError))]
struct ProfilePath {
    username: Username,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    viewer: Viewer,
    query: PageQuery,
) -> Result<Json<ProfilePage>> {
    let author = fetch_author(&*store, username).await?;

    let page = paginate(&*store, PostFilter::Author(author.id), &query).await?;
    let following = match viewer.id() {
        Some(viewer) => store.is_following(viewer, author.id).await?,
        None => false,
    };

    Ok(Json(ProfilePage {
        count_posts: page.count,
        author,
        page,
        following,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/follow/", rejection(ServerError))]
struct FollowPath {
    username: Username,
}

/// Following oneself is silently ignored, whether or not the name exists.
async fn profile_follow(
    FollowPath { username }: FollowPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Found> {
    if *user.username() != username {
        let author = fetch_author(&*store, username.clone()).await?;

        if store.follow(user.id(), author.id).await? {
            info!(user = %user.username(), author = %author.username, "Followed author");
        }
    }

    Ok(Found::profile(&username))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/unfollow/", rejection(ServerError))]
struct UnfollowPath {
    username: Username,
}

async fn profile_unfollow(
    UnfollowPath { username }: UnfollowPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Found> {
    let author = fetch_author(&*store, username.clone()).await?;

    if store.unfollow(user.id(), author.id).await? {
        info!(user = %user.username(), author = %author.username, "Unfollowed author");
    }

    Ok(Found::profile(&username))
}
