use crate::server::{
    Result, ServerError, ServerRouter, ServerState,
    auth::AuthenticatedUser,
    cache::cache_page,
    response::Json,
    routes::{PageQuery, paginate},
};
use axum::{extract::State, middleware::from_fn_with_state};
use axum_extra::routing::{RouterExt, TypedPath};
use scribbler_common::{
    model::{
        group::{Group, Slug},
        post::Post,
    },
    paginator::Page,
};
use scribbler_db::{PostFilter, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes(state: &ServerState) -> ServerRouter {
    let home = ServerRouter::new()
        .typed_get(index)
        .route_layer(from_fn_with_state(state.home_cache.clone(), cache_page));

    ServerRouter::new()
        .merge(home)
        .typed_get(group_posts)
        .typed_get(follow_index)
}

#[derive(Clone, Debug, Serialize)]
struct TimelinePage {
    page: Page<Post>,
}

#[derive(Clone, Debug, Serialize)]
struct GroupPage {
    group: Group,
    page: Page<Post>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

async fn index(
    IndexPath(): IndexPath,
    State(store): State<Arc<dyn Store>>,
    query: PageQuery,
) -> Result<Json<TimelinePage>> {
    let page = paginate(&*store, PostFilter::All, &query).await?;

    Ok(Json(TimelinePage { page }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: Slug,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    State(store): State<Arc<dyn Store>>,
    query: PageQuery,
) -> Result<Json<GroupPage>> {
    let group = store
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or(ServerError::GroupBySlugNotFound(slug))?;

    let page = paginate(&*store, PostFilter::Group(group.id), &query).await?;

    Ok(Json(GroupPage { group, page }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
struct FollowIndexPath();

async fn follow_index(
    FollowIndexPath(): FollowIndexPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    query: PageQuery,
) -> Result<Json<TimelinePage>> {
    let page = paginate(&*store, PostFilter::FollowedBy(user.id()), &query).await?;

    Ok(Json(TimelinePage { page }))
}
