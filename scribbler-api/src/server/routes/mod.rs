use crate::server::{Result, ServerError, ServerRouter, ServerState};
use axum::extract::{FromRequestParts, Query};
use scribbler_common::{
    model::post::Post,
    paginator::{POSTS_PER_PAGE, Page, Paginator},
};
use scribbler_db::{PostFilter, Store};
use serde::Deserialize;

mod about;
mod accounts;
mod comments;
mod posts;
mod profiles;
mod timelines;

pub fn routes(state: &ServerState) -> ServerRouter {
    ServerRouter::new()
        .merge(timelines::routes(state))
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(profiles::routes())
        .merge(about::routes())
        .merge(accounts::routes())
}

/// The raw `?page=` value. It is resolved leniently by [`Paginator`], so
/// anything is accepted here.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, FromRequestParts)]
#[from_request(via(Query), rejection(ServerError))]
pub struct PageQuery {
    page: Option<String>,
}

/// One page of posts matching `filter`, newest first.
pub async fn paginate(store: &dyn Store, filter: PostFilter, query: &PageQuery) -> Result<Page<Post>> {
    let paginator = Paginator::new(store.count_posts(filter).await?, POSTS_PER_PAGE);
    let window = paginator.window(query.page.as_deref());

    let posts = store
        .list_posts(filter, window.limit, window.offset)
        .await?;

    Ok(paginator.page(window, posts))
}
