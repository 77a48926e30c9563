use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser,
    response::{Found, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use scribbler_common::{
    form::CommentForm,
    model::{Id, author::Username, comment::NewComment, post::PostMarker},
};
use scribbler_db::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/comment/", rejection(ServerError))]
struct CommentPath {
    username: Username,
    post_id: Id<PostMarker>,
}

/// Invalid or unreadable submissions are dropped without telling the
/// client; every outcome leads back to the post.
async fn add_comment(
    CommentPath { username, post_id }: CommentPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    form: Result<Json<CommentForm>, ServerError>,
) -> Result<Found> {
    let post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    match form.map(|Json(form)| form.validate()) {
        Ok(Ok(valid)) => {
            let comment = store
                .create_comment(&NewComment {
                    post: post.id,
                    author: user.id(),
                    text: valid.text,
                })
                .await?;
            info!(comment_id = %comment.id, %post_id, author = %user.username(), "Added comment");
        }
        Ok(Err(errors)) => debug!(?errors, %post_id, "Dropping invalid comment"),
        Err(err) => debug!(%err, %post_id, "Dropping unreadable comment"),
    }

    Ok(Found::post(&username, post_id))
}
