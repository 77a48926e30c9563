use crate::server::{
    MediaStorage, Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    response::{Found, Json, Outcome},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use scribbler_common::{
    form::{CommentForm, FieldErrors, PostForm, ValidPost},
    model::{
        Id,
        author::{Author, Username},
        comment::Comment,
        group::Group,
        post::{NewPost, Post, PostContent, PostMarker},
    },
};
use scribbler_db::{PostFilter, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(new_post_form)
        .typed_post(new_post)
        .typed_get(post_view)
        .typed_get(post_edit_form)
        .typed_post(post_edit)
}

/// The post form, either empty, prefilled for editing or re-rendered with
/// the submitted values and their errors.
#[derive(Clone, Debug, Serialize)]
struct PostFormPage {
    form: PostForm,
    errors: FieldErrors,
    groups: Vec<Group>,
    is_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    post: Option<Post>,
}

#[derive(Clone, Debug, Serialize)]
struct PostPage {
    post: Post,
    author: Author,
    count_posts: u64,
    comments: Vec<Comment>,
    form: CommentForm,
}

/// Stores the image of a valid submission, if any, and builds the post content.
/// `previous_image` is kept when nothing new was uploaded.
async fn post_content(
    media: &MediaStorage,
    valid: ValidPost,
    previous_image: Option<String>,
) -> Result<PostContent> {
    let image = match &valid.image {
        Some(image) => Some(media.save_post_image(image).await?),
        None => previous_image,
    };

    Ok(PostContent {
        text: valid.text,
        group: valid.group,
        image,
    })
}

/// Cleans up after a write that failed once its image was already stored.
async fn discard_image(media: &MediaStorage, image: Option<&str>) {
    let Some(image) = image else {
        return;
    };
    if let Err(err) = media.remove(image).await {
        warn!(%err, image, "Could not remove image of a failed write");
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/new/", rejection(ServerError))]
struct NewPostPath();

async fn new_post_form(
    NewPostPath(): NewPostPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Json<PostFormPage>> {
    Ok(Json(PostFormPage {
        form: PostForm::default(),
        errors: FieldErrors::new(),
        groups: store.list_groups().await?,
        is_edit: false,
        post: None,
    }))
}

async fn new_post(
    NewPostPath(): NewPostPath,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStorage>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Outcome<Json<PostFormPage>>> {
    let groups = store.list_groups().await?;

    let valid = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Outcome::Render(Json(PostFormPage {
                form,
                errors,
                groups,
                is_edit: false,
                post: None,
            })));
        }
    };

    let new_post = NewPost {
        author: user.id(),
        content: post_content(&media, valid, None).await?,
    };
    let post = match store.create_post(&new_post).await {
        Ok(post) => post,
        Err(err) => {
            discard_image(&media, new_post.content.image.as_deref()).await;
            return Err(err.into());
        }
    };
    info!(post_id = %post.id, author = %user.username(), "Created post");

    Ok(Outcome::Redirect(Found::index()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/", rejection(ServerError))]
struct PostPath {
    username: Username,
    post_id: Id<PostMarker>,
}

/// The post is looked up by id alone; the username only shapes the URL.
async fn post_view(
    PostPath {
        username: _,
        post_id,
    }: PostPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<PostPage>> {
    let post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    let author = post.author.clone();
    let count_posts = store.count_posts(PostFilter::Author(author.id)).await?;
    let comments = store.list_comments(post.id).await?;

    Ok(Json(PostPage {
        post,
        author,
        count_posts,
        comments,
        form: CommentForm::default(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/edit/", rejection(ServerError))]
struct EditPostPath {
    username: Username,
    post_id: Id<PostMarker>,
}

/// The post to edit, provided `user` wrote it. Anyone else is sent back to
/// the post without learning more.
async fn editable_post(
    store: &dyn Store,
    username: &Username,
    post_id: Id<PostMarker>,
    user: &AuthenticatedUser,
) -> Result<Result<Post, Found>> {
    let post = store
        .fetch_author_post(username, post_id)
        .await?
        .ok_or_else(|| ServerError::AuthorPostNotFound(username.clone(), post_id))?;

    if post.author.id == user.id() {
        Ok(Ok(post))
    } else {
        Ok(Err(Found::post(username, post_id)))
    }
}

async fn post_edit_form(
    EditPostPath { username, post_id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Outcome<Json<PostFormPage>>> {
    let post = match editable_post(&*store, &username, post_id, &user).await? {
        Ok(post) => post,
        Err(found) => return Ok(Outcome::Redirect(found)),
    };

    let form = PostForm {
        text: post.text.clone(),
        group: post.group.as_ref().map(|group| group.id),
        image: None,
    };

    Ok(Outcome::Render(Json(PostFormPage {
        form,
        errors: FieldErrors::new(),
        groups: store.list_groups().await?,
        is_edit: true,
        post: Some(post),
    })))
}

async fn post_edit(
    EditPostPath { username, post_id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStorage>>,
    user: AuthenticatedUser,
    form: Result<Json<PostForm>, ServerError>,
) -> Result<Outcome<Json<PostFormPage>>> {
    let post = match editable_post(&*store, &username, post_id, &user).await? {
        Ok(post) => post,
        Err(found) => return Ok(Outcome::Redirect(found)),
    };
    let Json(form) = form?;

    let groups = store.list_groups().await?;
    let valid = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Outcome::Render(Json(PostFormPage {
                form,
                errors,
                groups,
                is_edit: true,
                post: Some(post),
            })));
        }
    };

    let previous_image = post.image;
    let content = post_content(&media, valid, previous_image.clone()).await?;
    let updated = store
        .update_post(post_id, &content)
        .await
        .map_err(ServerError::from)
        .and_then(|updated| updated.ok_or(ServerError::PostByIdNotFound(post_id)));
    if let Err(err) = updated {
        let new_image = content
            .image
            .as_deref()
            .filter(|&image| Some(image) != previous_image.as_deref());
        discard_image(&media, new_image).await;
        return Err(err);
    }
    info!(%post_id, author = %user.username(), "Edited post");

    Ok(Outcome::Redirect(Found::post(&username, post_id)))
}
