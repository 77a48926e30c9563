use crate::server::response::{Found, Json};
use axum::{
    Router,
    extract::{
        FromRef,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use scribbler_common::model::{
    Id,
    auth::{AuthTokenHashError, PasswordHashError, TokenLifetime},
    author::Username,
    group::Slug,
    post::PostMarker,
};
use scribbler_db::{DbError, Store};
use serde::Serialize;
use std::{any::Any, sync::Arc};
use thiserror::Error;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error};

pub mod auth;
pub mod cache;
pub mod media;
pub mod response;
mod routes;

pub use cache::PageCache;
pub use media::MediaStorage;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub home_cache: PageCache,
    pub media: Arc<MediaStorage>,
    pub auth: AuthConfig,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AuthConfig {
    /// Lifetime of newly issued tokens; `None` issues tokens that never expire.
    pub token_lifetime: Option<TokenLifetime>,
}

/// The complete application: every route plus the error, panic and tracing layers.
pub fn app(state: ServerState) -> Router {
    routes::routes(&state)
        .fallback(fallback)
        .layer(CatchPanicLayer::custom(render_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(uri: Uri) -> ServerError {
    ServerError::UnknownRoute(uri)
}

fn render_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = message, "Handler panicked");

    ServerError::Panic.into_response()
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Login required to access {0}")]
    LoginRequired(String),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Media could not be stored: {0}")]
    Media(#[from] std::io::Error),
    #[error("Response body could not be buffered: {0}")]
    ResponseBody(axum::Error),
    #[error("Group with slug {0} was not found.")]
    GroupBySlugNotFound(Slug),
    #[error("Author {0} was not found.")]
    AuthorNotFound(Username),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Author {0} has no post with id {1}.")]
    AuthorPostNotFound(Username, Id<PostMarker>),
    #[error("A handler panicked")]
    Panic,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::GroupBySlugNotFound(_)
            | ServerError::AuthorNotFound(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::AuthorPostNotFound(..) => StatusCode::NOT_FOUND,
            ServerError::LoginRequired(_) => StatusCode::FOUND,
            ServerError::QueryRejection(_) | ServerError::JsonRejection(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::Database(_)
            | ServerError::Media(_)
            | ServerError::ResponseBody(_)
            | ServerError::Panic => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    /// Only given for client errors; server errors stay opaque.
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::LoginRequired(next) = &self {
            debug!(%next, "Redirecting anonymous request to login");
            return Found::login(next).into_response();
        }

        let status = self.status();

        let detail = if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
            None
        } else {
            debug!(error = %self, %status, "Replying with error");
            Some(self.to_string())
        };

        let error_response = ErrorResponse {
            status: status.as_u16(),
            detail,
        };
        (status, Json(error_response)).into_response()
    }
}
