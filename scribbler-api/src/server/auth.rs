use crate::server::{Result, ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use scribbler_common::model::{
    Id,
    auth::AuthToken,
    author::{Author, AuthorMarker, Username},
};
use scribbler_db::Store;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The author behind a valid bearer token. Rejects anonymous requests with a
/// redirect to the login page.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    author: Author,
}

/// Whoever is asking, if they are logged in at all.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Viewer(pub Option<AuthenticatedUser>);

impl AuthenticatedUser {
    #[must_use]
    pub fn author(&self) -> &Author {
        &self.author
    }

    #[must_use]
    pub fn id(&self) -> Id<AuthorMarker> {
        self.author.id
    }

    #[must_use]
    pub fn username(&self) -> &Username {
        &self.author.username
    }
}

impl Viewer {
    #[must_use]
    pub fn id(&self) -> Option<Id<AuthorMarker>> {
        self.0.as_ref().map(AuthenticatedUser::id)
    }
}

/// Resolves the bearer token of a request. Malformed, unknown and expired
/// tokens are treated like a missing one.
async fn authenticate(parts: &mut Parts, store: &dyn Store) -> Result<Option<AuthenticatedUser>> {
    let Ok(TypedHeader(Authorization(bearer))) =
        AuthorizationHeader::from_request_parts(parts, &()).await
    else {
        return Ok(None);
    };

    let request_token: AuthToken = match bearer.token().parse() {
        Ok(token) => token,
        Err(err) => {
            debug!(%err, "Ignoring malformed auth token");
            return Ok(None);
        }
    };

    let token_hash = request_token.hash()?;

    let Some(authentication) = store.fetch_auth(&token_hash).await? else {
        debug!(author = %request_token.author_id, "Ignoring unknown auth token");
        return Ok(None);
    };

    if authentication.author != request_token.author_id
        || authentication.is_expired_at(OffsetDateTime::now_utc())
    {
        debug!(author = %request_token.author_id, "Ignoring stale auth token");
        return Ok(None);
    }

    let author = store.fetch_author(authentication.author).await?;
    Ok(author.map(|author| AuthenticatedUser { author }))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<dyn Store>::from_ref(state);

        authenticate(parts, &*store).await?.ok_or_else(|| {
            let next = parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string);
            ServerError::LoginRequired(next)
        })
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<dyn Store>::from_ref(state);

        Ok(Self(authenticate(parts, &*store).await?))
    }
}
