use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use scribbler_common::model::{Id, author::Username, post::PostMarker};
use serde::Serialize;
use url::form_urlencoded::byte_serialize;

/// JSON bodies in and out. Rejections and serialization failures both
/// surface as [`ServerError`]s.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

/// A JSON document answered with `201 Created`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

pub const LOGIN_PATH: &str = "/auth/login/";

/// A `302 Found` redirect to one of the canonical views.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Found(String);

/// What a form handler produces: the (re-)rendered form, or a redirect once
/// the submission has been handled.
#[derive(Clone, Debug)]
pub enum Outcome<T> {
    Render(T),
    Redirect(Found),
}

impl Found {
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    #[must_use]
    pub fn index() -> Self {
        Self::to("/")
    }

    #[must_use]
    pub fn profile(username: &Username) -> Self {
        Self(format!("/{username}/"))
    }

    #[must_use]
    pub fn post(username: &Username, post_id: Id<PostMarker>) -> Self {
        Self(format!("/{username}/{post_id}/"))
    }

    /// The login page, returning to `next` afterwards.
    #[must_use]
    pub fn login(next: &str) -> Self {
        let next: String = byte_serialize(next.as_bytes()).collect();
        Self(format!("{LOGIN_PATH}?next={next}"))
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.0
    }
}

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(LOCATION, self.0)]).into_response()
    }
}

impl<T: IntoResponse> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        match self {
            Outcome::Render(page) => page.into_response(),
            Outcome::Redirect(found) => found.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::response::Found;
    use scribbler_common::model::{Id, author::Username};

    #[test]
    fn canonical_locations() {
        let alice = Username::new("alice".to_owned()).unwrap();

        assert_eq!(Found::index().location(), "/");
        assert_eq!(Found::profile(&alice).location(), "/alice/");
        assert_eq!(Found::post(&alice, Id::from(42)).location(), "/alice/42/");
    }

    #[test]
    fn login_location_encodes_next() {
        assert_eq!(
            Found::login("/follow/?page=2").location(),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }
}
