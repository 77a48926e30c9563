use crate::server::{
    AuthConfig, Result, ServerError, ServerRouter,
    response::{Created, Json},
};
use axum::{
    extract::{FromRequestParts, Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use scribbler_common::{
    form::{CredentialsForm, FieldErrors, INVALID_LOGIN, NON_FIELD_ERRORS, USERNAME_TAKEN},
    model::{
        Id,
        auth::{AuthToken, Authentication, TokenLifetime, hash_password, verify_login},
        author::{Author, AuthorMarker, NewAuthor},
    },
};
use scribbler_db::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(login_form)
        .typed_post(login)
        .typed_post(signup)
}

/// Where to continue after logging in, as set by the login redirect.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, FromRequestParts)]
#[from_request(via(Query), rejection(ServerError))]
struct LoginQuery {
    next: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
struct CredentialsPage {
    form: CredentialsForm,
    errors: FieldErrors,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

/// A freshly issued bearer token. It is shown exactly once.
#[derive(Clone, Debug, Serialize)]
struct SessionPage {
    author: Author,
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

async fn issue_token(
    store: &dyn Store,
    author: Id<AuthorMarker>,
    lifetime: Option<TokenLifetime>,
) -> Result<String> {
    let token = AuthToken::generate_random(author);
    let authentication = Authentication::issue(author, token.hash()?, lifetime);
    store.create_auth(&authentication).await?;

    Ok(token.as_token_str())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login/", rejection(ServerError))]
struct LoginPath();

async fn login_form(LoginPath(): LoginPath, LoginQuery { next }: LoginQuery) -> Json<CredentialsPage> {
    Json(CredentialsPage {
        form: CredentialsForm::default(),
        errors: FieldErrors::new(),
        next,
    })
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(auth): State<AuthConfig>,
    LoginQuery { next }: LoginQuery,
    Json(form): Json<CredentialsForm>,
) -> Result<Response> {
    let rejected = |form, errors| {
        Json(CredentialsPage {
            form,
            errors,
            next: next.clone(),
        })
        .into_response()
    };

    let valid = match form.validate_login() {
        Ok(valid) => valid,
        Err(errors) => return Ok(rejected(form, errors)),
    };

    let credentials = store.fetch_credentials(&valid.username).await?;
    let verified = verify_login(
        &valid.password,
        credentials
            .as_ref()
            .map(|credentials| credentials.password_hash.as_str()),
    );
    let Some(credentials) = credentials.filter(|_| verified) else {
        debug!(username = %valid.username, "Rejected login");
        return Ok(rejected(
            form,
            FieldErrors::single(NON_FIELD_ERRORS, INVALID_LOGIN),
        ));
    };

    let author = credentials.author;
    let token = issue_token(&*store, author.id, auth.token_lifetime).await?;
    info!(author = %author.username, "Logged in");

    Ok(Json(SessionPage {
        author,
        token,
        next,
    })
    .into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/", rejection(ServerError))]
struct SignupPath();

async fn signup(
    SignupPath(): SignupPath,
    State(store): State<Arc<dyn Store>>,
    State(auth): State<AuthConfig>,
    Json(form): Json<CredentialsForm>,
) -> Result<Response> {
    let valid = match form.validate_signup() {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Json(CredentialsPage {
                form,
                errors,
                next: None,
            })
            .into_response());
        }
    };

    let new_author = NewAuthor {
        username: valid.username,
        password_hash: hash_password(&valid.password)?,
    };
    let author = match store.create_author(&new_author).await {
        Ok(author) => author,
        Err(DbError::Conflict(_)) => {
            return Ok(Json(CredentialsPage {
                form,
                errors: FieldErrors::single("username", USERNAME_TAKEN),
                next: None,
            })
            .into_response());
        }
        Err(err) => return Err(err.into()),
    };

    let token = issue_token(&*store, author.id, auth.token_lifetime).await?;
    info!(author = %author.username, "Signed up");

    Ok(Created(SessionPage {
        author,
        token,
        next: None,
    })
    .into_response())
}
