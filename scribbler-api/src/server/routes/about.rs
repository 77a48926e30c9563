use crate::server::{ServerError, ServerRouter, response::Json};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(about_author)
        .typed_get(about_tech)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct StaticPage {
    title: &'static str,
    body: &'static str,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/author/", rejection(ServerError))]
struct AboutAuthorPath();

async fn about_author(AboutAuthorPath(): AboutAuthorPath) -> Json<StaticPage> {
    Json(StaticPage {
        title: "About the author",
        body: "Scribbler is written and maintained by its contributors.",
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/tech/", rejection(ServerError))]
struct AboutTechPath();

async fn about_tech(AboutTechPath(): AboutTechPath) -> Json<StaticPage> {
    Json(StaticPage {
        title: "Technologies",
        body: "Built with Rust, axum, sqlx and PostgreSQL.",
    })
}
