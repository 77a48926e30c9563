use crate::server::ServerError;
use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HOME_CACHE_TTL: Duration = Duration::from_secs(20);
const MAX_CACHED_PAGES: u64 = 1024;

/// Whole responses keyed by path and query, each kept for a fixed time after
/// it was rendered. Writes elsewhere do not invalidate entries.
#[derive(Clone, Debug)]
pub struct PageCache {
    pages: Cache<String, CachedPage>,
}

#[derive(Clone, Debug)]
struct CachedPage {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl PageCache {
    #[must_use]
    pub fn new(time_to_live: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_CACHED_PAGES)
            .time_to_live(time_to_live)
            .build();

        Self { pages }
    }

    pub fn clear(&self) {
        self.pages.invalidate_all();
    }

    async fn get(&self, key: &str) -> Option<Response> {
        let page = self.pages.get(key).await?;

        let mut response = Response::new(Body::from(page.body));
        *response.status_mut() = page.status;
        *response.headers_mut() = page.headers;
        Some(response)
    }

    async fn insert(&self, key: String, page: CachedPage) {
        self.pages.insert(key, page).await;
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_HOME_CACHE_TTL)
    }
}

/// Serves a successful `GET` from the cache, or renders it and keeps a copy.
pub async fn cache_page(State(cache): State<PageCache>, request: Request, next: Next) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let key = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_owned(), ToString::to_string);

    if let Some(response) = cache.get(&key).await {
        debug!(%key, "Serving cached page");
        return response;
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(err) => return ServerError::ResponseBody(err).into_response(),
    };

    let page = CachedPage {
        status: parts.status,
        headers: parts.headers.clone(),
        body: body.clone(),
    };
    cache.insert(key, page).await;

    Response::from_parts(parts, Body::from(body))
}
