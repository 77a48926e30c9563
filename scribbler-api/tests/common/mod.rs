#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{
        Request, Response, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
    },
};
use async_trait::async_trait;
use http_body_util::BodyExt;
use scribbler_api::server::{self, AuthConfig, MediaStorage, PageCache, ServerState};
use scribbler_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash, Authentication},
    author::{Author, AuthorMarker, Credentials, NewAuthor, Username},
    comment::{Comment, NewComment},
    group::{Group, NewGroup, Slug},
    post::{NewPost, Post, PostContent, PostMarker},
};
use scribbler_db::{DbError, MemoryStore, PostFilter, Result, Store};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tempfile::TempDir;
use tower::ServiceExt;

/// A one-pixel GIF.
pub const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff!\xf9\x04\x00\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

/// The full router over an in-memory store and a scratch media root.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub home_cache: PageCache,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache_ttl(Duration::from_secs(20))
    }

    pub fn with_cache_ttl(ttl: Duration) -> Self {
        let media = tempfile::tempdir().unwrap();
        let media_root = media.path().to_owned();
        Self::build(ttl, media, media_root, |store| store)
    }

    /// Media below a plain file, so every upload fails.
    pub fn with_broken_media() -> Self {
        let media = tempfile::tempdir().unwrap();
        let media_root = media.path().join("blocked");
        std::fs::write(&media_root, b"not a directory").unwrap();
        Self::build(Duration::from_secs(20), media, media_root, |store| store)
    }

    /// The server sees a store whose post writes always fail; `store` still
    /// reads and writes the data behind it.
    pub fn with_failing_post_writes() -> Self {
        let media = tempfile::tempdir().unwrap();
        let media_root = media.path().to_owned();
        Self::build(Duration::from_secs(20), media, media_root, |store| {
            Arc::new(FailingPostWrites(store))
        })
    }

    fn build(
        ttl: Duration,
        media: TempDir,
        media_root: PathBuf,
        served: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn Store>,
    ) -> Self {
        let store = Arc::new(MemoryStore::default());
        let home_cache = PageCache::new(ttl);

        let state = ServerState {
            store: served(store.clone()),
            home_cache: home_cache.clone(),
            media: Arc::new(MediaStorage::new(media_root)),
            auth: AuthConfig::default(),
        };

        Self {
            router: server::app(state),
            store,
            home_cache,
            media,
        }
    }

    /// Creates an author and a bearer token for them.
    pub async fn author(&self, username: &str) -> (Author, String) {
        let author = self
            .store
            .create_author(&NewAuthor {
                username: Username::new(username.to_owned()).unwrap(),
                password_hash: "unusable".to_owned(),
            })
            .await
            .unwrap();

        let token = AuthToken::generate_random(author.id);
        let authentication = Authentication::issue(author.id, token.hash().unwrap(), None);
        self.store.create_auth(&authentication).await.unwrap();

        (author, token.as_token_str())
    }

    pub async fn group(&self, title: &str, slug: &str) -> Group {
        self.store
            .create_group(&NewGroup {
                title: title.to_owned(),
                slug: Slug::new(slug.to_owned()).unwrap(),
                description: format!("All about {title}"),
            })
            .await
            .unwrap()
    }

    pub async fn post(&self, author: &Author, text: &str, group: Option<&Group>) -> Post {
        self.store
            .create_post(&NewPost {
                author: author.id,
                content: PostContent {
                    text: text.to_owned(),
                    group: group.map(|group| group.id),
                    image: None,
                },
            })
            .await
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: &Value) -> Response<Body> {
        self.post_raw(uri, token, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, token: Option<&str>, body: String) -> Response<Body> {
        let mut request = Request::post(uri).header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(request.body(Body::from(body)).unwrap()).await
    }
}

/// Delegates everything except creating and updating posts, which fail.
#[derive(Debug)]
struct FailingPostWrites(Arc<MemoryStore>);

#[async_trait]
impl Store for FailingPostWrites {
    async fn create_author(&self, author: &NewAuthor) -> Result<Author> {
        self.0.create_author(author).await
    }

    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        self.0.fetch_author(author_id).await
    }

    async fn fetch_author_by_username(&self, username: &Username) -> Result<Option<Author>> {
        self.0.fetch_author_by_username(username).await
    }

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>> {
        self.0.fetch_credentials(username).await
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        self.0.create_auth(authentication).await
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        self.0.fetch_auth(token_hash).await
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        self.0.create_group(group).await
    }

    async fn fetch_group_by_slug(&self, slug: &Slug) -> Result<Option<Group>> {
        self.0.fetch_group_by_slug(slug).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.0.list_groups().await
    }

    async fn create_post(&self, _post: &NewPost) -> Result<Post> {
        Err(DbError::MissingReference("author"))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        self.0.fetch_post(post_id).await
    }

    async fn fetch_author_post(
        &self,
        username: &Username,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Post>> {
        self.0.fetch_author_post(username, post_id).await
    }

    async fn update_post(
        &self,
        _post_id: Id<PostMarker>,
        _content: &PostContent,
    ) -> Result<Option<Post>> {
        Err(DbError::MissingReference("group"))
    }

    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> Result<Vec<Post>> {
        self.0.list_posts(filter, limit, offset).await
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        self.0.count_posts(filter).await
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.0.create_comment(comment).await
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        self.0.list_comments(post_id).await
    }

    async fn follow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool> {
        self.0.follow(user, author).await
    }

    async fn unfollow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool> {
        self.0.unfollow(user, author).await
    }

    async fn is_following(
        &self,
        user: Id<AuthorMarker>,
        author: Id<AuthorMarker>,
    ) -> Result<bool> {
        self.0.is_following(user, author).await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Asserts a `302 Found` and returns where it points.
pub fn location(response: &Response<Body>) -> &str {
    assert_eq!(response.status(), StatusCode::FOUND);
    response.headers()[LOCATION].to_str().unwrap()
}

pub fn login_location(next: &str) -> String {
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login/?next={next}")
}
