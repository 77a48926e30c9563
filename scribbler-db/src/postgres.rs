use crate::{
    record::{
        AuthenticationRecord, AuthorRecord, CommentRecord, CredentialsRecord, GroupRecord,
        PostRecord, to_db_id,
    },
    store::{DbError, PostFilter, Result, Store},
};
use async_trait::async_trait;
use scribbler_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        author::{Author, AuthorMarker, Credentials, NewAuthor, Username},
        comment::{Comment, NewComment},
        group::{Group, NewGroup, Slug},
        post::{NewPost, Post, PostContent, PostMarker},
    },
    snowflake::{NodeId, Snowflake, SnowflakeGenerator},
};
use sqlx::{
    PgPool, Postgres, QueryBuilder, migrate::Migrator, postgres::PgPoolOptions, query,
    query_as, query_scalar,
};
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const POST_COLUMNS: &str = "
    p.post_snowflake,
    p.text,
    p.pub_date,
    p.image,
    a.author_snowflake,
    a.username,
    g.group_snowflake,
    g.title AS group_title,
    g.slug AS group_slug,
    g.description AS group_description";

const POST_JOINS: &str = "
    JOIN authors.authors AS a ON a.author_snowflake = p.author_snowflake
    LEFT JOIN posts.post_groups AS g ON g.group_snowflake = p.group_snowflake";

const COMMENT_COLUMNS: &str = "
    c.comment_snowflake,
    c.post_snowflake,
    c.text,
    c.created,
    a.author_snowflake,
    a.username";

#[derive(Debug)]
pub struct PgStore {
    pool: PgPool,
    snowflake_generator: Mutex<SnowflakeGenerator>,
}

fn conflict_on_unique(err: sqlx::Error, what: &'static str) -> DbError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return DbError::Conflict(what);
    }
    err.into()
}

fn missing_reference(err: sqlx::Error, what: &'static str) -> DbError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_foreign_key_violation()
    {
        return DbError::MissingReference(what);
    }
    err.into()
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            builder
                .push(" WHERE p.group_snowflake = ")
                .push_bind(to_db_id(group_id));
        }
        PostFilter::Author(author_id) => {
            builder
                .push(" WHERE p.author_snowflake = ")
                .push_bind(to_db_id(author_id));
        }
        PostFilter::FollowedBy(user_id) => {
            builder
                .push(
                    " WHERE p.author_snowflake IN (
                        SELECT f.author_snowflake FROM authors.follows AS f
                        WHERE f.user_snowflake = ",
                )
                .push_bind(to_db_id(user_id))
                .push(")");
        }
    }
}

fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool, node_id: NodeId) -> Self {
        Self {
            pool,
            snowflake_generator: Mutex::new(SnowflakeGenerator::new(node_id)),
        }
    }

    pub async fn connect(url: &str, max_connections: u32, node_id: NodeId) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self::new(pool, node_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    fn next_snowflake(&self) -> Snowflake {
        self.snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_author(&self, author: &NewAuthor) -> Result<Author> {
        let author_snowflake = self.next_snowflake();

        let record = query_as::<_, AuthorRecord>(
            "
            INSERT INTO authors.authors (author_snowflake, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING author_snowflake, username
            ",
        )
        .bind(author_snowflake.get().cast_signed())
        .bind(author.username.get())
        .bind(&author.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "username"))?;

        Ok(Author::try_from(record)?)
    }

    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        let record = query_as::<_, AuthorRecord>(
            "
            SELECT author_snowflake, username
            FROM authors.authors
            WHERE author_snowflake = $1
            ",
        )
        .bind(to_db_id(author_id))
        .fetch_optional(&self.pool)
        .await?;

        let author = record.map(Author::try_from).transpose()?;
        Ok(author)
    }

    async fn fetch_author_by_username(&self, username: &Username) -> Result<Option<Author>> {
        let record = query_as::<_, AuthorRecord>(
            "
            SELECT author_snowflake, username
            FROM authors.authors
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let author = record.map(Author::try_from).transpose()?;
        Ok(author)
    }

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT author_snowflake, username, password_hash
            FROM authors.authors
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO authors.authentications
                (token_hash, author_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(to_db_id(authentication.author))
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|lifetime| lifetime.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "token_hash"))?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT author_snowflake, token_hash, created_at, expires_after_seconds
            FROM authors.authentications
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let group_snowflake = self.next_snowflake();

        let record = query_as::<_, GroupRecord>(
            "
            INSERT INTO posts.post_groups (group_snowflake, title, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING group_snowflake, title, slug, description
            ",
        )
        .bind(group_snowflake.get().cast_signed())
        .bind(&group.title)
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "slug"))?;

        Ok(Group::try_from(record)?)
    }

    async fn fetch_group_by_slug(&self, slug: &Slug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_snowflake, title, slug, description
            FROM posts.post_groups
            WHERE slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT group_snowflake, title, slug, description
            FROM posts.post_groups
            ORDER BY title, group_snowflake
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let post_snowflake = self.next_snowflake();

        let sql = format!(
            "
            WITH p AS (
                INSERT INTO posts.posts
                    (post_snowflake, text, pub_date, image, author_snowflake, group_snowflake)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p {POST_JOINS}
            "
        );
        let record = query_as::<_, PostRecord>(&sql)
            .bind(post_snowflake.get().cast_signed())
            .bind(&post.content.text)
            .bind(OffsetDateTime::now_utc())
            .bind(post.content.image.as_deref())
            .bind(to_db_id(post.author))
            .bind(post.content.group.map(to_db_id))
            .fetch_one(&self.pool)
            .await
            .map_err(|err| missing_reference(err, "author or group"))?;

        Ok(Post::try_from(record)?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts.posts AS p {POST_JOINS} WHERE p.post_snowflake = $1"
        );
        let record = query_as::<_, PostRecord>(&sql)
            .bind(to_db_id(post_id))
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_author_post(
        &self,
        username: &Username,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "
            SELECT {POST_COLUMNS} FROM posts.posts AS p {POST_JOINS}
            WHERE p.post_snowflake = $1 AND a.username = $2
            "
        );
        let record = query_as::<_, PostRecord>(&sql)
            .bind(to_db_id(post_id))
            .bind(username.get())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "
            WITH p AS (
                UPDATE posts.posts
                SET text = $2, group_snowflake = $3, image = $4
                WHERE post_snowflake = $1
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p {POST_JOINS}
            "
        );
        let record = query_as::<_, PostRecord>(&sql)
            .bind(to_db_id(post_id))
            .bind(&content.text)
            .bind(content.group.map(to_db_id))
            .bind(content.image.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| missing_reference(err, "group"))?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> Result<Vec<Post>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {POST_COLUMNS} FROM posts.posts AS p {POST_JOINS}"
        ));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY p.post_snowflake DESC LIMIT ")
            .push_bind(to_db_count(limit))
            .push(" OFFSET ")
            .push_bind(to_db_count(offset));

        let records = builder
            .build_query_as::<PostRecord>()
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts.posts AS p");
        push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let comment_snowflake = self.next_snowflake();

        let sql = format!(
            "
            WITH c AS (
                INSERT INTO posts.comments
                    (comment_snowflake, post_snowflake, author_snowflake, text, created)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT {COMMENT_COLUMNS}
            FROM c JOIN authors.authors AS a ON a.author_snowflake = c.author_snowflake
            "
        );
        let record = query_as::<_, CommentRecord>(&sql)
            .bind(comment_snowflake.get().cast_signed())
            .bind(to_db_id(comment.post))
            .bind(to_db_id(comment.author))
            .bind(&comment.text)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.pool)
            .await
            .map_err(|err| missing_reference(err, "post or author"))?;

        Ok(Comment::try_from(record)?)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let sql = format!(
            "
            SELECT {COMMENT_COLUMNS}
            FROM posts.comments AS c
                JOIN authors.authors AS a ON a.author_snowflake = c.author_snowflake
            WHERE c.post_snowflake = $1
            ORDER BY c.comment_snowflake
            "
        );
        let records = query_as::<_, CommentRecord>(&sql)
            .bind(to_db_id(post_id))
            .fetch_all(&self.pool)
            .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn follow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool> {
        let result = query(
            "
            INSERT INTO authors.follows (user_snowflake, author_snowflake)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(to_db_id(user))
        .bind(to_db_id(author))
        .execute(&self.pool)
        .await
        .map_err(|err| missing_reference(err, "author"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn unfollow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool> {
        let result = query(
            "
            DELETE FROM authors.follows
            WHERE user_snowflake = $1 AND author_snowflake = $2
            ",
        )
        .bind(to_db_id(user))
        .bind(to_db_id(author))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(
        &self,
        user: Id<AuthorMarker>,
        author: Id<AuthorMarker>,
    ) -> Result<bool> {
        let following = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM authors.follows
                WHERE user_snowflake = $1 AND author_snowflake = $2
            )
            ",
        )
        .bind(to_db_id(user))
        .bind(to_db_id(author))
        .fetch_one(&self.pool)
        .await?;

        Ok(following)
    }
}
