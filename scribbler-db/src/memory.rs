//! A [`Store`] kept entirely in process memory.
//!
//! Mirrors the constraints of the PostgreSQL schema (unique usernames,
//! slugs and follows, references between rows) so that handlers behave the
//! same on either store. Used for local development without a database and
//! by the test suites.

use crate::store::{DbError, PostFilter, Result, Store};
use async_trait::async_trait;
use scribbler_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        author::{Author, AuthorMarker, Credentials, NewAuthor, Username},
        comment::{Comment, CommentMarker, NewComment},
        group::{Group, GroupMarker, NewGroup, Slug},
        post::{NewPost, Post, PostContent, PostMarker},
    },
    snowflake::{NodeId, SnowflakeGenerator},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug)]
struct PostRow {
    text: String,
    pub_date: OffsetDateTime,
    image: Option<String>,
    author: Id<AuthorMarker>,
    group: Option<Id<GroupMarker>>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
struct CommentRow {
    post: Id<PostMarker>,
    author: Id<AuthorMarker>,
    text: String,
    created: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    snowflake_generator: SnowflakeGenerator,
    authors: BTreeMap<Id<AuthorMarker>, Credentials>,
    authentications: Vec<Authentication>,
    groups: BTreeMap<Id<GroupMarker>, Group>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: BTreeMap<Id<CommentMarker>, CommentRow>,
    /// `(user, author)` pairs.
    follows: BTreeSet<(Id<AuthorMarker>, Id<AuthorMarker>)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

impl Tables {
    fn author(&self, author_id: Id<AuthorMarker>) -> Result<&Author> {
        self.authors
            .get(&author_id)
            .map(|credentials| &credentials.author)
            .ok_or(DbError::MissingReference("author"))
    }

    fn check_group(&self, group_id: Option<Id<GroupMarker>>) -> Result<()> {
        match group_id {
            Some(group_id) if !self.groups.contains_key(&group_id) => {
                Err(DbError::MissingReference("group"))
            }
            _ => Ok(()),
        }
    }

    fn post(&self, post_id: Id<PostMarker>, row: &PostRow) -> Result<Post> {
        Ok(Post {
            id: post_id,
            text: row.text.clone(),
            pub_date: row.pub_date,
            image: row.image.clone(),
            author: self.author(row.author)?.clone(),
            group: row
                .group
                .and_then(|group_id| self.groups.get(&group_id))
                .cloned(),
        })
    }

    fn comment(&self, comment_id: Id<CommentMarker>, row: &CommentRow) -> Result<Comment> {
        Ok(Comment {
            id: comment_id,
            post: row.post,
            author: self.author(row.author)?.clone(),
            text: row.text.clone(),
            created: row.created,
        })
    }

    fn matches(&self, filter: PostFilter, row: &PostRow) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => row.group == Some(group_id),
            PostFilter::Author(author_id) => row.author == author_id,
            PostFilter::FollowedBy(user_id) => self.follows.contains(&(user_id, row.author)),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            tables: Mutex::new(Tables {
                snowflake_generator: SnowflakeGenerator::new(node_id),
                ..Tables::default()
            }),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_author(&self, author: &NewAuthor) -> Result<Author> {
        let mut tables = self.tables();

        if tables
            .authors
            .values()
            .any(|existing| existing.author.username == author.username)
        {
            return Err(DbError::Conflict("username"));
        }

        let created = Author {
            id: tables.snowflake_generator.generate().into(),
            username: author.username.clone(),
        };
        tables.authors.insert(
            created.id,
            Credentials {
                author: created.clone(),
                password_hash: author.password_hash.clone(),
            },
        );

        Ok(created)
    }

    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        let tables = self.tables();
        Ok(tables.author(author_id).ok().cloned())
    }

    async fn fetch_author_by_username(&self, username: &Username) -> Result<Option<Author>> {
        Ok(self
            .fetch_credentials(username)
            .await?
            .map(|credentials| credentials.author))
    }

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>> {
        let tables = self.tables();
        Ok(tables
            .authors
            .values()
            .find(|credentials| &credentials.author.username == username)
            .cloned())
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.tables();

        tables.author(authentication.author)?;
        if tables
            .authentications
            .iter()
            .any(|existing| existing.token_hash == authentication.token_hash)
        {
            return Err(DbError::Conflict("token_hash"));
        }
        tables.authentications.push(authentication.clone());

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let tables = self.tables();
        Ok(tables
            .authentications
            .iter()
            .find(|authentication| &authentication.token_hash == token_hash)
            .cloned())
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let mut tables = self.tables();

        if tables.groups.values().any(|existing| existing.slug == group.slug) {
            return Err(DbError::Conflict("slug"));
        }

        let created = Group {
            id: tables.snowflake_generator.generate().into(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.insert(created.id, created.clone());

        Ok(created)
    }

    async fn fetch_group_by_slug(&self, slug: &Slug) -> Result<Option<Group>> {
        Ok(self
            .tables()
            .groups
            .values()
            .find(|group| &group.slug == slug)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.tables().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let mut tables = self.tables();

        tables.author(post.author)?;
        tables.check_group(post.content.group)?;

        let post_id = tables.snowflake_generator.generate().into();
        let row = PostRow {
            text: post.content.text.clone(),
            pub_date: OffsetDateTime::now_utc(),
            image: post.content.image.clone(),
            author: post.author,
            group: post.content.group,
        };
        let created = tables.post(post_id, &row)?;
        tables.posts.insert(post_id, row);

        Ok(created)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables();
        tables
            .posts
            .get(&post_id)
            .map(|row| tables.post(post_id, row))
            .transpose()
    }

    async fn fetch_author_post(
        &self,
        username: &Username,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Post>> {
        Ok(self
            .fetch_post(post_id)
            .await?
            .filter(|post| &post.author.username == username))
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables();

        tables.check_group(content.group)?;
        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        row.text.clone_from(&content.text);
        row.group = content.group;
        row.image.clone_from(&content.image);

        let row = row.clone();
        tables.post(post_id, &row).map(Some)
    }

    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> Result<Vec<Post>> {
        let tables = self.tables();
        tables
            .posts
            .iter()
            .rev()
            .filter(|(_, row)| tables.matches(filter, row))
            .skip(to_usize(offset))
            .take(to_usize(limit))
            .map(|(post_id, row)| tables.post(*post_id, row))
            .collect()
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let tables = self.tables();
        let count = tables
            .posts
            .values()
            .filter(|row| tables.matches(filter, row))
            .count();
        Ok(count as u64)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let mut tables = self.tables();

        tables.author(comment.author)?;
        if !tables.posts.contains_key(&comment.post) {
            return Err(DbError::MissingReference("post"));
        }

        let comment_id = tables.snowflake_generator.generate().into();
        let row = CommentRow {
            post: comment.post,
            author: comment.author,
            text: comment.text.clone(),
            created: OffsetDateTime::now_utc(),
        };
        let created = tables.comment(comment_id, &row)?;
        tables.comments.insert(comment_id, row);

        Ok(created)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables();
        tables
            .comments
            .iter()
            .filter(|(_, row)| row.post == post_id)
            .map(|(comment_id, row)| tables.comment(*comment_id, row))
            .collect()
    }

    async fn follow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool> {
        let mut tables = self.tables();

        tables.author(user)?;
        tables.author(author)?;

        Ok(tables.follows.insert((user, author)))
    }

    async fn unfollow(&self, user: Id<AuthorMarker>, author: Id<AuthorMarker>) -> Result<bool> {
        Ok(self.tables().follows.remove(&(user, author)))
    }

    async fn is_following(
        &self,
        user: Id<AuthorMarker>,
        author: Id<AuthorMarker>,
    ) -> Result<bool> {
        Ok(self.tables().follows.contains(&(user, author)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        memory::MemoryStore,
        store::{DbError, PostFilter, Store},
    };
    use scribbler_common::model::{
        author::{Author, NewAuthor, Username},
        comment::NewComment,
        group::{Group, NewGroup, Slug},
        post::{NewPost, Post, PostContent},
    };

    async fn author(store: &MemoryStore, username: &str) -> Author {
        store
            .create_author(&NewAuthor {
                username: Username::new(username.to_owned()).unwrap(),
                password_hash: String::new(),
            })
            .await
            .unwrap()
    }

    async fn group(store: &MemoryStore, slug: &str) -> Group {
        store
            .create_group(&NewGroup {
                title: slug.to_uppercase(),
                slug: Slug::new(slug.to_owned()).unwrap(),
                description: String::new(),
            })
            .await
            .unwrap()
    }

    async fn post(store: &MemoryStore, author: &Author, text: &str, group: Option<&Group>) -> Post {
        store
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

    #[tokio::test]
    async fn usernames_and_slugs_are_unique() {
        let store = MemoryStore::default();
        author(&store, "alice").await;
        group(&store, "cats").await;

        let duplicate_author = store
            .create_author(&NewAuthor {
                username: Username::new("alice".to_owned()).unwrap(),
                password_hash: String::new(),
            })
            .await;
        assert!(matches!(duplicate_author, Err(DbError::Conflict("username"))));

        let duplicate_group = store
            .create_group(&NewGroup {
                title: "Other".to_owned(),
                slug: Slug::new("cats".to_owned()).unwrap(),
                description: String::new(),
            })
            .await;
        assert!(matches!(duplicate_group, Err(DbError::Conflict("slug"))));
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first_per_filter() {
        let store = MemoryStore::default();
        let alice = author(&store, "alice").await;
        let bob = author(&store, "bob").await;
        let cats = group(&store, "cats").await;

        let first = post(&store, &alice, "first", Some(&cats)).await;
        let second = post(&store, &bob, "second", None).await;
        let third = post(&store, &alice, "third", None).await;

        let all = store.list_posts(PostFilter::All, 10, 0).await.unwrap();
        assert_eq!(all, [third.clone(), second.clone(), first.clone()]);

        let by_alice = store
            .list_posts(PostFilter::Author(alice.id), 10, 0)
            .await
            .unwrap();
        assert_eq!(by_alice, [third.clone(), first.clone()]);
        assert_eq!(store.count_posts(PostFilter::Author(alice.id)).await.unwrap(), 2);

        let in_cats = store
            .list_posts(PostFilter::Group(cats.id), 10, 0)
            .await
            .unwrap();
        assert_eq!(in_cats, [first.clone()]);

        let window = store.list_posts(PostFilter::All, 1, 1).await.unwrap();
        assert_eq!(window, [second]);
    }

    #[tokio::test]
    async fn follows_are_unique_and_feed_the_follow_filter() {
        let store = MemoryStore::default();
        let alice = author(&store, "alice").await;
        let bob = author(&store, "bob").await;
        let bobs_post = post(&store, &bob, "hello", None).await;
        post(&store, &alice, "own post", None).await;

        assert!(store.follow(alice.id, bob.id).await.unwrap());
        assert!(!store.follow(alice.id, bob.id).await.unwrap());
        assert!(store.is_following(alice.id, bob.id).await.unwrap());
        assert!(!store.is_following(bob.id, alice.id).await.unwrap());

        let feed = store
            .list_posts(PostFilter::FollowedBy(alice.id), 10, 0)
            .await
            .unwrap();
        assert_eq!(feed, [bobs_post]);

        assert!(store.unfollow(alice.id, bob.id).await.unwrap());
        assert!(!store.unfollow(alice.id, bob.id).await.unwrap());
        assert_eq!(
            store.count_posts(PostFilter::FollowedBy(alice.id)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn updates_keep_the_author() {
        let store = MemoryStore::default();
        let alice = author(&store, "alice").await;
        let cats = group(&store, "cats").await;
        let created = post(&store, &alice, "before", None).await;

        let updated = store
            .update_post(
                created.id,
                &PostContent {
                    text: "after".to_owned(),
                    group: Some(cats.id),
                    image: Some("posts/cat.gif".to_owned()),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.author, alice);
        assert_eq!(updated.text, "after");
        assert_eq!(updated.group, Some(cats));
        assert_eq!(updated.pub_date, created.pub_date);

        let bob = Username::new("bob".to_owned()).unwrap();
        assert!(store.fetch_author_post(&bob, created.id).await.unwrap().is_none());
        assert_eq!(
            store
                .fetch_author_post(&alice.username, created.id)
                .await
                .unwrap(),
            Some(updated)
        );
    }

    #[tokio::test]
    async fn comments_are_listed_oldest_first() {
        let store = MemoryStore::default();
        let alice = author(&store, "alice").await;
        let created = post(&store, &alice, "post", None).await;

        for text in ["one", "two"] {
            store
                .create_comment(&NewComment {
                    post: created.id,
                    author: alice.id,
                    text: text.to_owned(),
                })
                .await
                .unwrap();
        }

        let texts: Vec<String> = store
            .list_comments(created.id)
            .await
            .unwrap()
            .into_iter()
            .map(|comment| comment.text)
            .collect();
        assert_eq!(texts, ["one", "two"]);
    }

    #[tokio::test]
    async fn references_are_checked() {
        let store = MemoryStore::default();
        let alice = author(&store, "alice").await;

        let missing_group = store
            .create_post(&NewPost {
                author: alice.id,
                content: PostContent {
                    text: "text".to_owned(),
                    group: Some(12_345.into()),
                    image: None,
                },
            })
            .await;
        assert!(matches!(
            missing_group,
            Err(DbError::MissingReference("group"))
        ));

        let missing_post = store
            .create_comment(&NewComment {
                post: 12_345.into(),
                author: alice.id,
                text: "text".to_owned(),
            })
            .await;
        assert!(matches!(missing_post, Err(DbError::MissingReference("post"))));
    }
}
