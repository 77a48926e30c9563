use scribbler_common::model::{
    Id, ModelValidationError,
    auth::Authentication,
    author::{Author, Credentials, Username},
    comment::Comment,
    group::{Group, Slug},
    post::Post,
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

pub(crate) fn to_db_id<Marker>(id: Id<Marker>) -> i64 {
    id.get().cast_signed()
}

fn from_db_id<Marker>(snowflake: i64) -> Id<Marker> {
    snowflake.cast_unsigned().into()
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct AuthorRecord {
    pub author_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub author_snowflake: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub author_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_snowflake: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and, if any, its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub image: Option<String>,
    pub author_snowflake: i64,
    pub username: String,
    pub group_snowflake: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub group_description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub text: String,
    pub created: OffsetDateTime,
    pub author_snowflake: i64,
    pub username: String,
}

impl TryFrom<AuthorRecord> for Author {
    type Error = ModelValidationError;

    fn try_from(value: AuthorRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_db_id(value.author_snowflake),
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            author: Author {
                id: from_db_id(value.author_snowflake),
                username: Username::new(value.username)?,
            },
            password_hash: value.password_hash,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            author: from_db_id(value.author_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_db_id(value.group_snowflake),
            title: value.title,
            slug: Slug::new(value.slug)?,
            description: value.description,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        let group = match (
            value.group_snowflake,
            value.group_title,
            value.group_slug,
            value.group_description,
        ) {
            (Some(group_snowflake), Some(title), Some(slug), Some(description)) => {
                Some(Group::try_from(GroupRecord {
                    group_snowflake,
                    title,
                    slug,
                    description,
                })?)
            }
            _ => None,
        };

        Ok(Self {
            id: from_db_id(value.post_snowflake),
            text: value.text,
            pub_date: value.pub_date,
            image: value.image,
            author: Author {
                id: from_db_id(value.author_snowflake),
                username: Username::new(value.username)?,
            },
            group,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_db_id(value.comment_snowflake),
            post: from_db_id(value.post_snowflake),
            author: Author {
                id: from_db_id(value.author_snowflake),
                username: Username::new(value.username)?,
            },
            text: value.text,
            created: value.created,
        })
    }
}
