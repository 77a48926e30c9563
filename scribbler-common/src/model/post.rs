use crate::model::{
    Id,
    author::{Author, AuthorMarker},
    group::{Group, GroupMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    /// Path relative to the media root.
    pub image: Option<String>,
    pub author: Author,
    pub group: Option<Group>,
}

/// The editable part of a post. The author is fixed at creation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostContent {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct NewPost {
    pub author: Id<AuthorMarker>,
    pub content: PostContent,
}

impl Post {
    #[must_use]
    pub fn content(&self) -> PostContent {
        PostContent {
            text: self.text.clone(),
            group: self.group.as_ref().map(|group| group.id),
            image: self.image.clone(),
        }
    }
}
