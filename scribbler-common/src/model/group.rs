use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const SLUG_MAX_LEN: usize = 50;
pub const GROUP_TITLE_MAX_LEN: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GroupMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Group {
    pub id: Id<GroupMarker>,
    pub title: String,
    pub slug: Slug,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct NewGroup {
    pub title: String,
    pub slug: Slug,
    pub description: String,
}

/// URL-safe group key: 1 to [`SLUG_MAX_LEN`] ASCII letters, digits, `-` or `_`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The slug is invalid: {0}")]
pub struct InvalidSlugError(String);

impl Slug {
    pub fn new(slug: String) -> Result<Self, InvalidSlugError> {
        let valid = !slug.is_empty()
            && slug.len() <= SLUG_MAX_LEN
            && slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Slug(slug))
        } else {
            Err(InvalidSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Slug::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Slug"))
    }
}
