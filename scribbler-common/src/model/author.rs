use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 150;

/// Usernames that would be shadowed by fixed routes such as `/new/` or `/follow/`.
pub const RESERVED_USERNAMES: [&str; 5] = ["about", "auth", "follow", "group", "new"];

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthorMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Author {
    pub id: Id<AuthorMarker>,
    pub username: Username,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewAuthor {
    pub username: Username,
    /// PHC string, see [`crate::model::auth::hash_password`].
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub author: Author,
    pub password_hash: String,
}

/// 1 to [`USERNAME_MAX_LEN`] ASCII letters, digits or `@.+-_`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0}")]
pub struct InvalidUsernameError(String);

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        let valid = !username.is_empty()
            && username.len() <= USERNAME_MAX_LEN
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c));

        if valid {
            Ok(Username(username))
        } else {
            Err(InvalidUsernameError(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_reserved(&self) -> bool {
        RESERVED_USERNAMES.contains(&self.0.as_str())
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::author::{USERNAME_MAX_LEN, Username};

    #[test]
    fn username_validation() {
        for legal in ["alice", "bob_42", "a.b+c-d@e", "X"] {
            assert!(Username::new(legal.to_owned()).is_ok(), "{legal}");
        }

        let too_long = "a".repeat(USERNAME_MAX_LEN + 1);
        for illegal in ["", "with space", "slash/", "ünïcode", too_long.as_str()] {
            assert!(Username::new(illegal.to_owned()).is_err(), "{illegal}");
        }
    }

    #[test]
    fn reserved_usernames() {
        assert!(Username::new("follow".to_owned()).unwrap().is_reserved());
        assert!(!Username::new("follower".to_owned()).unwrap().is_reserved());
    }

    #[test]
    fn username_deserialization_validates() {
        assert!(serde_json::from_str::<Username>("\"alice\"").is_ok());
        assert!(serde_json::from_str::<Username>("\"not valid\"").is_err());
    }
}
