use crate::model::{Id, author::AuthorMarker};
use argon2::{
    Argon2, Params,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
    sync::LazyLock,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 18;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid author id: {0}")]
    InvalidAuthorId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// A bearer token as handed to clients: `<author id>:<base64 core>:<base64 salt>`.
///
/// Only the argon2 hash of the core is ever stored, so a leaked table of
/// [`Authentication`]s cannot be replayed.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub author_id: Id<AuthorMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(pub Box<[u8; AUTH_TOKEN_HASH_LEN]>);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct TokenLifetime(Duration);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The token lifetime is not positive: {0}")]
pub struct NonPositiveLifetimeError(Duration);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("A token lifetime of {0} hours is not positive or too long")]
pub struct InvalidLifetimeHoursError(i64);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub author: Id<AuthorMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: OffsetDateTime,
    /// `None` means the token never expires.
    pub expires_after: Option<TokenLifetime>,
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(author_id: Id<AuthorMarker>) -> Self {
        let core = rand::random();
        let salt = rand::random();

        Self {
            author_id,
            core,
            salt,
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let author_id = self.author_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{author_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        argon2
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let author_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let author_id = u64::from_str(author_id_part)
            .map_err(Self::Err::InvalidAuthorId)?
            .into();
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            author_id,
            core,
            salt,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("author_id", &self.author_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Vec<u8>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let hash: Box<[u8]> = value.into_boxed_slice();
        Ok(Self(hash.try_into().map_err(|_| InvalidAuthTokenHashError)?))
    }
}

impl TokenLifetime {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    pub fn from_hours(hours: i64) -> Result<Self, InvalidLifetimeHoursError> {
        hours
            .checked_mul(Duration::HOUR.whole_seconds())
            .map(Duration::seconds)
            .and_then(Self::new)
            .ok_or(InvalidLifetimeHoursError(hours))
    }

    #[must_use]
    pub fn get(self) -> Duration {
        self.0
    }
}

impl TryFrom<Duration> for TokenLifetime {
    type Error = NonPositiveLifetimeError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveLifetimeError(value))
    }
}

impl Authentication {
    #[must_use]
    pub fn issue(
        author: Id<AuthorMarker>,
        token_hash: AuthTokenHash,
        expires_after: Option<TokenLifetime>,
    ) -> Self {
        Self {
            author,
            token_hash,
            created_at: OffsetDateTime::now_utc(),
            expires_after,
        }
    }

    /// A lifetime reaching past the representable end of time never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_after.is_some_and(|lifetime| {
            self.created_at
                .checked_add(lifetime.get())
                .is_some_and(|expires_at| expires_at < now)
        })
    }
}

/// Hashes a password into a PHC string suitable for [`verify_password`].
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordHashError)?;

    Ok(hash.to_string())
}

/// Malformed stored hashes never verify.
#[must_use]
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Verified against when a login names no known author, so unknown names
/// take as long to reject as wrong passwords.
static UNKNOWN_AUTHOR_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no author has this password").ok());

/// Checks a login attempt. `password_hash` is `None` when the username is
/// unknown; such attempts always fail, after the same amount of hashing.
#[must_use]
pub fn verify_login(password: &str, password_hash: Option<&str>) -> bool {
    match password_hash {
        Some(password_hash) => verify_password(password, password_hash),
        None => {
            if let Some(decoy) = UNKNOWN_AUTHOR_HASH.as_deref() {
                let _ = verify_password(password, decoy);
            }
            false
        }
    }
}
