pub mod auth;
pub mod author;
pub mod comment;
pub mod group;
pub mod post;

use crate::{
    model::{
        auth::{InvalidAuthTokenHashError, NonPositiveLifetimeError},
        author::InvalidUsernameError,
        group::InvalidSlugError,
    },
    snowflake::Snowflake,
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    Slug(#[from] InvalidSlugError),
    #[error(transparent)]
    NonPositiveLifetime(#[from] NonPositiveLifetimeError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

/// A snowflake tagged with the kind of entity it identifies.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Id<Marker>(Snowflake, #[serde(skip)] PhantomData<fn() -> Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: Snowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> Snowflake {
        self.0
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<Snowflake> for Id<Marker> {
    fn from(value: Snowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(Snowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}
