//! Validation of submitted forms.
//!
//! Each form deserializes leniently (missing fields default to empty) and
//! is turned into its validated counterpart by `validate`, which reports
//! every problem at once as [`FieldErrors`].

use crate::model::{
    Id,
    author::Username,
    group::{Group, GroupMarker},
};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which errors not tied to a single field are reported.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const INVALID_FILE_NAME: &str = "The submitted file name is not valid.";
pub const IMAGE_TOO_LARGE: &str = "The submitted image is too large.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only \
    letters, numbers, and @/./+/-/_ characters.";
pub const RESERVED_USERNAME: &str = "This username is reserved.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const PASSWORD_TOO_SHORT: &str =
    "This password is too short. It must contain at least 8 characters.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password.";

pub const PASSWORD_MIN_LEN: usize = 8;
pub const IMAGE_MAX_BYTES: usize = 5 * 1024 * 1024;
pub const IMAGE_NAME_MAX_LEN: usize = 100;

#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// `Ok(value)` if no error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    #[serde(skip_serializing)]
    pub image: Option<ImageUpload>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImageUpload {
    pub name: String,
    /// Base64 encoded file contents.
    pub content: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ImageKind {
    Gif,
    Png,
    Jpeg,
    Webp,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidImage {
    pub file_name: String,
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidPost {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ValidImage>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidComment {
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidCredentials {
    pub username: Username,
    pub password: String,
}

/// Blank input counts as missing; surrounding whitespace is not kept.
fn required_text(errors: &mut FieldErrors, field: &'static str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    }
    trimmed.to_owned()
}

impl ImageKind {
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n', ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

impl ImageUpload {
    pub fn validate(&self) -> Result<ValidImage, &'static str> {
        let name = self.name.trim();
        let plain_name = !name.is_empty()
            && name.len() <= IMAGE_NAME_MAX_LEN
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !plain_name {
            return Err(INVALID_FILE_NAME);
        }

        let bytes = BASE64_STANDARD
            .decode(self.content.trim())
            .map_err(|_| INVALID_IMAGE)?;
        if bytes.len() > IMAGE_MAX_BYTES {
            return Err(IMAGE_TOO_LARGE);
        }
        let kind = ImageKind::sniff(&bytes).ok_or(INVALID_IMAGE)?;

        Ok(ValidImage {
            file_name: name.to_owned(),
            kind,
            bytes,
        })
    }
}

impl PostForm {
    /// `groups` are the selectable groups; any other group id is rejected.
    pub fn validate(&self, groups: &[Group]) -> Result<ValidPost, FieldErrors> {
        let mut errors = FieldErrors::new();

        let text = required_text(&mut errors, "text", &self.text);

        if let Some(group) = self.group
            && !groups.iter().any(|choice| choice.id == group)
        {
            errors.add("group", INVALID_CHOICE);
        }

        let image = match self.image.as_ref().map(ImageUpload::validate).transpose() {
            Ok(image) => image,
            Err(message) => {
                errors.add("image", message);
                None
            }
        };

        errors.into_result(ValidPost {
            text,
            group: self.group,
            image,
        })
    }
}

impl CommentForm {
    pub fn validate(&self) -> Result<ValidComment, FieldErrors> {
        let mut errors = FieldErrors::new();
        let text = required_text(&mut errors, "text", &self.text);
        errors.into_result(ValidComment { text })
    }
}

impl CredentialsForm {
    /// Rules for creating an account.
    pub fn validate_signup(&self) -> Result<ValidCredentials, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = required_text(&mut errors, "username", &self.username);
        let username = if username.is_empty() {
            None
        } else {
            match Username::new(username) {
                Ok(username) if username.is_reserved() => {
                    errors.add("username", RESERVED_USERNAME);
                    None
                }
                Ok(username) => Some(username),
                Err(_) => {
                    errors.add("username", INVALID_USERNAME);
                    None
                }
            }
        };

        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        } else if self.password.chars().count() < PASSWORD_MIN_LEN {
            errors.add("password", PASSWORD_TOO_SHORT);
        }

        match username {
            Some(username) => errors.into_result(ValidCredentials {
                username,
                password: self.password.clone(),
            }),
            None => Err(errors),
        }
    }

    /// Rules for logging in. A username that could never exist is reported
    /// the same way as a wrong password.
    pub fn validate_login(&self) -> Result<ValidCredentials, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = required_text(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let username = Username::new(username)
            .map_err(|_| FieldErrors::single(NON_FIELD_ERRORS, INVALID_LOGIN))?;

        Ok(ValidCredentials {
            username,
            password: self.password.clone(),
        })
    }
}
