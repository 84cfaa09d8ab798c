//! A validated display name shared by users and organizations.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::Error;

/// The max number of graphemes allowed in a name.
pub const MAX_NAME_LENGTH: usize = 64;

/// A trimmed, non-empty name of at most [MAX_NAME_LENGTH] graphemes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Name(String);

impl Name {
    /// Create a name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidName] if `name` is empty
    /// after trimming or longer than [MAX_NAME_LENGTH] graphemes.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            return Err(Error::InvalidName("name cannot be empty".to_owned()));
        }

        let length = name.graphemes(true).count();
        if length > MAX_NAME_LENGTH {
            return Err(Error::InvalidName(format!(
                "name must be at most {MAX_NAME_LENGTH} characters, got {length}"
            )));
        }

        Ok(Self(name.to_owned()))
    }

    /// Create a name without validation.
    ///
    /// The caller should ensure that the string came from a trusted source such as the database.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
