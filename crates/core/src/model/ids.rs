use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity that learning progress is tracked against.
///
/// The general domain keys progress by an opaque session token, the finance
/// domain by a numeric user id. Both are stored in their textual form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a `SubjectId` from a session token.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the token is empty after trimming.
    pub fn session(token: impl AsRef<str>) -> Result<Self, ParseIdError> {
        token.as_ref().parse()
    }

    /// Creates a `SubjectId` from a numeric user id.
    #[must_use]
    pub fn user(id: u64) -> Self {
        Self(id.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({})", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type for parsing an identifier from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for SubjectId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "SubjectId",
                raw: s.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl TryFrom<String> for SubjectId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}
