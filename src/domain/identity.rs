//! Authenticated identity: subject id plus bearer credential.
//!
//! [`SubjectId`] is an opaque newtype so subject identifiers cannot be
//! confused with credentials or other strings. The backend issues numeric
//! user ids, so deserialization accepts either a JSON string or number.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identifier of an authenticated subject (a dashboard user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a `SubjectId` from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for SubjectId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for SubjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::from(n),
            Raw::Text(s) => Self(s),
        })
    }
}

/// The currently authenticated identity as supplied by the identity
/// provider. The realtime core only reads it.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject the connection is scoped to.
    pub subject: SubjectId,
    /// Bearer credential presented to the push endpoint.
    pub credential: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(subject: impl Into<SubjectId>, credential: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            credential: credential.into(),
        }
    }

    /// Returns `true` if `other` refers to the same subject, regardless of
    /// credential.
    #[must_use]
    pub fn same_subject(&self, other: &Self) -> bool {
        self.subject == other.subject
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.subject)
            .field("credential", &"<redacted>")
            .finish()
    }
}
