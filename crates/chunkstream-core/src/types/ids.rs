//! Stream identifiers.
//!
//! A stream identifier is supplied by the client and is also used to derive
//! the name of the stream's output file, so the accepted alphabet is kept to
//! characters that are safe in a single path component.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::constants::MAX_STREAM_ID_LENGTH;

/// Identifier of one recording session.
///
/// Deserialization runs the same validation as [`StreamId::new`], so ids read
/// back from a snapshot obey the same rules as ids taken from requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct StreamId(String);

/// Reasons a stream identifier is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidStreamId {
    /// Identifier is the empty string
    #[error("stream id must not be empty")]
    Empty,
    /// Identifier exceeds the maximum length
    #[error("stream id is {0} characters long (maximum {MAX_STREAM_ID_LENGTH})")]
    TooLong(usize),
    /// Identifier starts with a dot
    #[error("stream id must not start with '.'")]
    LeadingDot,
    /// Identifier contains a character outside [A-Za-z0-9._-]
    #[error("stream id contains invalid character {0:?}")]
    InvalidChar(char),
}

impl StreamId {
    /// Validate and wrap an identifier
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidStreamId> {
        let id = id.into();
        validate(&id)?;
        Ok(StreamId(id))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(id: &str) -> Result<(), InvalidStreamId> {
    if id.is_empty() {
        return Err(InvalidStreamId::Empty);
    }
    let len = id.chars().count();
    if len > MAX_STREAM_ID_LENGTH {
        return Err(InvalidStreamId::TooLong(len));
    }
    if id.starts_with('.') {
        return Err(InvalidStreamId::LeadingDot);
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(InvalidStreamId::InvalidChar(c));
    }
    Ok(())
}

impl FromStr for StreamId {
    type Err = InvalidStreamId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamId::new(s)
    }
}

impl TryFrom<String> for StreamId {
    type Error = InvalidStreamId;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        StreamId::new(id)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid_style_ids() {
        let id: StreamId = "3f2b8c1e-9a4d-4e57-b1c2-0d9e8f7a6b5c".parse().unwrap();
        assert_eq!(id.as_str(), "3f2b8c1e-9a4d-4e57-b1c2-0d9e8f7a6b5c");
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn rejects_path_like_ids() {
        assert_eq!(StreamId::new("../etc"), Err(InvalidStreamId::LeadingDot));
        assert_eq!(StreamId::new("a/b"), Err(InvalidStreamId::InvalidChar('/')));
        assert_eq!(StreamId::new("a\\b"), Err(InvalidStreamId::InvalidChar('\\')));
        assert_eq!(StreamId::new(""), Err(InvalidStreamId::Empty));
    }

    #[test]
    fn rejects_overlong_ids() {
        let long = "a".repeat(MAX_STREAM_ID_LENGTH + 1);
        assert_eq!(StreamId::new(long), Err(InvalidStreamId::TooLong(MAX_STREAM_ID_LENGTH + 1)));
        assert!(StreamId::new("a".repeat(MAX_STREAM_ID_LENGTH)).is_ok());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = StreamId::new("s1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"s1\"");
        assert_eq!(serde_json::from_str::<StreamId>("\"s1\"").unwrap(), id);
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<StreamId>("\"../etc\"").is_err());
        assert!(serde_json::from_str::<StreamId>("\"\"").is_err());
    }
}
