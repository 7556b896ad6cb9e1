//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the user identity and
//! photo payloads. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::tag_set::DELETED_PHOTO;

// ============================================================================
// UserId
// ============================================================================

/// Identity of the signed-in user, as issued by the photo server
///
/// The id doubles as the prefix of every photo filename: the photo stored
/// in slot `i` is named `userId + i`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, rejecting empty or whitespace-only values
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidUserId(id));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidUserId(id));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the photo filename for a slot
    ///
    /// This is a plain concatenation, e.g. user `u1_` and slot `2`
    /// give `u1_2`.
    pub fn file_name_for(&self, slot: usize) -> String {
        format!("{}{}", self.0, slot)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

// ============================================================================
// PhotoPayload
// ============================================================================

/// Base64-encoded image as exchanged with the server and stored locally
///
/// The payload is opaque to the engine; producers are expected to encode
/// JPEG at quality 80 before wrapping it. Line breaks inside the base64
/// text are tolerated because some encoders wrap at 76 columns.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoPayload(String);

impl PhotoPayload {
    /// Wraps an already base64-encoded payload
    ///
    /// Rejects the empty string and the deletion sentinel, both of which
    /// carry special meaning in `update`.
    pub fn new(base64: impl Into<String>) -> Result<Self, DomainError> {
        let base64 = base64.into();
        if base64.is_empty() {
            return Err(DomainError::InvalidPhoto("empty payload".to_string()));
        }
        if base64 == DELETED_PHOTO {
            return Err(DomainError::InvalidPhoto(
                "payload equals the deletion sentinel".to_string(),
            ));
        }
        Ok(Self(base64))
    }

    /// Encodes raw image bytes as standard base64
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// Decodes the payload back into raw bytes
    pub fn decode(&self) -> Result<Vec<u8>, DomainError> {
        let compact: String = self.0.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| DomainError::InvalidPhoto(e.to_string()))
    }

    /// Returns the base64 text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the payload and returns the base64 text
    pub fn into_inner(self) -> String {
        self.0
    }
}

// Payloads are large; keep debug output readable.
impl fmt::Debug for PhotoPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PhotoPayload({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_valid() {
        let id = UserId::new("u1_").unwrap();
        assert_eq!(id.as_str(), "u1_");
        assert_eq!(id.to_string(), "u1_");
    }

    #[test]
    fn test_user_id_rejects_empty_and_whitespace() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new("a b").is_err());
    }

    #[test]
    fn test_file_name_is_concatenation() {
        let id = UserId::new("u1_").unwrap();
        assert_eq!(id.file_name_for(2), "u1_2");
        assert_eq!(id.file_name_for(10), "u1_10");
    }

    #[test]
    fn test_user_id_serde_roundtrip() {
        let id = UserId::new("42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"42\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let bad: Result<UserId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_photo_payload_rejects_sentinels() {
        assert!(PhotoPayload::new("").is_err());
        assert!(PhotoPayload::new("na").is_err());
        assert!(PhotoPayload::new("aGVsbG8=").is_ok());
    }

    #[test]
    fn test_photo_payload_decodes_wrapped_base64() {
        let payload = PhotoPayload::new("aGVs\nbG8=\n").unwrap();
        assert_eq!(payload.decode().unwrap(), b"hello");
    }

    #[test]
    fn test_photo_payload_from_bytes() {
        let payload = PhotoPayload::from_bytes(b"hello");
        assert_eq!(payload.as_str(), "aGVsbG8=");
    }

    #[test]
    fn test_photo_payload_debug_hides_content() {
        let payload = PhotoPayload::new("aGVsbG8=").unwrap();
        assert_eq!(format!("{:?}", payload), "PhotoPayload(8 bytes)");
    }
}
