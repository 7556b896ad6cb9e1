//! Account types used when signing in
//!
//! The photo server authenticates with an email address and the MD5 hex
//! digest of the password, and answers with the user's record. Only the
//! digest ever leaves [`Credentials`]; the clear password is dropped on
//! construction.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::UserId;

// ============================================================================
// Credentials
// ============================================================================

/// Email and hashed password for a login request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password_hash: String,
}

impl Credentials {
    /// Builds credentials, hashing `password`
    pub fn new(email: impl Into<String>, password: &str) -> Result<Self, DomainError> {
        let email = email.into();
        if email.trim().is_empty() {
            return Err(DomainError::InvalidCredentials("email is empty".into()));
        }
        if password.is_empty() {
            return Err(DomainError::InvalidCredentials("password is empty".into()));
        }
        Ok(Self {
            email: email.trim().to_string(),
            password_hash: format!("{:x}", md5::compute(password.as_bytes())),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Lower-case MD5 hex digest of the password, 32 characters
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// UserProfile
// ============================================================================

/// User record returned by a successful login
///
/// Password fields the server echoes back are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub living_city: String,
    #[serde(default)]
    pub year_of_birth: String,
}

impl UserProfile {
    /// Parses the login response body
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Returns the identity this profile belongs to
    pub fn user_id(&self) -> Result<UserId, DomainError> {
        UserId::new(self.id.clone())
    }

    /// "First Last", or the email when no name is known
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}
