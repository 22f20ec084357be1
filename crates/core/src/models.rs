//! Domain model types shared by the extractor, linker, and host helpers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Local users
// ---------------------------------------------------------------------------

/// A local user account as seen through the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub created_at: String,
}

/// Fields needed to create a local user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Identity fields pulled out of the provider's user-info document.
///
/// A field is `Some` only when its configured path resolved to a non-blank
/// scalar.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedIdentity {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ExtractedIdentity {
    /// Store a value under one of the four property names. Unknown names
    /// are ignored.
    pub fn set(&mut self, prop: &str, value: String) {
        match prop {
            "user_id" => self.user_id = Some(value),
            "username" => self.username = Some(value),
            "name" => self.name = Some(value),
            "email" => self.email = Some(value),
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.username.is_none()
            && self.name.is_none()
            && self.email.is_none()
    }
}

// ---------------------------------------------------------------------------
// Authentication result
// ---------------------------------------------------------------------------

/// Data the host keeps with a pending signup and hands back to
/// `after_create_account`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtraData {
    pub oauth2_basic_user_id: Option<String>,
    pub oauth2_basic_username: Option<String>,
}

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResult {
    /// The matched local account; `None` means the host should offer
    /// account creation.
    pub user: Option<User>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Whether the email may be treated as already verified.
    pub email_valid: bool,
    pub extra_data: ExtraData,
}

impl AuthResult {
    /// True when no local account matched.
    pub fn needs_account(&self) -> bool {
        self.user.is_none()
    }
}
