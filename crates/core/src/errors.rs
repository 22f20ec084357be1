//! Error types for the OAuth2 basic core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Avatar(#[from] AvatarError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading, validation, and template formatting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// The provider is switched off in configuration.
    #[error("OAuth2 login is disabled (oauth2.enabled = false)")]
    Disabled,

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// User-info fetch errors
// ---------------------------------------------------------------------------

/// Errors from fetching the provider's user-info document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP-level transport error (network, TLS, timeout).
    #[error("user-info HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The provider returned a non-success status code.
    #[error("user-info request failed (HTTP {status}): {body}")]
    Status {
        status: u16,
        body: String,
    },
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Errors from decoding the user-info document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body was not valid JSON.
    #[error("malformed user-info JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Store / directory errors
// ---------------------------------------------------------------------------

/// Errors from the plugin store and user directory collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQLite backend failed.
    #[error("store database error: {0}")]
    Database(#[from] DatabaseError),

    /// A stored value could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A uniqueness rule was violated (e.g. duplicate username).
    #[error("{entity} already exists: {value}")]
    Conflict {
        entity: String,
        value: String,
    },

    /// The backend is not reachable or otherwise unusable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(DatabaseError::SqliteError(e))
    }
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Avatar errors
// ---------------------------------------------------------------------------

/// Errors from importing an avatar. The linker logs these and carries on.
#[derive(Debug, Error)]
pub enum AvatarError {
    /// HTTP transport error while downloading.
    #[error("avatar download failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The avatar host answered with a non-success status.
    #[error("avatar download failed (HTTP {status}) for {url}")]
    Status {
        status: u16,
        url: String,
    },

    /// The response had no content.
    #[error("avatar at {0} is empty")]
    Empty(String),

    /// Writing the image to disk failed.
    #[error("avatar I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Identity linking errors
// ---------------------------------------------------------------------------

/// Errors that stop an authentication from being linked.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A forced email domain needs a local part, and the provider username
    /// is missing or sanitizes to nothing.
    #[error("cannot build an email address for forced domain '{domain}': provider username {username:?} has no usable characters")]
    NoEmailLocalPart {
        domain: String,
        username: Option<String>,
    },
}
