//! OAuth2 basic core library.
//!
//! Delegates login to an external OAuth2 identity provider and links the
//! provider's identity to a local account: configuration, user-info
//! fetching, dotted-path field extraction, identity linking, and SQLite
//! persistence for the plugin store and user directory.

pub mod authenticator;
pub mod avatar;
pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod identity;
pub mod models;
pub mod strategy;
pub mod template;

// Re-exports for convenience.
pub use authenticator::OAuth2BasicAuthenticator;
pub use config::PluginConfig;
pub use db::Database;
pub use identity::IdentityLinker;
pub use models::{AuthResult, ExtractedIdentity, User};
