//! Identity linking between OAuth2 provider accounts and local users.
//!
//! The resolution hierarchy is:
//! 1. Stored identity link for the provider's user id (highest priority)
//! 2. Verified email match (if the policy allows it)
//! 3. Nothing: the host creates a new account and calls back into
//!    [`IdentityLinker::on_account_created`]

pub mod directory;
pub mod linker;
pub mod store;
pub mod username;

pub use directory::{email_key, MemoryUserDirectory, UserDirectory};
pub use linker::IdentityLinker;
pub use store::{IdentityLinks, MemoryPluginStore, PluginStore, PLUGIN_NAMESPACE};
pub use username::sanitize_username;
