//! Identity reconciliation between provider identities and local accounts.
//!
//! [`IdentityLinker`] turns an [`ExtractedIdentity`] into an [`AuthResult`]
//! and, once the host has created an account, writes the identity links and
//! applies the profile overrides.
//!
//! Local-user resolution order:
//! 1. Stored identity link for the external user id
//! 2. Case-insensitive email match (only with the verified-email policy)
//! 3. No user: the host creates a new account
//!
//! Two first-time logins for the same external identity can race; both may
//! create an account and the last link written wins.

use std::collections::HashMap;
use std::fmt::Display;

use tracing::{debug, info, warn};

use super::directory::UserDirectory;
use super::store::{IdentityLinks, PluginStore};
use super::username::sanitize_username;
use crate::avatar::AvatarImporter;
use crate::config::{AccountConfig, PluginConfig};
use crate::errors::{CoreError, LinkError};
use crate::models::{AuthResult, ExtraData, ExtractedIdentity, User};
use crate::template;

/// Stateless linker holding the account policy it applies.
#[derive(Debug, Clone)]
pub struct IdentityLinker {
    accounts: AccountConfig,
    debug_auth: bool,
}

impl IdentityLinker {
    pub fn new(accounts: AccountConfig, debug_auth: bool) -> Self {
        Self {
            accounts,
            debug_auth,
        }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(config.accounts.clone(), config.debug.debug_auth)
    }

    pub fn accounts(&self) -> &AccountConfig {
        &self.accounts
    }

    /// Decide which local account, if any, this authentication belongs to.
    ///
    /// Nothing is written. A link that points at a deleted user yields no
    /// user rather than falling through to the email match. With a forced
    /// email domain, a username that sanitizes to nothing is an error: an
    /// address like `@example.org` would be shared by every such identity.
    pub fn link(
        &self,
        extracted: &ExtractedIdentity,
        store: &dyn PluginStore,
        users: &dyn UserDirectory,
    ) -> Result<AuthResult, CoreError> {
        let mut result = AuthResult {
            name: extracted.name.clone(),
            username: extracted.username.clone(),
            ..Default::default()
        };

        // Email.
        if let Some(domain) = self.accounts.forced_email_domain() {
            let local = extracted
                .username
                .as_deref()
                .map(sanitize_username)
                .unwrap_or_default();
            if local.is_empty() {
                warn!(
                    external_id = ?extracted.user_id,
                    "no usable username for forced email domain, refusing to link"
                );
                return Err(LinkError::NoEmailLocalPart {
                    domain: domain.to_string(),
                    username: extracted.username.clone(),
                }
                .into());
            }
            result.email = Some(format!("{local}@{domain}"));
            result.email_valid = true;
        } else {
            result.email = extracted.email.clone();
            result.email_valid = result.email.is_some() && self.accounts.email_verified;
        }

        // Local user.
        let stored = match extracted.user_id.as_deref() {
            Some(external_id) => IdentityLinks::new(store).find(external_id)?,
            None => {
                debug!("provider returned no user id, skipping link lookup");
                None
            }
        };

        result.user = match stored {
            Some(link) => {
                debug!(user_id = ?link.user_id, "identity link found");
                match link.user_id {
                    Some(id) => {
                        let user = users.find_by_id(id)?;
                        if user.is_none() {
                            warn!(user_id = id, "linked user no longer exists");
                        }
                        user
                    }
                    None => None,
                }
            }
            None if self.accounts.email_verified => match result.email.as_deref() {
                Some(email) => {
                    let user = users.find_by_email(email)?;
                    debug!(matched = user.is_some(), "looked up user by verified email");
                    user
                }
                None => None,
            },
            None => None,
        };

        result.extra_data = ExtraData {
            oauth2_basic_user_id: extracted.user_id.clone(),
            oauth2_basic_username: extracted.username.clone(),
        };

        info!(
            external_id = ?extracted.user_id,
            user_id = ?result.user.as_ref().map(|u| u.id),
            email_valid = result.email_valid,
            "authentication linked"
        );
        Ok(result)
    }

    /// Post-creation hook for a brand new local account.
    ///
    /// Applies the username override, imports the avatar, then writes both
    /// identity-link rows. The links are written whatever the policy flags
    /// say. A bad avatar template is fatal; a failed avatar download is not.
    pub async fn on_account_created<A: AvatarImporter>(
        &self,
        user: &mut User,
        extra_data: &ExtraData,
        store: &dyn PluginStore,
        users: &dyn UserDirectory,
        avatars: &A,
    ) -> Result<(), CoreError> {
        self.debug_log(format_args!(
            "After create account for {}",
            user.name.as_deref().unwrap_or(&user.username)
        ));
        let oauth_id = extra_data.oauth2_basic_user_id.as_deref();

        if self.accounts.override_username {
            self.override_username(user, extra_data, users)?;
        }

        if let Some(tpl) = self.accounts.avatar_template() {
            self.debug_log(format_args!("Importing avatar for user {}", user.username));
            let values = HashMap::from([
                ("username", user.username.clone()),
                ("name", user.name.clone().unwrap_or_default()),
                ("oauth_id", oauth_id.unwrap_or_default().to_string()),
                ("user_id", user.id.to_string()),
            ]);
            self.debug_log(format_args!("Info: {values:?}"));

            let url = template::format(tpl, &values, "accounts.avatar_url_template")?;
            if let Err(e) = avatars.import_from_url(&url, user).await {
                warn!(user_id = user.id, url = %url, error = %e, "avatar import failed");
            }
        }

        self.debug_log(format_args!("Setting plugin rows for user {}", user.username));
        IdentityLinks::new(store).write(oauth_id, user.id)?;
        info!(user_id = user.id, external_id = ?oauth_id, "identity linked to new account");
        Ok(())
    }

    fn override_username(
        &self,
        user: &mut User,
        extra_data: &ExtraData,
        users: &dyn UserDirectory,
    ) -> Result<(), CoreError> {
        let Some(username) = extra_data.oauth2_basic_username.as_deref() else {
            warn!(user_id = user.id, "no provider username to override with");
            return Ok(());
        };

        user.name = Some(username.to_string());
        if self.accounts.store_username_in_title {
            user.title = Some(username.to_string());
        }
        let sanitized = sanitize_username(username);
        if sanitized.is_empty() {
            warn!(
                user_id = user.id,
                username,
                "provider username sanitizes to nothing, keeping local username"
            );
        } else {
            user.username = sanitized;
        }
        users.save_user(user)?;
        debug!(user_id = user.id, username = %user.username, "username overridden");
        Ok(())
    }

    fn debug_log(&self, info: impl Display) {
        if self.debug_auth {
            warn!("OAuth2 Debugging: {info}");
        }
    }
}
