//! The host-facing authenticator.
//!
//! [`OAuth2BasicAuthenticator`] is what the host calls from its lifecycle
//! hooks: `after_authenticate` once the OAuth2 middleware has an access
//! token, and `after_create_account` once a new local account exists.

use tracing::{debug, info, instrument};

use crate::avatar::AvatarImporter;
use crate::config::PluginConfig;
use crate::errors::{ConfigError, CoreError};
use crate::extract::{self, extract_identity};
use crate::fetch::{self, UserInfoFetcher};
use crate::identity::{sanitize_username, IdentityLinker, PluginStore, UserDirectory};
use crate::models::{AuthResult, ExtraData, ExtractedIdentity, NewUser, User};

/// Username used when neither the provider username nor the email local
/// part sanitize to anything.
const FALLBACK_USERNAME: &str = "user";

/// Ties configuration, the user-info fetcher, and the linker together.
pub struct OAuth2BasicAuthenticator<F> {
    config: PluginConfig,
    fetcher: F,
    linker: IdentityLinker,
}

impl<F: UserInfoFetcher> OAuth2BasicAuthenticator<F> {
    pub fn new(config: PluginConfig, fetcher: F) -> Self {
        let linker = IdentityLinker::from_config(&config);
        Self {
            config,
            fetcher,
            linker,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn linker(&self) -> &IdentityLinker {
        &self.linker
    }

    /// The user-info URL for an access token.
    pub fn user_json_url(&self, token: &str) -> String {
        fetch::user_json_url(&self.config.oauth2.user_json_url, token)
    }

    /// Fetch and decode the user-info document, then extract identity
    /// fields from it.
    #[instrument(skip_all)]
    pub async fn fetch_user_details(&self, token: &str) -> Result<ExtractedIdentity, CoreError> {
        let url = self.user_json_url(token);
        let body = self.fetcher.fetch(&url, token).await?;
        let document = extract::decode(&body)?;
        let identity = extract_identity(&document, &self.config.json_paths);
        debug!(
            user_id = ?identity.user_id,
            username = ?identity.username,
            has_email = identity.email.is_some(),
            "extracted user details"
        );
        Ok(identity)
    }

    /// Host hook: resolve an access token to an [`AuthResult`].
    ///
    /// Fetch and decode failures abort the attempt before any lookup.
    pub async fn after_authenticate(
        &self,
        token: &str,
        store: &dyn PluginStore,
        users: &dyn UserDirectory,
    ) -> Result<AuthResult, CoreError> {
        self.ensure_enabled()?;
        let identity = self.fetch_user_details(token).await?;
        self.linker.link(&identity, store, users)
    }

    /// Host hook: a new account was created for a pending signup.
    pub async fn after_create_account<A: AvatarImporter>(
        &self,
        user: &mut User,
        extra_data: &ExtraData,
        store: &dyn PluginStore,
        users: &dyn UserDirectory,
        avatars: &A,
    ) -> Result<(), CoreError> {
        self.linker
            .on_account_created(user, extra_data, store, users, avatars)
            .await
    }

    /// Host-side completion of a login: return the matched account, or
    /// create one from the result. The flag is true when an account was
    /// created, in which case the caller must run
    /// [`after_create_account`](Self::after_create_account).
    pub fn complete_login(
        &self,
        result: &AuthResult,
        users: &dyn UserDirectory,
    ) -> Result<(User, bool), CoreError> {
        if let Some(user) = &result.user {
            info!(user_id = user.id, "logged in existing account");
            return Ok((user.clone(), false));
        }

        let username = suggest_username(result);
        let user = users.create_user(&NewUser {
            username,
            name: result.name.clone(),
            email: result.email.clone(),
        })?;
        info!(user_id = user.id, username = %user.username, "created account");
        Ok((user, true))
    }

    fn ensure_enabled(&self) -> Result<(), ConfigError> {
        if self.config.oauth2.enabled {
            Ok(())
        } else {
            Err(ConfigError::Disabled)
        }
    }
}

/// Pick a local username for a new account: the sanitized provider
/// username, else the sanitized email local part, else a fixed fallback.
pub fn suggest_username(result: &AuthResult) -> String {
    let from_username = result.username.as_deref().map(sanitize_username);
    let from_email = result
        .email
        .as_deref()
        .and_then(|e| e.split('@').next())
        .map(sanitize_username);

    from_username
        .into_iter()
        .chain(from_email)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_USERNAME.to_string())
}
