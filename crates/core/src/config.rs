//! TOML-based configuration for the OAuth2 basic bridge.
//!
//! The client secret is stored as an `_env` field that references an
//! environment variable name. The actual secret is resolved at runtime via
//! [`PluginConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::extract::FieldPath;
use crate::template::{self, AVATAR_TEMPLATE_KEYS};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level plugin configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Host-side settings (data directory, log level).
    #[serde(default)]
    pub host: HostConfig,

    /// Provider endpoints and client credentials.
    pub oauth2: OAuth2Config,

    /// Where each identity field lives in the user-info document.
    #[serde(default)]
    pub json_paths: JsonPathConfig,

    /// Account provisioning policy.
    #[serde(default)]
    pub accounts: AccountConfig,

    /// Diagnostics.
    #[serde(default)]
    pub debug: DebugConfig,
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Settings owned by the embedding host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Directory for persistent data (database, imported avatars).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/oauth2-basic")
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// OAuth2 provider
// ---------------------------------------------------------------------------

/// OAuth2 provider endpoints and client credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Config {
    /// Whether the login button is offered at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// OAuth2 client ID.
    pub client_id: String,

    /// Environment variable holding the OAuth2 client secret.
    pub client_secret_env: String,

    /// Authorization endpoint.
    pub authorize_url: String,

    /// Token endpoint.
    pub token_url: String,

    /// User-info endpoint. A literal `:token` is replaced with the access
    /// token; the token is also always sent as a bearer header.
    pub user_json_url: String,

    /// Send `Authorization: Basic ...` with the token request.
    #[serde(default = "default_true")]
    pub send_auth_header: bool,

    /// Text on the login button.
    #[serde(default = "default_button_title")]
    pub button_title: String,

    /// Timeout for user-info and avatar requests.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Resolved client secret (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub client_secret: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_button_title() -> String {
    "with OAuth2".into()
}
fn default_http_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// JSON paths
// ---------------------------------------------------------------------------

/// Dot-separated path expressions into the user-info document. A blank
/// expression means the field is never extracted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JsonPathConfig {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl JsonPathConfig {
    /// `(property, expression)` pairs in extraction order.
    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("user_id", self.user_id.as_str()),
            ("username", self.username.as_str()),
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Account provisioning policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountConfig {
    /// Trust provider emails as verified and match existing accounts by
    /// email.
    #[serde(default)]
    pub email_verified: bool,

    /// When set, ignore provider emails and use `<username>@<domain>`.
    #[serde(default)]
    pub force_email_domain: String,

    /// Overwrite a new account's username and name from the provider.
    #[serde(default)]
    pub override_username: bool,

    /// With `override_username`, also copy the provider username into the
    /// account title.
    #[serde(default)]
    pub store_username_in_title: bool,

    /// Avatar URL with `%{username}`, `%{name}`, `%{oauth_id}` and
    /// `%{user_id}` placeholders. Blank disables avatar import.
    #[serde(default)]
    pub avatar_url_template: String,
}

impl AccountConfig {
    /// The forced email domain, if one is configured.
    pub fn forced_email_domain(&self) -> Option<&str> {
        let domain = self.force_email_domain.trim();
        (!domain.is_empty()).then_some(domain)
    }

    /// The avatar template, if one is configured.
    pub fn avatar_template(&self) -> Option<&str> {
        let template = self.avatar_url_template.trim();
        (!template.is_empty()).then_some(template)
    }
}

// ---------------------------------------------------------------------------
// Debug
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    /// Emit `OAuth2 Debugging:` lines during account creation.
    #[serde(default)]
    pub debug_auth: bool,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl PluginConfig {
    /// Load a [`PluginConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: PluginConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the client secret from its environment variable.
    ///
    /// A missing variable logs a warning but does not fail; use
    /// [`require_client_secret`](Self::require_client_secret) where the
    /// secret is mandatory.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        self.oauth2.client_secret =
            resolve_optional_env(&self.oauth2.client_secret_env, "oauth2.client_secret_env");
        debug!("environment variable resolution complete");
        Ok(())
    }

    /// The resolved client secret, or an error naming the variable.
    pub fn require_client_secret(&self) -> Result<&str, ConfigError> {
        self.oauth2
            .client_secret
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.oauth2.client_secret_env.clone(),
                field: "oauth2.client_secret_env".into(),
            })
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth2.client_id.trim().is_empty() {
            return Err(invalid("oauth2.client_id", "client ID must not be empty"));
        }
        if self.oauth2.client_secret_env.trim().is_empty() {
            return Err(invalid(
                "oauth2.client_secret_env",
                "client secret variable name must not be empty",
            ));
        }
        check_http_url("oauth2.authorize_url", &self.oauth2.authorize_url)?;
        check_http_url("oauth2.token_url", &self.oauth2.token_url)?;
        check_http_url("oauth2.user_json_url", &self.oauth2.user_json_url)?;
        if self.oauth2.http_timeout_secs == 0 {
            return Err(invalid("oauth2.http_timeout_secs", "timeout must be > 0"));
        }

        if FieldPath::parse(&self.json_paths.user_id).is_empty() {
            return Err(invalid(
                "json_paths.user_id",
                "a user ID path is required to link accounts",
            ));
        }
        for (prop, expr) in self.json_paths.entries() {
            let path = FieldPath::parse(expr);
            if path.has_empty_segment() {
                return Err(invalid(
                    &format!("json_paths.{prop}"),
                    &format!("path '{expr}' contains an empty segment"),
                ));
            }
        }

        if let Some(domain) = self.accounts.forced_email_domain() {
            if domain.contains('@') || domain.contains(char::is_whitespace) {
                return Err(invalid(
                    "accounts.force_email_domain",
                    "must be a bare domain such as example.org",
                ));
            }
        }

        if let Some(tpl) = self.accounts.avatar_template() {
            template::check(tpl, AVATAR_TEMPLATE_KEYS, "accounts.avatar_url_template")?;
        }

        if self.accounts.store_username_in_title && !self.accounts.override_username {
            warn!("accounts.store_username_in_title has no effect without override_username");
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the SQLite host database.
    pub fn database_path(&self) -> PathBuf {
        self.host.data_dir.join("oauth2-basic.db")
    }

    /// Directory imported avatars are written to.
    pub fn avatar_dir(&self) -> PathBuf {
        self.host.data_dir.join("avatars")
    }
}

fn invalid(field: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        detail: detail.to_string(),
    }
}

fn check_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(invalid(field, "URL must not be empty"));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(invalid(field, "URL must start with http:// or https://"));
    }
    Ok(())
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[host]
data_dir = "/tmp/oauth2-basic"
log_level = "debug"

[oauth2]
enabled = true
client_id = "forum"
client_secret_env = "OAUTH2_CLIENT_SECRET"
authorize_url = "https://id.example.com/oauth/authorize"
token_url = "https://id.example.com/oauth/token"
user_json_url = "https://id.example.com/api/me?access_token=:token"
send_auth_header = false
button_title = "with Example ID"

[json_paths]
user_id = "id"
username = "login"
name = "profile.name"
email = "profile.email"

[accounts]
email_verified = true
force_email_domain = ""
override_username = true
store_username_in_title = true
avatar_url_template = "https://id.example.com/avatars/%{oauth_id}.png"

[debug]
debug_auth = true
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = PluginConfig::from_toml_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.oauth2.client_id, "forum");
        assert!(!config.oauth2.send_auth_header);
        assert_eq!(config.json_paths.name, "profile.name");
        assert!(config.accounts.email_verified);
        assert!(config.debug.debug_auth);
        assert_eq!(
            config.accounts.avatar_template(),
            Some("https://id.example.com/avatars/%{oauth_id}.png")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = PluginConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.host.log_level, "debug");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/oauth2-basic/oauth2-basic.db")
        );
    }

    #[test]
    fn test_file_not_found() {
        let result = PluginConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[oauth2]
client_id = "c"
client_secret_env = "S"
authorize_url = "https://a.example.com/authorize"
token_url = "https://a.example.com/token"
user_json_url = "https://a.example.com/me"
"#;
        let config = PluginConfig::from_toml_str(minimal).unwrap();
        assert!(config.oauth2.enabled);
        assert!(config.oauth2.send_auth_header);
        assert_eq!(config.oauth2.button_title, "with OAuth2");
        assert_eq!(config.oauth2.http_timeout_secs, 30);
        assert_eq!(config.host.log_level, "info");
        assert!(!config.accounts.email_verified);
        assert_eq!(config.accounts.forced_email_domain(), None);
        assert_eq!(config.accounts.avatar_template(), None);
        assert!(!config.debug.debug_auth);
        assert!(config.json_paths.user_id.is_empty());
    }

    #[test]
    fn test_validate_requires_user_id_path() {
        let mut config = PluginConfig::from_toml_str(sample_toml()).unwrap();
        for expr in ["  ", ".", ".."] {
            config.json_paths.user_id = expr.into();
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidValue { ref field, .. }) if field == "json_paths.user_id"
            ));
        }

        config.json_paths.user_id = "id.".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_segment() {
        let mut config = PluginConfig::from_toml_str(sample_toml()).unwrap();
        config.json_paths.email = "profile..email".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "json_paths.email"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = PluginConfig::from_toml_str(sample_toml()).unwrap();
        config.oauth2.token_url = "id.example.com/token".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "oauth2.token_url"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_template() {
        let mut config = PluginConfig::from_toml_str(sample_toml()).unwrap();
        config.accounts.avatar_url_template = "https://x/%{avatar}.png".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. })
                if field == "accounts.avatar_url_template"
        ));
    }

    #[test]
    fn test_validate_rejects_domain_with_at() {
        let mut config = PluginConfig::from_toml_str(sample_toml()).unwrap();
        config.accounts.force_email_domain = "me@example.org".into();
        assert!(config.validate().is_err());
        config.accounts.force_email_domain = "example.org".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_OAUTH2_SECRET_RESOLVE", "s3cret");

        let mut config = PluginConfig::from_toml_str(sample_toml()).unwrap();
        config.oauth2.client_secret_env = "TEST_OAUTH2_SECRET_RESOLVE".into();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.require_client_secret().unwrap(), "s3cret");

        std::env::remove_var("TEST_OAUTH2_SECRET_RESOLVE");
    }

    #[test]
    fn test_missing_secret_is_reported() {
        let mut config = PluginConfig::from_toml_str(sample_toml()).unwrap();
        config.oauth2.client_secret_env = "TEST_OAUTH2_SECRET_UNSET_VAR".into();
        config.resolve_env_vars().unwrap();
        assert!(matches!(
            config.require_client_secret(),
            Err(ConfigError::EnvVarMissing { ref var, .. }) if var == "TEST_OAUTH2_SECRET_UNSET_VAR"
        ));
    }
}
