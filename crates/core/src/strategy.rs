//! OAuth2 middleware options and the login-provider descriptor.
//!
//! The token exchange itself belongs to whatever OAuth2 client the host
//! runs; this module only assembles the options that client is configured
//! with.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::config::PluginConfig;
use crate::errors::ConfigError;

/// Provider name the strategy and the host's auth provider are registered
/// under.
pub const PROVIDER_NAME: &str = "oauth2_basic";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientOptions {
    pub authorize_url: String,
    pub token_url: String,
}

/// Options handed to the host's OAuth2 middleware on each request setup.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StrategyOptions {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub provider_ignores_state: bool,
    pub client_options: ClientOptions,
    /// Extra headers for the token request; empty unless
    /// `send_auth_header` is on.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub token_headers: BTreeMap<String, String>,
}

impl StrategyOptions {
    /// Build options from configuration. The client secret must already be
    /// resolved.
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        let client_secret = config.require_client_secret()?.to_string();
        let client_id = config.oauth2.client_id.clone();

        let mut token_headers = BTreeMap::new();
        if config.oauth2.send_auth_header {
            token_headers.insert(
                "Authorization".to_string(),
                basic_auth_header(&client_id, &client_secret),
            );
        }

        Ok(Self {
            name: PROVIDER_NAME.to_string(),
            client_id,
            client_secret,
            provider_ignores_state: true,
            client_options: ClientOptions {
                authorize_url: config.oauth2.authorize_url.clone(),
                token_url: config.oauth2.token_url.clone(),
            },
            token_headers,
        })
    }

    /// Copy with the secret and any Basic credentials replaced by `***`.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.client_secret = "***".into();
        for value in copy.token_headers.values_mut() {
            *value = "Basic ***".into();
        }
        copy
    }
}

/// `Basic base64(client_id:client_secret)`, strict (padded, no newlines).
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{client_secret}")))
}

/// How the login button is presented by the host.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub name: String,
    pub title: String,
    pub enabled: bool,
    pub message: String,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl ProviderDescriptor {
    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            name: PROVIDER_NAME.to_string(),
            title: config.oauth2.button_title.clone(),
            enabled: config.oauth2.enabled,
            message: "OAuth2".to_string(),
            frame_width: 550,
            frame_height: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(send_auth_header: bool) -> PluginConfig {
        let mut config = PluginConfig::from_toml_str(
            r#"
[oauth2]
client_id = "forum"
client_secret_env = "UNUSED"
authorize_url = "https://id.example.com/authorize"
token_url = "https://id.example.com/token"
user_json_url = "https://id.example.com/me"
"#,
        )
        .unwrap();
        config.oauth2.client_secret = Some("s3cret".into());
        config.oauth2.send_auth_header = send_auth_header;
        config
    }

    #[test]
    fn test_basic_auth_header() {
        // base64("forum:s3cret")
        assert_eq!(basic_auth_header("forum", "s3cret"), "Basic Zm9ydW06czNjcmV0");
    }

    #[test]
    fn test_options_with_auth_header() {
        let opts = StrategyOptions::from_config(&config(true)).unwrap();
        assert_eq!(opts.name, "oauth2_basic");
        assert!(opts.provider_ignores_state);
        assert_eq!(opts.client_options.token_url, "https://id.example.com/token");
        assert_eq!(
            opts.token_headers.get("Authorization").map(String::as_str),
            Some("Basic Zm9ydW06czNjcmV0")
        );
    }

    #[test]
    fn test_options_without_auth_header() {
        let opts = StrategyOptions::from_config(&config(false)).unwrap();
        assert!(opts.token_headers.is_empty());
        let json = serde_json::to_value(&opts).unwrap();
        assert!(json.get("token_headers").is_none());
    }

    #[test]
    fn test_missing_secret() {
        let mut cfg = config(true);
        cfg.oauth2.client_secret = None;
        assert!(matches!(
            StrategyOptions::from_config(&cfg),
            Err(ConfigError::EnvVarMissing { .. })
        ));
    }

    #[test]
    fn test_redacted() {
        let opts = StrategyOptions::from_config(&config(true)).unwrap().redacted();
        assert_eq!(opts.client_secret, "***");
        assert_eq!(opts.token_headers["Authorization"], "Basic ***");
    }

    #[test]
    fn test_provider_descriptor() {
        let desc = ProviderDescriptor::from_config(&config(true));
        assert_eq!(desc.title, "with OAuth2");
        assert_eq!(desc.message, "OAuth2");
        assert_eq!((desc.frame_width, desc.frame_height), (550, 600));
        assert!(desc.enabled);
    }
}
