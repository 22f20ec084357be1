//! User-info document fetching.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::{debug, info, instrument, warn};

use crate::errors::FetchError;

/// Fetches the raw user-info document with a bearer token.
pub trait UserInfoFetcher {
    fn fetch(
        &self,
        url: &str,
        bearer_token: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// `reqwest`-backed fetcher. Non-2xx responses are errors.
#[derive(Clone)]
pub struct HttpUserInfoFetcher {
    http: reqwest::Client,
}

impl HttpUserInfoFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("oauth2-basic/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        info!(timeout_secs = timeout.as_secs(), "created HttpUserInfoFetcher");
        Ok(Self { http })
    }
}

impl UserInfoFetcher for HttpUserInfoFetcher {
    // The URL may carry the token, so the span only records its redacted form
    // and reqwest errors are stripped of their URL.
    #[instrument(skip_all, fields(endpoint = %redacted_endpoint(url, bearer_token)))]
    async fn fetch(&self, url: &str, bearer_token: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, "user-info endpoint returned error");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(reqwest::Error::without_url)?;
        debug!(len = bytes.len(), "fetched user-info document");
        Ok(bytes.to_vec())
    }
}

/// Scheme, host and path of `url`, with the query and fragment dropped and
/// any occurrence of `token` masked.
pub fn redacted_endpoint(url: &str, token: &str) -> String {
    let base = match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => return "<invalid url>".to_string(),
    };
    if token.is_empty() {
        base
    } else {
        base.replace(token, "***")
    }
}

/// Substitute the access token into the configured user-info URL. Only the
/// first `:token` is replaced.
pub fn user_json_url(template: &str, token: &str) -> String {
    template.replacen(":token", token, 1)
}
