//! Avatar import collaborators.
//!
//! Importing is best effort: the linker logs an [`AvatarError`] and carries
//! on with account creation.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument};

use crate::errors::AvatarError;
use crate::models::User;

/// Fetches an avatar image for a freshly created account.
pub trait AvatarImporter {
    fn import_from_url(
        &self,
        url: &str,
        user: &User,
    ) -> impl Future<Output = Result<(), AvatarError>> + Send;
}

/// Downloads avatars over HTTP into `<dir>/<user id>.<ext>`.
#[derive(Clone)]
pub struct HttpAvatarImporter {
    http: reqwest::Client,
    dir: PathBuf,
}

impl HttpAvatarImporter {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, AvatarError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("oauth2-basic/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let dir = dir.into();
        info!(dir = %dir.display(), "created HttpAvatarImporter");
        Ok(Self { http, dir })
    }

    /// Where the avatar for `user_id` with the given extension is written.
    pub fn target_path(&self, user_id: i64, ext: &str) -> PathBuf {
        self.dir.join(format!("{user_id}.{ext}"))
    }
}

impl AvatarImporter for HttpAvatarImporter {
    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn import_from_url(&self, url: &str, user: &User) -> Result<(), AvatarError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AvatarError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let ext = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(extension_for)
            .unwrap_or("img");
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(AvatarError::Empty(url.to_string()));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.target_path(user.id, ext);
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), len = bytes.len(), "avatar written");
        Ok(())
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}

/// For hosts without avatar support. Logs the request and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAvatarImporter;

impl AvatarImporter for NoopAvatarImporter {
    async fn import_from_url(&self, url: &str, user: &User) -> Result<(), AvatarError> {
        debug!(url, user_id = user.id, "avatar import skipped");
        Ok(())
    }
}
