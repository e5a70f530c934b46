//! Facebook page adapter

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::error::PlatformError;
use crate::platforms::graph::{extract_id, GraphClient};
use crate::platforms::{Platform, PlatformResult, PublishRequest};
use crate::types::{Comment, MediaKind, SocialAccount};

/// Publishes to, and answers comments on, a single Facebook page
pub struct FacebookPlatform {
    client: GraphClient,
    page_id: String,
    token: SecretString,
}

impl std::fmt::Debug for FacebookPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookPlatform")
            .field("page_id", &self.page_id)
            .finish_non_exhaustive()
    }
}

impl FacebookPlatform {
    pub fn from_account(client: GraphClient, account: &SocialAccount) -> PlatformResult<Self> {
        let page_id = account
            .page_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlatformError::MissingLinkage("No Facebook page ID found".to_string()))?;

        let token = account
            .access_token()
            .ok_or_else(|| PlatformError::MissingLinkage("No access token found".to_string()))?;

        Ok(Self {
            client,
            page_id: page_id.to_string(),
            token: SecretString::from(token.to_string()),
        })
    }

    fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Three-phase reel upload: start, transfer by URL, finish
    async fn publish_reel(&self, video_url: &str, description: &str) -> PlatformResult<String> {
        let reels_path = format!("{}/video_reels", self.page_id);

        let started = self
            .client
            .post(&reels_path, self.token(), &[("upload_phase", "start")])
            .await?;
        let video_id = extract_id(&started, &["video_id"])
            .ok_or_else(|| PlatformError::remote("Reel upload did not return a video id"))?;
        debug!(video_id = %video_id, "Reel upload started");

        self.client
            .post(
                &video_id,
                self.token(),
                &[("upload_phase", "transfer"), ("file_url", video_url)],
            )
            .await?;

        let finished = self
            .client
            .post(
                &reels_path,
                self.token(),
                &[
                    ("upload_phase", "finish"),
                    ("video_id", video_id.as_str()),
                    ("description", description),
                ],
            )
            .await?;

        // The finish call usually answers {"success": true}; the reel is the uploaded video
        Ok(extract_id(&finished, &["id", "post_id"]).unwrap_or(video_id))
    }
}

#[async_trait]
impl Platform for FacebookPlatform {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> PlatformResult<String> {
        let result = match request.media_kind {
            MediaKind::Reel => return self.publish_reel(request.media_url, request.caption).await,
            MediaKind::Image => {
                self.client
                    .post(
                        &format!("{}/photos", self.page_id),
                        self.token(),
                        &[("url", request.media_url), ("caption", request.caption)],
                    )
                    .await?
            }
            MediaKind::Video => {
                self.client
                    .post(
                        &format!("{}/videos", self.page_id),
                        self.token(),
                        &[("file_url", request.media_url), ("description", request.caption)],
                    )
                    .await?
            }
        };

        extract_id(&result, &["id", "post_id"])
            .ok_or_else(|| PlatformError::remote("Facebook did not return a post id"))
    }

    async fn delete_post(&self, remote_id: &str) -> PlatformResult<()> {
        let result = self.client.delete(remote_id, self.token()).await?;
        if result.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(PlatformError::remote(format!("Failed to delete {}", remote_id)));
        }
        Ok(())
    }

    async fn list_comments(&self, remote_id: &str) -> PlatformResult<Vec<Comment>> {
        let result = self
            .client
            .get(
                &format!("{}/comments", remote_id),
                self.token(),
                &[("fields", "id,message,from{id,name},created_time"), ("limit", "50")],
            )
            .await?;

        Ok(parse_comments(&result))
    }

    async fn reply(&self, comment_id: &str, text: &str) -> PlatformResult<String> {
        let result = self
            .client
            .post(&format!("{}/comments", comment_id), self.token(), &[("message", text)])
            .await?;

        extract_id(&result, &["id"]).ok_or_else(|| PlatformError::remote("Reply was not created"))
    }
}

/// Facebook comments carry `message` and a `from` object
fn parse_comments(result: &Value) -> Vec<Comment> {
    let Some(data) = result.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    data.iter()
        .filter_map(|c| {
            let id = c.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
            let from = c.get("from");
            Some(Comment {
                id: id.to_string(),
                text: c.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
                author_id: from
                    .and_then(|f| f.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                author_name: from
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}
