//! Instagram business account adapter
//!
//! Instagram publishing is container based: create a media container, wait
//! for video processing to finish, then publish the container.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PlatformError;
use crate::platforms::graph::{extract_id, GraphClient};
use crate::platforms::{Platform, PlatformResult, PublishRequest};
use crate::types::{Comment, MediaKind, SocialAccount};

const VIDEO_STATUS_ATTEMPTS: u32 = 30;
const REEL_STATUS_ATTEMPTS: u32 = 60;

pub struct InstagramPlatform {
    client: GraphClient,
    instagram_account_id: String,
    token: SecretString,
}

impl std::fmt::Debug for InstagramPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstagramPlatform")
            .field("instagram_account_id", &self.instagram_account_id)
            .finish_non_exhaustive()
    }
}

impl InstagramPlatform {
    pub fn from_account(client: GraphClient, account: &SocialAccount) -> PlatformResult<Self> {
        let instagram_account_id = account
            .instagram_account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PlatformError::MissingLinkage("No Instagram business account ID found".to_string())
            })?;

        // Instagram calls are made with the linked page's token
        let token = account
            .access_token()
            .ok_or_else(|| PlatformError::MissingLinkage("No access token found".to_string()))?;

        Ok(Self {
            client,
            instagram_account_id: instagram_account_id.to_string(),
            token: SecretString::from(token.to_string()),
        })
    }

    fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Poll the container until it reports `FINISHED`
    ///
    /// Running out of attempts is not an error here; the publish call that
    /// follows reports whether the container was usable.
    async fn wait_for_container(&self, creation_id: &str, attempts: u32) -> PlatformResult<()> {
        for attempt in 1..=attempts {
            let status = self
                .client
                .get(creation_id, self.token(), &[("fields", "status_code")])
                .await?;

            match status.get("status_code").and_then(Value::as_str) {
                Some("FINISHED") => return Ok(()),
                Some("ERROR") | Some("EXPIRED") => {
                    return Err(PlatformError::remote(format!(
                        "Media container {} failed processing",
                        creation_id
                    )));
                }
                other => {
                    debug!(creation_id, attempt, "Container status {:?}", other);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.client.poll_interval()).await;
            }
        }

        warn!(creation_id, "Media container still processing after {} checks", attempts);
        Ok(())
    }
}

#[async_trait]
impl Platform for InstagramPlatform {
    fn name(&self) -> &str {
        "instagram"
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> PlatformResult<String> {
        let mut params: Vec<(&str, &str)> = vec![("caption", request.caption)];
        let attempts = match request.media_kind {
            MediaKind::Image => {
                params.push(("image_url", request.media_url));
                None
            }
            MediaKind::Video => {
                params.push(("media_type", "VIDEO"));
                params.push(("video_url", request.media_url));
                Some(VIDEO_STATUS_ATTEMPTS)
            }
            MediaKind::Reel => {
                params.push(("media_type", "REELS"));
                params.push(("video_url", request.media_url));
                params.push(("share_to_feed", "true"));
                Some(REEL_STATUS_ATTEMPTS)
            }
        };

        let container = self
            .client
            .post(&format!("{}/media", self.instagram_account_id), self.token(), &params)
            .await?;
        let creation_id = extract_id(&container, &["id"])
            .ok_or_else(|| PlatformError::remote("Media container was not created"))?;

        if let Some(attempts) = attempts {
            self.wait_for_container(&creation_id, attempts).await?;
        }

        let published = self
            .client
            .post(
                &format!("{}/media_publish", self.instagram_account_id),
                self.token(),
                &[("creation_id", creation_id.as_str())],
            )
            .await?;

        extract_id(&published, &["id"])
            .ok_or_else(|| PlatformError::remote("Instagram did not return a media id"))
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
                &[("fields", "id,text,username,timestamp"), ("limit", "50")],
            )
            .await?;

        let Some(data) = result.get("data").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        // Instagram exposes a username but no commenter id
        Ok(data
            .iter()
            .filter_map(|c| {
                let id = c.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
                Some(Comment {
                    id: id.to_string(),
                    text: c.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
                    author_id: None,
                    author_name: c.get("username").and_then(Value::as_str).map(str::to_string),
                })
            })
            .collect())
    }

    async fn reply(&self, comment_id: &str, text: &str) -> PlatformResult<String> {
        let result = self
            .client
            .post(&format!("{}/replies", comment_id), self.token(), &[("message", text)])
            .await?;

        extract_id(&result, &["id"]).ok_or_else(|| PlatformError::remote("Reply was not created"))
    }
}
