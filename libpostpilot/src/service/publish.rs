//! Publish fan-out engine
//!
//! Takes a claimed post, attempts every requested platform one after the
//! other, and reduces the per-platform outcomes to a terminal status. A
//! failing platform never stops the others, and nothing a platform does is
//! surfaced as an error; only a store failure while persisting the result
//! escapes to the caller.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::accounts::{resolve, AccountDirectory};
use crate::db::Database;
use crate::error::{PlatformError, Result};
use crate::platforms::{AdapterFactory, PublishRequest};
use crate::service::events::{Event, EventBus};
use crate::service::sinks::{notification_message, Sinks};
use crate::types::{
    PlatformKind, Post, PostStatus, PublishedPostRecord, SocialAccount, SocialPostIds,
};

pub const NO_PLATFORMS: &str = "No platforms specified";
pub const NO_MEDIA_URL: &str = "No media URL";
pub const NO_ACCOUNTS: &str = "No connected social accounts";
pub const NO_ACCOUNT_FOR_PLATFORM: &str = "No connected account";

/// What happened on one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlatformOutcome {
    Published { platform: String, remote_id: String },
    Failed { platform: String, reason: String },
}

impl PlatformOutcome {
    pub fn platform(&self) -> &str {
        match self {
            PlatformOutcome::Published { platform, .. } | PlatformOutcome::Failed { platform, .. } => {
                platform
            }
        }
    }

    fn failed(platform: &str, reason: impl Into<String>) -> Self {
        PlatformOutcome::Failed {
            platform: platform.to_string(),
            reason: reason.into(),
        }
    }
}

/// Terminal state derived from a set of outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub status: PostStatus,
    pub error_message: Option<String>,
    /// Remote ids of the platforms that succeeded
    pub social_post_ids: SocialPostIds,
}

impl Aggregate {
    fn failed(message: &str) -> Self {
        Self {
            status: PostStatus::Failed,
            error_message: Some(message.to_string()),
            social_post_ids: SocialPostIds::new(),
        }
    }
}

/// Reduce per-platform outcomes to a post status
///
/// All succeeded is `published`, none succeeded is `failed`, anything in
/// between is `partially_published`.
pub fn aggregate(outcomes: &[PlatformOutcome]) -> Aggregate {
    if outcomes.is_empty() {
        return Aggregate::failed(NO_PLATFORMS);
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    let mut social_post_ids = SocialPostIds::new();

    for outcome in outcomes {
        match outcome {
            PlatformOutcome::Published { platform, remote_id } => {
                succeeded.push(platform.as_str());
                social_post_ids.insert(platform.clone(), remote_id.clone());
            }
            PlatformOutcome::Failed { platform, reason } => {
                failed.push(format!("{} ({})", platform, reason));
            }
        }
    }

    let (status, error_message) = match (succeeded.is_empty(), failed.is_empty()) {
        (false, true) => (PostStatus::Published, None),
        (false, false) => (
            PostStatus::PartiallyPublished,
            Some(format!(
                "Published to: {}. Failed: {}",
                succeeded.join(", "),
                failed.join(", ")
            )),
        ),
        _ => (
            PostStatus::Failed,
            Some(format!(
                "Failed to publish to all platforms: {}",
                failed.join(", ")
            )),
        ),
    };

    Aggregate {
        status,
        error_message,
        social_post_ids,
    }
}

/// Result of one fan-out, as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub post_id: String,
    pub status: PostStatus,
    pub error_message: Option<String>,
    pub outcomes: Vec<PlatformOutcome>,
}

#[derive(Clone)]
pub struct PublishEngine {
    db: Database,
    accounts: AccountDirectory,
    adapters: Arc<dyn AdapterFactory>,
    sinks: Sinks,
    events: EventBus,
}

impl PublishEngine {
    pub fn new(db: Database, adapters: Arc<dyn AdapterFactory>, events: EventBus) -> Self {
        Self {
            accounts: AccountDirectory::new(db.clone()),
            sinks: Sinks::new(db.clone()),
            db,
            adapters,
            events,
        }
    }

    /// Publish a post this process has claimed
    ///
    /// # Errors
    ///
    /// Only when the outcome itself cannot be written back; the caller is
    /// expected to mark the post failed in that case.
    pub async fn publish(&self, post: &Post) -> Result<PublishReport> {
        info!(post_id = %post.id, platforms = ?post.platforms, "Publishing scheduled post");

        let (summary, outcomes) = match self.attempt(post).await {
            Ok(outcomes) => (aggregate(&outcomes), outcomes),
            Err(message) => (Aggregate::failed(&message), Vec::new()),
        };

        self.finalize(post, summary, outcomes).await
    }

    /// Pre-flight checks, then one attempt per requested platform
    ///
    /// `Err` carries the reason when no platform could be attempted at all.
    async fn attempt(&self, post: &Post) -> std::result::Result<Vec<PlatformOutcome>, String> {
        if post.platforms.is_empty() {
            warn!(post_id = %post.id, "{}", NO_PLATFORMS);
            return Err(NO_PLATFORMS.to_string());
        }

        let media_url = match post.media_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => {
                warn!(post_id = %post.id, "{}", NO_MEDIA_URL);
                return Err(NO_MEDIA_URL.to_string());
            }
        };

        let accounts = self.accounts.active_accounts(&post.user_id).await.map_err(|e| {
            error!(post_id = %post.id, "Failed to load accounts: {}", e);
            e.to_string()
        })?;

        if accounts.is_empty() {
            warn!(post_id = %post.id, user_id = %post.user_id, "{}", NO_ACCOUNTS);
            return Err(NO_ACCOUNTS.to_string());
        }

        let request = PublishRequest {
            media_url,
            caption: &post.caption,
            media_kind: post.media_kind,
        };

        let mut outcomes = Vec::with_capacity(post.platforms.len());
        for platform in &post.platforms {
            outcomes.push(self.publish_one(post, platform, &request, &accounts).await);
        }
        Ok(outcomes)
    }

    async fn publish_one(
        &self,
        post: &Post,
        platform: &str,
        request: &PublishRequest<'_>,
        accounts: &[SocialAccount],
    ) -> PlatformOutcome {
        let Some(account) = resolve(accounts, platform) else {
            warn!(post_id = %post.id, platform, "No connected account found for platform");
            return PlatformOutcome::failed(platform, NO_ACCOUNT_FOR_PLATFORM);
        };

        let result = match platform.parse::<PlatformKind>() {
            Ok(kind) => match self.adapters.build(kind, account) {
                Ok(adapter) => adapter.publish(request).await,
                Err(e) => Err(e),
            },
            Err(_) => Err(PlatformError::Unsupported(platform.to_string())),
        };

        let outcome = match result {
            Ok(remote_id) => {
                info!(post_id = %post.id, platform, remote_id = %remote_id, "Published");
                PlatformOutcome::Published {
                    platform: platform.to_string(),
                    remote_id,
                }
            }
            Err(e) => {
                error!(post_id = %post.id, platform, "Failed to publish: {}", e);
                PlatformOutcome::failed(platform, e.to_string())
            }
        };

        self.sinks
            .record_attempt(&PublishedPostRecord {
                id: None,
                post_id: post.id.clone(),
                user_id: post.user_id.clone(),
                account_id: Some(account.account_id.clone()),
                platform: platform.to_string(),
                platform_post_id: match &outcome {
                    PlatformOutcome::Published { remote_id, .. } => Some(remote_id.clone()),
                    PlatformOutcome::Failed { .. } => None,
                },
                media_kind: post.media_kind,
                success: matches!(outcome, PlatformOutcome::Published { .. }),
                error_message: match &outcome {
                    PlatformOutcome::Failed { reason, .. } => Some(reason.clone()),
                    PlatformOutcome::Published { .. } => None,
                },
                recorded_at: Utc::now().timestamp(),
            })
            .await;

        outcome
    }

    async fn finalize(
        &self,
        post: &Post,
        aggregate: Aggregate,
        outcomes: Vec<PlatformOutcome>,
    ) -> Result<PublishReport> {
        self.db
            .finish_publish(
                &post.id,
                aggregate.status,
                aggregate.error_message.as_deref(),
                &aggregate.social_post_ids,
                Utc::now().timestamp(),
            )
            .await?;

        info!(post_id = %post.id, status = %aggregate.status, "Post finalized");

        if !aggregate.social_post_ids.is_empty() {
            match self
                .db
                .merge_autoresponder_social_ids(&post.id, &aggregate.social_post_ids)
                .await
            {
                Ok(true) => info!(post_id = %post.id, "Updated auto-responder with remote ids"),
                Ok(false) => {}
                Err(e) => error!(post_id = %post.id, "Failed to update auto-responder settings: {}", e),
            }
        }

        // Requested order, not map order
        let published_to: Vec<String> = post
            .platforms
            .iter()
            .filter(|p| aggregate.social_post_ids.contains_key(p.as_str()))
            .cloned()
            .collect();

        self.sinks
            .notify(&post.user_id, &notification_message(aggregate.status, &published_to))
            .await;
        if aggregate.status.is_live() {
            self.sinks
                .record_activity(post, aggregate.status, &published_to)
                .await;
        }

        self.events.emit(Event::PostPublished {
            post_id: post.id.clone(),
            status: aggregate.status,
            outcomes: outcomes.clone(),
            error_message: aggregate.error_message.clone(),
        });

        Ok(PublishReport {
            post_id: post.id.clone(),
            status: aggregate.status,
            error_message: aggregate.error_message,
            outcomes,
        })
    }
}
