//! Notification, activity and audit writes
//!
//! Everything here is best effort: failures are logged and swallowed so a
//! broken side channel never changes a post's outcome.

use chrono::Utc;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::db::Database;
use crate::types::{Activity, Notification, Post, PostStatus, PublishedPostRecord};

pub const NOTIFICATION_KIND: &str = "scheduled_post";
pub const ACTIVITY_KIND: &str = "post_published";

#[derive(Clone)]
pub struct Sinks {
    db: Database,
}

impl Sinks {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn notify(&self, user_id: &str, message: &str) {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: NOTIFICATION_KIND.to_string(),
            message: message.to_string(),
            is_read: false,
            sent_at: Utc::now().timestamp(),
        };

        if let Err(e) = self.db.create_notification(&notification).await {
            error!(user_id, "Failed to create notification: {}", e);
        }
    }

    /// Activity entry for a post that reached at least one platform
    pub async fn record_activity(&self, post: &Post, status: PostStatus, platforms: &[String]) {
        let activity = Activity {
            id: Uuid::new_v4().to_string(),
            user_id: post.user_id.clone(),
            kind: ACTIVITY_KIND.to_string(),
            action: "Published Scheduled Post".to_string(),
            description: format!(
                "Automatically published {} to {}",
                post.media_kind,
                platforms.join(", ")
            ),
            platform: platforms.first().cloned(),
            content_kind: Some(post.media_kind.to_string()),
            content_id: Some(post.id.clone()),
            metadata: json!({
                "platforms": platforms,
                "scheduled_at": post.scheduled_at.map(|at| at.to_rfc3339()),
                "status": status,
            }),
            created_at: Utc::now().timestamp(),
        };

        if let Err(e) = self.db.create_activity(&activity).await {
            error!(post_id = %post.id, "Failed to create activity: {}", e);
        }
    }

    /// Audit row for one platform attempt
    pub async fn record_attempt(&self, record: &PublishedPostRecord) {
        if let Err(e) = self.db.record_published_post(record).await {
            error!(
                post_id = %record.post_id,
                platform = %record.platform,
                "Failed to record published post: {}", e
            );
        }
    }
}

/// User-facing notification text for a terminal status
pub fn notification_message(status: PostStatus, published_to: &[String]) -> String {
    match status {
        PostStatus::Published => {
            format!("Your post has been published to {}", published_to.join(", "))
        }
        PostStatus::PartiallyPublished => {
            "Your post was partially published. Some platforms failed.".to_string()
        }
        _ => "Failed to publish your scheduled post. Please try again.".to_string(),
    }
}
