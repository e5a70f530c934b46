//! Database operations for Postpilot
//!
//! SQLite stands in for the document store. The two operations that need
//! cross-process atomicity are single conditional statements judged by the
//! number of rows they touched:
//!
//! - [`Database::claim_scheduled_post`]: `UPDATE ... WHERE status = 'scheduled'`
//! - [`Database::reserve_comment`]: `INSERT ... ON CONFLICT DO NOTHING`

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::warn;

use crate::error::{DbError, Result};
use crate::scheduling::{format_scheduled_at, is_due, parse_scheduled_at};
use crate::types::{
    Activity, AutoresponderSetting, CommentThread, CompletedReply, MediaKind, Notification, Post,
    PostStatus, PublishedPostRecord, SocialAccount, SocialPostIds, Tone,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes work for SQLite URLs on both Windows and Unix;
        // mode=rwc creates the file when missing
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Insert a post (authoring flow and tests)
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, platforms, media_url, media_kind, caption, status,
                               scheduled_at, social_post_ids, error_message, created_at,
                               publishing_started_at, published_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(to_json(&post.platforms)?)
        .bind(&post.media_url)
        .bind(post.media_kind.as_str())
        .bind(&post.caption)
        .bind(post.status.as_str())
        .bind(post.scheduled_at.map(format_scheduled_at))
        .bind(to_json(&post.social_post_ids)?)
        .bind(&post.error_message)
        .bind(post.created_at)
        .bind(post.publishing_started_at)
        .bind(post.published_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| post_from_row(&r)).transpose()
    }

    /// Scheduled posts whose time has come
    ///
    /// Rows with a missing or unreadable `scheduled_at`, or any other column
    /// that does not decode, are skipped with a warning.
    pub async fn get_due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE status = 'scheduled' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut due = Vec::new();
        for row in rows {
            let id: String = row.get("id");
            let raw: Option<String> = row.get("scheduled_at");

            let Some(raw) = raw else {
                warn!(post_id = %id, "Scheduled post has no scheduled_at, skipping");
                continue;
            };

            let scheduled_at = match parse_scheduled_at(&raw) {
                Ok(at) => at,
                Err(e) => {
                    warn!(post_id = %id, "Invalid scheduled_at '{}': {}", raw, e);
                    continue;
                }
            };

            if !is_due(scheduled_at, now) {
                continue;
            }

            match post_from_row(&row) {
                Ok(post) => due.push(post),
                Err(e) => warn!(post_id = %id, "Skipping unreadable post: {}", e),
            }
        }

        Ok(due)
    }

    /// Atomically move a post from `scheduled` to `publishing`
    ///
    /// Returns `true` only for the single caller whose update matched.
    pub async fn claim_scheduled_post(&self, post_id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'publishing', publishing_started_at = ?, updated_at = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Write the terminal outcome of a publish attempt
    ///
    /// `new_ids` is merged into the stored `social_post_ids`; platforms absent
    /// from `new_ids` keep their previous remote ids.
    pub async fn finish_publish(
        &self,
        post_id: &str,
        status: PostStatus,
        error_message: Option<&str>,
        new_ids: &SocialPostIds,
        now: i64,
    ) -> Result<()> {
        let published_at = if status.is_live() { Some(now) } else { None };

        sqlx::query(
            r#"
            UPDATE posts
            SET status = ?,
                error_message = ?,
                social_post_ids = json_patch(social_post_ids, ?),
                published_at = COALESCE(?, published_at),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(to_json(new_ids)?)
        .bind(published_at)
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Mark a post failed without touching its remote ids
    pub async fn mark_post_failed(&self, post_id: &str, error_message: &str, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE posts SET status = 'failed', error_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(error_message)
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Auto-responder settings
    // ------------------------------------------------------------------

    /// Insert or replace the settings for a post, keeping the original `created_at`
    pub async fn save_autoresponder_setting(&self, setting: &AutoresponderSetting) -> Result<()> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO autoresponder_settings (post_id, user_id, enabled, tone, custom_instructions,
                                                response_delay_seconds, social_post_ids, post_caption,
                                                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                user_id = excluded.user_id,
                enabled = excluded.enabled,
                tone = excluded.tone,
                custom_instructions = excluded.custom_instructions,
                response_delay_seconds = excluded.response_delay_seconds,
                social_post_ids = excluded.social_post_ids,
                post_caption = excluded.post_caption,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&setting.post_id)
        .bind(&setting.user_id)
        .bind(setting.enabled)
        .bind(setting.tone.as_str())
        .bind(&setting.custom_instructions)
        .bind(setting.response_delay_seconds)
        .bind(to_json(&setting.social_post_ids)?)
        .bind(&setting.post_caption)
        .bind(setting.created_at.unwrap_or(now))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_autoresponder_setting(&self, post_id: &str) -> Result<Option<AutoresponderSetting>> {
        let row = sqlx::query("SELECT * FROM autoresponder_settings WHERE post_id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| setting_from_row(&r)).transpose()
    }

    /// All settings with `enabled = true`; undecodable rows are skipped
    pub async fn get_enabled_autoresponders(&self) -> Result<Vec<AutoresponderSetting>> {
        let rows = sqlx::query(
            "SELECT * FROM autoresponder_settings WHERE enabled = 1 ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut settings = Vec::with_capacity(rows.len());
        for row in &rows {
            match setting_from_row(row) {
                Ok(setting) => settings.push(setting),
                Err(e) => {
                    let post_id: String = row.get("post_id");
                    warn!(post_id = %post_id, "Skipping unreadable auto-responder setting: {}", e);
                }
            }
        }

        Ok(settings)
    }

    /// Merge freshly published remote ids into an existing setting's mirror
    ///
    /// Returns `false` when the post has no auto-responder settings.
    pub async fn merge_autoresponder_social_ids(&self, post_id: &str, ids: &SocialPostIds) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE autoresponder_settings
            SET social_post_ids = json_patch(social_post_ids, ?), updated_at = ?
            WHERE post_id = ?
            "#,
        )
        .bind(to_json(ids)?)
        .bind(Utc::now().timestamp())
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Comment threads
    // ------------------------------------------------------------------

    pub async fn get_comment_thread(&self, comment_id: &str) -> Result<Option<CommentThread>> {
        let row = sqlx::query("SELECT * FROM comment_threads WHERE comment_id = ?")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| thread_from_row(&r)))
    }

    /// Whether a completed reply exists for the comment
    pub async fn has_replied(&self, comment_id: &str) -> Result<bool> {
        let replied: Option<bool> =
            sqlx::query_scalar("SELECT replied FROM comment_threads WHERE comment_id = ?")
                .bind(comment_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        Ok(replied.unwrap_or(false))
    }

    /// Create the reservation record if, and only if, none exists yet
    ///
    /// Returns `true` for the caller that created the record.
    pub async fn reserve_comment(&self, comment_id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO comment_threads (comment_id, replied, reserved_at)
            VALUES (?, 0, ?)
            ON CONFLICT(comment_id) DO NOTHING
            "#,
        )
        .bind(comment_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Turn a reservation into a completed reply
    pub async fn complete_comment_thread(&self, reply: &CompletedReply, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comment_threads (comment_id, replied, reserved_at, post_id, social_post_id,
                                         platform, comment_text, commenter_id, commenter_name,
                                         response_text, response_id, responder_id, tone, completed_at)
            VALUES (?, 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(comment_id) DO UPDATE SET
                replied = 1,
                post_id = excluded.post_id,
                social_post_id = excluded.social_post_id,
                platform = excluded.platform,
                comment_text = excluded.comment_text,
                commenter_id = excluded.commenter_id,
                commenter_name = excluded.commenter_name,
                response_text = excluded.response_text,
                response_id = excluded.response_id,
                responder_id = excluded.responder_id,
                tone = excluded.tone,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&reply.comment_id)
        .bind(now)
        .bind(&reply.post_id)
        .bind(&reply.social_post_id)
        .bind(&reply.platform)
        .bind(&reply.comment_text)
        .bind(&reply.commenter_id)
        .bind(&reply.commenter_name)
        .bind(&reply.response_text)
        .bind(&reply.response_id)
        .bind(&reply.responder_id)
        .bind(reply.tone.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Completed and pending threads for a post, newest first
    pub async fn get_comment_threads_for_post(&self, post_id: &str, limit: usize) -> Result<Vec<CommentThread>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM comment_threads
            WHERE post_id = ?
            ORDER BY completed_at DESC
            LIMIT ?
            "#,
        )
        .bind(post_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(thread_from_row).collect())
    }

    // ------------------------------------------------------------------
    // Social accounts
    // ------------------------------------------------------------------

    /// Insert a linked account (account-linking flow and tests)
    pub async fn create_social_account(&self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_accounts (account_id, user_id, platform, display_name, access_token,
                                         page_access_token, page_id, instagram_account_id,
                                         is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.account_id)
        .bind(&account.user_id)
        .bind(&account.platform)
        .bind(&account.display_name)
        .bind(account.access_token.as_ref().map(|t| t.expose_secret()))
        .bind(account.page_access_token.as_ref().map(|t| t.expose_secret()))
        .bind(&account.page_id)
        .bind(&account.instagram_account_id)
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Every account linked by a user, active or not, in creation order
    pub async fn get_accounts_for_user(&self, user_id: &str) -> Result<Vec<SocialAccount>> {
        let rows = sqlx::query(
            "SELECT * FROM social_accounts WHERE user_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(account_from_row).collect())
    }

    // ------------------------------------------------------------------
    // Audit, notifications and activities
    // ------------------------------------------------------------------

    pub async fn record_published_post(&self, record: &PublishedPostRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO published_posts (post_id, user_id, account_id, platform, platform_post_id,
                                         media_kind, success, error_message, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.post_id)
        .bind(&record.user_id)
        .bind(&record.account_id)
        .bind(&record.platform)
        .bind(&record.platform_post_id)
        .bind(record.media_kind.as_str())
        .bind(record.success)
        .bind(&record.error_message)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_published_records(&self, post_id: &str) -> Result<Vec<PublishedPostRecord>> {
        let rows = sqlx::query("SELECT * FROM published_posts WHERE post_id = ? ORDER BY id ASC")
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| PublishedPostRecord {
                id: r.get("id"),
                post_id: r.get("post_id"),
                user_id: r.get("user_id"),
                account_id: r.get("account_id"),
                platform: r.get("platform"),
                platform_post_id: r.get("platform_post_id"),
                media_kind: MediaKind::parse_lenient(&r.get::<String, _>("media_kind")),
                success: r.get("success"),
                error_message: r.get("error_message"),
                recorded_at: r.get("recorded_at"),
            })
            .collect())
    }

    pub async fn create_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, message, is_read, sent_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.sent_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT * FROM notifications WHERE user_id = ? ORDER BY sent_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| Notification {
                id: r.get("id"),
                user_id: r.get("user_id"),
                kind: r.get("kind"),
                message: r.get("message"),
                is_read: r.get("is_read"),
                sent_at: r.get("sent_at"),
            })
            .collect())
    }

    pub async fn create_activity(&self, activity: &Activity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activities (id, user_id, kind, action, description, platform,
                                    content_kind, content_id, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.id)
        .bind(&activity.user_id)
        .bind(&activity.kind)
        .bind(&activity.action)
        .bind(&activity.description)
        .bind(&activity.platform)
        .bind(&activity.content_kind)
        .bind(&activity.content_id)
        .bind(activity.metadata.to_string())
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_activities(&self, user_id: &str) -> Result<Vec<Activity>> {
        let rows = sqlx::query(
            "SELECT * FROM activities WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|r| {
                Ok(Activity {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    kind: r.get("kind"),
                    action: r.get("action"),
                    description: r.get("description"),
                    platform: r.get("platform"),
                    content_kind: r.get("content_kind"),
                    content_id: r.get("content_id"),
                    metadata: from_json("activities.metadata", &r.get::<String, _>("metadata"))?,
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        DbError::Corrupt {
            column: "json".to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        DbError::Corrupt {
            column: column.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn post_from_row(r: &SqliteRow) -> Result<Post> {
    let status: String = r.get("status");
    let scheduled_at: Option<String> = r.get("scheduled_at");

    Ok(Post {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platforms: from_json("posts.platforms", &r.get::<String, _>("platforms"))?,
        media_url: r.get("media_url"),
        media_kind: MediaKind::parse_lenient(&r.get::<String, _>("media_kind")),
        caption: r.get("caption"),
        status: status.parse()?,
        scheduled_at: scheduled_at.and_then(|s| parse_scheduled_at(&s).ok()),
        social_post_ids: from_json("posts.social_post_ids", &r.get::<String, _>("social_post_ids"))?,
        error_message: r.get("error_message"),
        created_at: r.get("created_at"),
        publishing_started_at: r.get("publishing_started_at"),
        published_at: r.get("published_at"),
        updated_at: r.get("updated_at"),
    })
}

fn setting_from_row(r: &SqliteRow) -> Result<AutoresponderSetting> {
    Ok(AutoresponderSetting {
        post_id: r.get("post_id"),
        user_id: r.get("user_id"),
        enabled: r.get("enabled"),
        tone: Tone::parse_lenient(&r.get::<String, _>("tone")),
        custom_instructions: r.get("custom_instructions"),
        response_delay_seconds: r.get("response_delay_seconds"),
        social_post_ids: from_json(
            "autoresponder_settings.social_post_ids",
            &r.get::<String, _>("social_post_ids"),
        )?,
        post_caption: r.get("post_caption"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn thread_from_row(r: &SqliteRow) -> CommentThread {
    CommentThread {
        comment_id: r.get("comment_id"),
        replied: r.get("replied"),
        reserved_at: r.get("reserved_at"),
        post_id: r.get("post_id"),
        social_post_id: r.get("social_post_id"),
        platform: r.get("platform"),
        comment_text: r.get("comment_text"),
        commenter_id: r.get("commenter_id"),
        commenter_name: r.get("commenter_name"),
        response_text: r.get("response_text"),
        response_id: r.get("response_id"),
        responder_id: r.get("responder_id"),
        tone: r
            .get::<Option<String>, _>("tone")
            .map(|t| Tone::parse_lenient(&t)),
        completed_at: r.get("completed_at"),
    }
}

fn account_from_row(r: &SqliteRow) -> SocialAccount {
    SocialAccount {
        account_id: r.get("account_id"),
        user_id: r.get("user_id"),
        platform: r.get("platform"),
        display_name: r.get("display_name"),
        access_token: r
            .get::<Option<String>, _>("access_token")
            .map(SecretString::from),
        page_access_token: r
            .get::<Option<String>, _>("page_access_token")
            .map(SecretString::from),
        page_id: r.get("page_id"),
        instagram_account_id: r.get("instagram_account_id"),
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
    }
}
