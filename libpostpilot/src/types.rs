//! Core types for Postpilot

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PostpilotError;

/// Remote post ids keyed by platform name
pub type SocialPostIds = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    /// Requested platforms, in the order they are attempted
    pub platforms: Vec<String>,
    pub media_url: Option<String>,
    pub media_kind: MediaKind,
    pub caption: String,
    pub status: PostStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub social_post_ids: SocialPostIds,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub publishing_started_at: Option<i64>,
    pub published_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Post {
    pub fn new(user_id: &str, platforms: Vec<String>, media_url: &str, caption: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            platforms,
            media_url: Some(media_url.to_string()),
            media_kind: MediaKind::Image,
            caption: caption.to_string(),
            status: PostStatus::Draft,
            scheduled_at: None,
            social_post_ids: SocialPostIds::new(),
            error_message: None,
            created_at: Utc::now().timestamp(),
            publishing_started_at: None,
            published_at: None,
            updated_at: None,
        }
    }

    /// Mark the post as scheduled for the given instant
    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.status = PostStatus::Scheduled;
        self.scheduled_at = Some(at);
        self
    }

    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = kind;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
    PartiallyPublished,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::PartiallyPublished => "partially_published",
            PostStatus::Failed => "failed",
        }
    }

    /// Whether the post reached at least one platform
    pub fn is_live(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::PartiallyPublished)
    }
}

impl FromStr for PostStatus {
    type Err = PostpilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "partially_published" => Ok(PostStatus::PartiallyPublished),
            "failed" => Ok(PostStatus::Failed),
            other => Err(PostpilotError::InvalidInput(format!(
                "Unknown post status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of media attached to a post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
    Reel,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Reel => "reel",
        }
    }

    /// Lenient parse; anything unknown is treated as an image
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "video" => MediaKind::Video,
            "reel" => MediaKind::Reel,
            _ => MediaKind::Image,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platforms the adapters know how to talk to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Facebook,
    Instagram,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Facebook => "facebook",
            PlatformKind::Instagram => "instagram",
        }
    }
}

impl FromStr for PlatformKind {
    type Err = PostpilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(PlatformKind::Facebook),
            "instagram" => Ok(PlatformKind::Instagram),
            other => Err(crate::error::PlatformError::Unsupported(other.to_string()).into()),
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Voice the auto-responder replies in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Friendly,
    Professional,
    Casual,
    Enthusiastic,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Friendly => "friendly",
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Enthusiastic => "enthusiastic",
        }
    }

    /// Description fed to the generation prompt
    pub fn description(&self) -> &'static str {
        match self {
            Tone::Friendly => "warm, approachable, and personable with emojis",
            Tone::Professional => "formal, business-like, and polished",
            Tone::Casual => "relaxed, informal, and conversational",
            Tone::Enthusiastic => "excited, energetic, and positive with emojis",
        }
    }

    /// Unknown tones fall back to friendly
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "professional" => Tone::Professional,
            "casual" => Tone::Casual,
            "enthusiastic" => Tone::Enthusiastic,
            _ => Tone::Friendly,
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-post auto-responder configuration, keyed by post id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoresponderSetting {
    pub post_id: String,
    pub user_id: String,
    pub enabled: bool,
    pub tone: Tone,
    pub custom_instructions: Option<String>,
    /// Informational only; the poll cadence decides when replies go out
    pub response_delay_seconds: u32,
    pub social_post_ids: SocialPostIds,
    pub post_caption: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl AutoresponderSetting {
    pub fn new(post_id: &str, user_id: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            enabled: true,
            tone: Tone::Friendly,
            custom_instructions: None,
            response_delay_seconds: 30,
            social_post_ids: SocialPostIds::new(),
            post_caption: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Reservation record for one remote comment
///
/// Existence with `replied == false` means some process owns the comment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentThread {
    pub comment_id: String,
    pub replied: bool,
    pub reserved_at: Option<i64>,
    pub post_id: Option<String>,
    pub social_post_id: Option<String>,
    pub platform: Option<String>,
    pub comment_text: Option<String>,
    pub commenter_id: Option<String>,
    pub commenter_name: Option<String>,
    pub response_text: Option<String>,
    pub response_id: Option<String>,
    pub responder_id: Option<String>,
    pub tone: Option<Tone>,
    pub completed_at: Option<i64>,
}

/// Everything recorded when a reservation is completed
#[derive(Debug, Clone)]
pub struct CompletedReply {
    pub comment_id: String,
    pub post_id: String,
    pub social_post_id: String,
    pub platform: String,
    pub comment_text: String,
    pub commenter_id: Option<String>,
    pub commenter_name: Option<String>,
    pub response_text: String,
    pub response_id: Option<String>,
    pub responder_id: String,
    pub tone: Tone,
}

/// A comment as listed by a platform adapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
}

/// A linked social account, owned by the account-linking flow
#[derive(Debug)]
pub struct SocialAccount {
    pub account_id: String,
    pub user_id: String,
    pub platform: String,
    pub display_name: Option<String>,
    pub access_token: Option<SecretString>,
    pub page_access_token: Option<SecretString>,
    pub page_id: Option<String>,
    pub instagram_account_id: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
}

impl SocialAccount {
    pub fn new(user_id: &str, platform: &str) -> Self {
        Self {
            account_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            platform: platform.to_string(),
            display_name: None,
            access_token: None,
            page_access_token: None,
            page_id: None,
            instagram_account_id: None,
            is_active: true,
            created_at: Utc::now().timestamp(),
        }
    }

    /// Page-level token when present, otherwise the account-level token
    pub fn access_token(&self) -> Option<&str> {
        [&self.page_access_token, &self.access_token]
            .into_iter()
            .flatten()
            .map(|t| t.expose_secret())
            .find(|t| !t.is_empty())
    }
}

/// Audit row for a single platform publish attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedPostRecord {
    pub id: Option<i64>,
    pub post_id: String,
    pub user_id: String,
    pub account_id: Option<String>,
    pub platform: String,
    pub platform_post_id: Option<String>,
    pub media_kind: MediaKind,
    pub success: bool,
    pub error_message: Option<String>,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub sent_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub action: String,
    pub description: String,
    pub platform: Option<String>,
    pub content_kind: Option<String>,
    pub content_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_new_is_draft_with_uuid() {
        let post = Post::new("user-1", vec!["facebook".to_string()], "https://cdn/x.jpg", "hi");

        assert!(Uuid::parse_str(&post.id).is_ok(), "Post ID should be a valid UUID");
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.media_kind, MediaKind::Image);
        assert!(post.social_post_ids.is_empty());
        assert!(post.scheduled_at.is_none());
    }

    #[test]
    fn test_scheduled_for_sets_status_and_time() {
        let at = Utc::now();
        let post = Post::new("u", vec![], "m", "c").scheduled_for(at);
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.scheduled_at, Some(at));
    }

    #[test]
    fn test_post_status_string_forms() {
        for status in [
            PostStatus::Draft,
            PostStatus::Scheduled,
            PostStatus::Publishing,
            PostStatus::Published,
            PostStatus::PartiallyPublished,
            PostStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PostStatus>().unwrap(), status);
        }
        assert_eq!(PostStatus::PartiallyPublished.to_string(), "partially_published");
        assert!("posted".parse::<PostStatus>().is_err());
    }

    #[test]
    fn test_post_status_is_live() {
        assert!(PostStatus::Published.is_live());
        assert!(PostStatus::PartiallyPublished.is_live());
        assert!(!PostStatus::Failed.is_live());
        assert!(!PostStatus::Publishing.is_live());
    }

    #[test]
    fn test_platform_kind_parse_is_case_insensitive() {
        assert_eq!("Facebook".parse::<PlatformKind>().unwrap(), PlatformKind::Facebook);
        assert_eq!("INSTAGRAM".parse::<PlatformKind>().unwrap(), PlatformKind::Instagram);

        let err = "tiktok".parse::<PlatformKind>().unwrap_err();
        assert_eq!(err.to_string(), "Platform error: Unsupported platform: tiktok");
    }

    #[test]
    fn test_tone_descriptions_and_fallback() {
        assert_eq!(
            Tone::Friendly.description(),
            "warm, approachable, and personable with emojis"
        );
        assert_eq!(Tone::parse_lenient("Professional"), Tone::Professional);
        assert_eq!(Tone::parse_lenient("sarcastic"), Tone::Friendly);
    }

    #[test]
    fn test_media_kind_lenient_parse() {
        assert_eq!(MediaKind::parse_lenient("video"), MediaKind::Video);
        assert_eq!(MediaKind::parse_lenient("REEL"), MediaKind::Reel);
        assert_eq!(MediaKind::parse_lenient("carousel"), MediaKind::Image);
    }

    #[test]
    fn test_access_token_prefers_page_token() {
        let mut account = SocialAccount::new("u", "facebook");
        assert_eq!(account.access_token(), None);

        account.access_token = Some(SecretString::from("user-token".to_string()));
        assert_eq!(account.access_token(), Some("user-token"));

        account.page_access_token = Some(SecretString::from("page-token".to_string()));
        assert_eq!(account.access_token(), Some("page-token"));
    }

    #[test]
    fn test_social_account_debug_redacts_tokens() {
        let mut account = SocialAccount::new("u", "facebook");
        account.page_access_token = Some(SecretString::from("very-secret".to_string()));
        let debug = format!("{:?}", account);
        assert!(!debug.contains("very-secret"));
    }
}
