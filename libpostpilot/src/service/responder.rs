//! Comment reservation and reply engine
//!
//! For every enabled auto-responder, list the comments under each published
//! copy of the post and answer the ones nobody has answered yet. A comment
//! is only answered by the process that created its reservation record, so
//! concurrent schedulers never double-reply.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::accounts::{resolve, AccountDirectory};
use crate::db::Database;
use crate::generation::TextGenerator;
use crate::platforms::{AdapterFactory, Platform};
use crate::service::events::{Event, EventBus};
use crate::types::{AutoresponderSetting, Comment, CompletedReply, PlatformKind, SocialAccount, Tone};

/// Posted when generation fails
pub const FALLBACK_REPLY: &str = "Thanks for your interaction!";

/// Build the generation prompt for one comment
pub fn build_prompt(
    comment_text: &str,
    tone: Tone,
    post_caption: Option<&str>,
    custom_instructions: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Act as an AI comment responder.\nTone: {}\nUser comment: \"{}\"\n",
        tone.description(),
        comment_text
    );

    if let Some(caption) = post_caption.filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("Post context: \"{}\"\n", caption));
    }
    if let Some(instructions) = custom_instructions.filter(|i| !i.is_empty()) {
        prompt.push_str(&format!("Instructions: {}\n", instructions));
    }

    prompt.push_str(
        "\nGenerate a concise (under 100 words), natural response. Output ONLY the response text.",
    );
    prompt
}

/// Trim and strip one layer of surrounding double quotes
pub fn clean_reply(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Counters for one pass of the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyStats {
    pub comments_seen: usize,
    pub replies_posted: usize,
    /// Already answered, in flight here, or reserved elsewhere
    pub skipped: usize,
    pub failures: usize,
}

impl ReplyStats {
    pub fn merge(&mut self, other: ReplyStats) {
        self.comments_seen += other.comments_seen;
        self.replies_posted += other.replies_posted;
        self.skipped += other.skipped;
        self.failures += other.failures;
    }
}

type ProcessingSet = Arc<Mutex<HashSet<String>>>;

/// Keeps a comment id in the processing set for as long as it lives
struct ProcessingGuard {
    set: ProcessingSet,
    comment_id: String,
}

impl ProcessingGuard {
    fn enter(set: &ProcessingSet, comment_id: &str) -> Self {
        if let Ok(mut ids) = set.lock() {
            ids.insert(comment_id.to_string());
        }
        Self {
            set: Arc::clone(set),
            comment_id: comment_id.to_string(),
        }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if let Ok(mut ids) = self.set.lock() {
            ids.remove(&self.comment_id);
        }
    }
}

enum CommentOutcome {
    Replied,
    Skipped,
    Failed,
}

#[derive(Clone)]
pub struct ReplyEngine {
    db: Database,
    accounts: AccountDirectory,
    adapters: Arc<dyn AdapterFactory>,
    generator: Arc<dyn TextGenerator>,
    events: EventBus,
    processing: ProcessingSet,
}

impl ReplyEngine {
    pub fn new(
        db: Database,
        adapters: Arc<dyn AdapterFactory>,
        generator: Arc<dyn TextGenerator>,
        events: EventBus,
    ) -> Self {
        Self {
            accounts: AccountDirectory::new(db.clone()),
            db,
            adapters,
            generator,
            events,
            processing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of comments currently being answered by this process
    pub fn in_flight(&self) -> usize {
        self.processing.lock().map(|ids| ids.len()).unwrap_or(0)
    }

    fn is_processing(&self, comment_id: &str) -> bool {
        self.processing
            .lock()
            .map(|ids| ids.contains(comment_id))
            .unwrap_or(false)
    }

    /// Answer new comments on every published copy of one post
    pub async fn process_setting(&self, setting: &AutoresponderSetting) -> ReplyStats {
        let mut stats = ReplyStats::default();

        if setting.social_post_ids.is_empty() {
            debug!(post_id = %setting.post_id, "Auto-responder has no published copies yet");
            return stats;
        }

        let accounts = match self.accounts.active_accounts(&setting.user_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(post_id = %setting.post_id, "Failed to load accounts: {}", e);
                stats.failures += 1;
                return stats;
            }
        };

        for (platform, remote_post_id) in &setting.social_post_ids {
            let platform_stats = self
                .process_platform(setting, &accounts, platform, remote_post_id)
                .await;
            stats.merge(platform_stats);
        }

        stats
    }

    async fn process_platform(
        &self,
        setting: &AutoresponderSetting,
        accounts: &[SocialAccount],
        platform: &str,
        remote_post_id: &str,
    ) -> ReplyStats {
        let mut stats = ReplyStats::default();

        let Some(account) = resolve(accounts, platform) else {
            debug!(post_id = %setting.post_id, platform, "No account for platform, skipping");
            return stats;
        };

        let Ok(kind) = platform.parse::<PlatformKind>() else {
            debug!(post_id = %setting.post_id, platform, "Unsupported platform, skipping");
            return stats;
        };

        let adapter = match self.adapters.build(kind, account) {
            Ok(adapter) => adapter,
            Err(e) => {
                debug!(post_id = %setting.post_id, platform, "Cannot build adapter: {}", e);
                return stats;
            }
        };

        let comments = match adapter.list_comments(remote_post_id).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(
                    post_id = %setting.post_id,
                    platform,
                    remote_post_id,
                    "Failed to list comments: {}", e
                );
                stats.failures += 1;
                return stats;
            }
        };

        for comment in &comments {
            if comment.id.is_empty() {
                continue;
            }
            stats.comments_seen += 1;

            match self
                .process_comment(setting, adapter.as_ref(), platform, remote_post_id, comment)
                .await
            {
                CommentOutcome::Replied => stats.replies_posted += 1,
                CommentOutcome::Skipped => stats.skipped += 1,
                CommentOutcome::Failed => stats.failures += 1,
            }
        }

        stats
    }

    async fn process_comment(
        &self,
        setting: &AutoresponderSetting,
        adapter: &dyn Platform,
        platform: &str,
        remote_post_id: &str,
        comment: &Comment,
    ) -> CommentOutcome {
        let comment_id = comment.id.as_str();

        match self.db.has_replied(comment_id).await {
            Ok(true) => return CommentOutcome::Skipped,
            Ok(false) => {}
            Err(e) => {
                warn!(comment_id, "Failed to check reply state: {}", e);
                return CommentOutcome::Failed;
            }
        }

        if self.is_processing(comment_id) {
            return CommentOutcome::Skipped;
        }

        match self.db.reserve_comment(comment_id, Utc::now().timestamp()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(comment_id, "Comment already reserved");
                return CommentOutcome::Skipped;
            }
            Err(e) => {
                warn!(comment_id, "Failed to reserve comment: {}", e);
                return CommentOutcome::Failed;
            }
        }

        let _guard = ProcessingGuard::enter(&self.processing, comment_id);

        let comment_text = comment.text.trim();
        if comment_text.is_empty() {
            debug!(comment_id, "Comment has no text, leaving reservation unanswered");
            return CommentOutcome::Skipped;
        }

        info!(
            comment_id,
            platform,
            commenter = comment.author_name.as_deref().unwrap_or("unknown"),
            "Found new comment"
        );

        let response_text = self.generate_reply(comment_text, setting).await;
        if response_text.is_empty() {
            warn!(comment_id, "Generated reply is empty, not posting");
            return CommentOutcome::Failed;
        }

        let response_id = match adapter.reply(comment_id, &response_text).await {
            Ok(id) => id,
            Err(e) => {
                error!(comment_id, platform, "Failed to post reply: {}", e);
                return CommentOutcome::Failed;
            }
        };

        let reply = CompletedReply {
            comment_id: comment_id.to_string(),
            post_id: setting.post_id.clone(),
            social_post_id: remote_post_id.to_string(),
            platform: platform.to_string(),
            comment_text: comment_text.to_string(),
            commenter_id: comment.author_id.clone(),
            commenter_name: comment.author_name.clone(),
            response_text,
            response_id: Some(response_id.clone()),
            responder_id: setting.user_id.clone(),
            tone: setting.tone,
        };

        if let Err(e) = self.db.complete_comment_thread(&reply, Utc::now().timestamp()).await {
            error!(comment_id, "Reply posted but not recorded: {}", e);
            return CommentOutcome::Failed;
        }

        info!(comment_id, platform, "Auto-responded to comment");
        self.events.emit(Event::CommentReplied {
            post_id: setting.post_id.clone(),
            comment_id: comment_id.to_string(),
            platform: platform.to_string(),
            response_id: Some(response_id),
        });

        CommentOutcome::Replied
    }

    async fn generate_reply(&self, comment_text: &str, setting: &AutoresponderSetting) -> String {
        let prompt = build_prompt(
            comment_text,
            setting.tone,
            setting.post_caption.as_deref(),
            setting.custom_instructions.as_deref(),
        );

        match self.generator.generate_text(&prompt).await {
            Ok(text) => clean_reply(&text),
            Err(e) => {
                warn!(post_id = %setting.post_id, "Reply generation failed, using fallback: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
