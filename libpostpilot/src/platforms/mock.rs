//! Mock platform implementation for testing
//!
//! Configurable stand-in for the Graph adapters: it can succeed, fail on
//! publish or reply, serve a fixed set of comments, and records every call
//! so integration tests can assert on what the engines did without network
//! access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{AdapterFactory, Platform, PlatformResult, PublishRequest};
use crate::types::{Comment, PlatformKind, SocialAccount};

/// Configuration for mock platform behavior
///
/// Counters and logs are shared through `Arc`, so clones (and every adapter
/// a [`MockAdapterFactory`] builds from this config) report into the same place.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "facebook", "instagram")
    pub name: String,

    /// Error returned by `publish`, if any
    pub publish_error: Option<PlatformError>,

    /// Error returned by `reply`, if any
    pub reply_error: Option<PlatformError>,

    /// Error returned by `list_comments`, if any
    pub list_error: Option<PlatformError>,

    /// Error returned when the factory builds an adapter
    pub build_error: Option<PlatformError>,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Comments served per remote post id
    pub comments: Arc<Mutex<HashMap<String, Vec<Comment>>>>,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Number of times reply has been called
    pub reply_call_count: Arc<Mutex<usize>>,

    /// Captions that have been published (for verification)
    pub published_captions: Arc<Mutex<Vec<String>>>,

    /// (comment id, reply text) pairs that have been posted
    pub replies: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            publish_error: None,
            reply_error: None,
            list_error: None,
            build_error: None,
            delay: Duration::from_millis(0),
            comments: Arc::new(Mutex::new(HashMap::new())),
            publish_call_count: Arc::new(Mutex::new(0)),
            reply_call_count: Arc::new(Mutex::new(0)),
            published_captions: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Serve `comments` under the remote post `remote_id`
    pub fn add_comments(&self, remote_id: &str, comments: Vec<Comment>) {
        if let Ok(mut map) = self.comments.lock() {
            map.entry(remote_id.to_string()).or_default().extend(comments);
        }
    }

    pub fn publish_call_count(&self) -> usize {
        self.publish_call_count.lock().map(|c| *c).unwrap_or(0)
    }

    pub fn reply_call_count(&self) -> usize {
        self.reply_call_count.lock().map(|c| *c).unwrap_or(0)
    }

    pub fn published_captions(&self) -> Vec<String> {
        self.published_captions
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    /// Create a new mock platform with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock platform that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig::named(name))
    }

    /// Create a mock platform whose publish fails with a remote error
    pub fn publish_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            publish_error: Some(PlatformError::remote(error)),
            ..MockConfig::named(name)
        })
    }

    /// Create a mock platform with a delay
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::named(name)
        })
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

fn bump(counter: &Mutex<usize>) -> usize {
    match counter.lock() {
        Ok(mut count) => {
            *count += 1;
            *count
        }
        Err(_) => 0,
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> PlatformResult<String> {
        let call = bump(&self.config.publish_call_count);
        self.simulate_latency().await;

        if let Some(error) = &self.config.publish_error {
            return Err(error.clone());
        }

        if let Ok(mut captions) = self.config.published_captions.lock() {
            captions.push(request.caption.to_string());
        }

        Ok(format!("{}-post-{}", self.config.name, call))
    }

    async fn delete_post(&self, _remote_id: &str) -> PlatformResult<()> {
        self.simulate_latency().await;
        Ok(())
    }

    async fn list_comments(&self, remote_id: &str) -> PlatformResult<Vec<Comment>> {
        self.simulate_latency().await;

        if let Some(error) = &self.config.list_error {
            return Err(error.clone());
        }

        Ok(self
            .config
            .comments
            .lock()
            .ok()
            .and_then(|map| map.get(remote_id).cloned())
            .unwrap_or_default())
    }

    async fn reply(&self, comment_id: &str, text: &str) -> PlatformResult<String> {
        let call = bump(&self.config.reply_call_count);
        self.simulate_latency().await;

        if let Some(error) = &self.config.reply_error {
            return Err(error.clone());
        }

        if let Ok(mut replies) = self.config.replies.lock() {
            replies.push((comment_id.to_string(), text.to_string()));
        }

        Ok(format!("{}-reply-{}", self.config.name, call))
    }
}

/// Factory handing out mock adapters, one configuration per platform
///
/// Platforms without a registered configuration get a fresh succeeding one
/// named after the platform.
#[derive(Clone, Default)]
pub struct MockAdapterFactory {
    configs: HashMap<PlatformKind, MockConfig>,
    built: Arc<Mutex<Vec<(PlatformKind, String)>>>,
}

impl MockAdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, kind: PlatformKind, config: MockConfig) -> Self {
        self.configs.insert(kind, config);
        self
    }

    /// (platform, account id) for every adapter built so far
    pub fn built(&self) -> Vec<(PlatformKind, String)> {
        self.built.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl AdapterFactory for MockAdapterFactory {
    fn build(&self, kind: PlatformKind, account: &SocialAccount) -> PlatformResult<Box<dyn Platform>> {
        let config = self
            .configs
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| MockConfig::named(kind.as_str()));

        if let Some(error) = &config.build_error {
            return Err(error.clone());
        }

        if let Ok(mut built) = self.built.lock() {
            built.push((kind, account.account_id.clone()));
        }

        Ok(Box::new(MockPlatform::new(config)))
    }
}
