//! Platform abstraction and implementations
//!
//! Orchestration code only ever sees [`Platform`] trait objects handed out by
//! an [`AdapterFactory`], so the fan-out and reply engines stay
//! platform-agnostic.
//!
//! # Examples
//!
//! ```no_run
//! use libpostpilot::config::GraphConfig;
//! use libpostpilot::platforms::{AdapterFactory, GraphAdapterFactory, PublishRequest};
//! use libpostpilot::types::{MediaKind, PlatformKind, SocialAccount};
//!
//! # async fn example(account: &SocialAccount) -> Result<(), libpostpilot::error::PlatformError> {
//! let factory = GraphAdapterFactory::new(&GraphConfig::default())?;
//! let platform = factory.build(PlatformKind::Facebook, account)?;
//!
//! let remote_id = platform
//!     .publish(&PublishRequest {
//!         media_url: "https://cdn.example.com/photo.jpg",
//!         caption: "Hello from the scheduler",
//!         media_kind: MediaKind::Image,
//!     })
//!     .await?;
//! println!("Published: {}", remote_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::types::{Comment, MediaKind, PlatformKind, SocialAccount};

pub mod facebook;
pub mod graph;
pub mod instagram;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

pub use graph::{GraphAdapterFactory, GraphClient};

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// What to publish
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub media_url: &'a str,
    pub caption: &'a str,
    pub media_kind: MediaKind,
}

/// Operations the scheduler needs from a social platform
///
/// An adapter is bound to one linked account, so every call acts on behalf
/// of that account's page or business profile.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Lowercase platform identifier ("facebook", "instagram")
    fn name(&self) -> &str;

    /// Publish media with a caption and return the remote post id
    async fn publish(&self, request: &PublishRequest<'_>) -> PlatformResult<String>;

    async fn delete_post(&self, remote_id: &str) -> PlatformResult<()>;

    /// Comments currently visible under a remote post
    async fn list_comments(&self, remote_id: &str) -> PlatformResult<Vec<Comment>>;

    /// Reply to a comment and return the remote id of the reply
    async fn reply(&self, comment_id: &str, text: &str) -> PlatformResult<String>;
}

/// Builds a platform adapter for a linked account
///
/// Fails with `MissingLinkage` when the account lacks the ids or token the
/// platform needs.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, kind: PlatformKind, account: &SocialAccount) -> PlatformResult<Box<dyn Platform>>;
}
