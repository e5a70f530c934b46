//! Postpilot - deferred publishing and comment auto-replies
//!
//! This library provides the scheduler behind `pilot-send`: it publishes
//! posts to Facebook and Instagram once they fall due, and answers new
//! comments on published posts with generated replies. Every step is safe to
//! run from several processes against the same database.

pub mod accounts;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod logging;
pub mod platforms;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{PostpilotError, Result};
pub use scheduler::{Scheduler, SchedulerStatus, TickReport};
pub use service::PostpilotService;
pub use types::{AutoresponderSetting, CommentThread, Post, PostStatus, SocialAccount};
