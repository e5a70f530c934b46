//! Scheduling loop
//!
//! One cooperative loop per process. Each tick publishes every due post this
//! process manages to claim, then runs the auto-responder over every enabled
//! setting. Stopping abandons the sleep between ticks but lets a running tick
//! finish.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::service::events::{Event, EventReceiver};
use crate::service::{try_claim, PostpilotService};
use crate::types::PostStatus;

/// Counts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub due: usize,
    pub claimed: usize,
    pub published: usize,
    pub partially_published: usize,
    pub failed: usize,
    pub settings_scanned: usize,
    pub replies_posted: usize,
}

impl TickReport {
    fn count(&mut self, status: PostStatus) {
        match status {
            PostStatus::Published => self.published += 1,
            PostStatus::PartiallyPublished => self.partially_published += 1,
            _ => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_seconds: u64,
}

pub struct Scheduler {
    service: PostpilotService,
    interval: Duration,
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(service: PostpilotService, interval: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            service,
            interval,
            running: AtomicBool::new(false),
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &PostpilotService {
        &self.service
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            interval_seconds: self.interval.as_secs(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.service.subscribe()
    }

    /// Spawn the loop; a second call while running only logs a warning
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        self.stop_tx.send_replace(false);
        let mut stop_rx = self.stop_tx.subscribe();
        let scheduler = Arc::clone(self);

        let handle = tokio::spawn(async move {
            info!(
                interval_seconds = scheduler.interval.as_secs(),
                "Scheduler started"
            );

            loop {
                if *stop_rx.borrow_and_update() {
                    break;
                }

                scheduler.tick().await;

                tokio::select! {
                    _ = tokio::time::sleep(scheduler.interval) => {}
                    _ = stop_rx.changed() => {}
                }
            }

            info!("Scheduler stopped");
        });

        *self.handle.lock().await = Some(handle);
    }

    /// Signal the loop and wait for it to end
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);

        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// Run one tick now through the same path the loop uses
    pub async fn trigger_once(&self) -> TickReport {
        self.tick().await
    }

    async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        self.publish_due_posts(&mut report).await;
        self.run_autoresponders(&mut report).await;

        debug!(?report, "Tick completed");
        self.service.events().emit(Event::TickCompleted {
            due: report.due,
            claimed: report.claimed,
            replies_posted: report.replies_posted,
        });

        report
    }

    async fn publish_due_posts(&self, report: &mut TickReport) {
        let db = self.service.database();

        let due_posts = match db.get_due_posts(Utc::now()).await {
            Ok(posts) => posts,
            Err(e) => {
                error!("Failed to fetch due posts: {}", e);
                return;
            }
        };

        report.due = due_posts.len();
        if !due_posts.is_empty() {
            info!("Found {} post(s) due for publishing", due_posts.len());
        }

        for post in due_posts {
            if !try_claim(db, &post.id).await {
                continue;
            }
            report.claimed += 1;
            self.service.events().emit(Event::PostClaimed {
                post_id: post.id.clone(),
            });

            match self.service.publisher().publish(&post).await {
                Ok(published) => report.count(published.status),
                Err(e) => {
                    error!(post_id = %post.id, "Error publishing post: {}", e);
                    if let Err(e) = db
                        .mark_post_failed(&post.id, &e.to_string(), Utc::now().timestamp())
                        .await
                    {
                        error!(post_id = %post.id, "Failed to mark post failed: {}", e);
                    }
                    report.failed += 1;
                }
            }
        }
    }

    async fn run_autoresponders(&self, report: &mut TickReport) {
        let settings = match self.service.database().get_enabled_autoresponders().await {
            Ok(settings) => settings,
            Err(e) => {
                error!("Failed to fetch auto-responder settings: {}", e);
                return;
            }
        };

        for setting in &settings {
            report.settings_scanned += 1;
            let stats = self.service.responder().process_setting(setting).await;
            report.replies_posted += stats.replies_posted;
        }
    }
}
