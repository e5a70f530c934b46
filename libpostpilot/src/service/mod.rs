//! Service layer for Postpilot
//!
//! The engines that run inside a scheduler tick, behind one facade so the
//! daemon, tests and embedding applications wire them the same way.
//!
//! - `claim`: exclusive ownership of a due post
//! - `PublishEngine`: fan-out to every requested platform and aggregation
//! - `ReplyEngine`: comment reservation and auto-replies
//! - `Sinks`: notifications, activities and the publish audit trail
//! - `EventBus`: progress event distribution
//!
//! # Example
//!
//! ```no_run
//! use libpostpilot::service::PostpilotService;
//! use libpostpilot::Config;
//!
//! # async fn example() -> libpostpilot::Result<()> {
//! let config = Config::load()?;
//! let service = PostpilotService::from_config(&config).await?;
//!
//! for post in service.database().get_due_posts(chrono::Utc::now()).await? {
//!     println!("due: {}", post.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod claim;
pub mod events;
pub mod publish;
pub mod responder;
pub mod sinks;

pub use claim::try_claim;
pub use events::{Event, EventBus, EventReceiver};
pub use publish::{PlatformOutcome, PublishEngine, PublishReport};
pub use responder::{ReplyEngine, ReplyStats};

use std::sync::Arc;

use crate::generation::{OpenAiGenerator, TextGenerator};
use crate::platforms::{AdapterFactory, GraphAdapterFactory};
use crate::{Config, Database, Result};

/// Shared handles for both tick phases
///
/// Cloning is cheap: every engine shares the same database pool, adapter
/// factory and event bus.
#[derive(Clone)]
pub struct PostpilotService {
    db: Database,
    publish: PublishEngine,
    replies: ReplyEngine,
    event_bus: EventBus,
}

impl PostpilotService {
    /// Wire the engines around an open database
    pub fn new(
        db: Database,
        adapters: Arc<dyn AdapterFactory>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let event_bus = EventBus::default();
        let publish = PublishEngine::new(db.clone(), Arc::clone(&adapters), event_bus.clone());
        let replies = ReplyEngine::new(db.clone(), adapters, generator, event_bus.clone());

        Self {
            db,
            publish,
            replies,
            event_bus,
        }
    }

    /// Open the configured database and use the Graph API and OpenAI
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database cannot be opened or migrated
    /// - The HTTP client cannot be built
    /// - No generation API key is configured
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database.path).await?;
        let adapters = GraphAdapterFactory::new(&config.graph)?;
        let generator = OpenAiGenerator::from_config(&config.generation)?;

        Ok(Self::new(db, Arc::new(adapters), Arc::new(generator)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn publisher(&self) -> &PublishEngine {
        &self.publish
    }

    pub fn responder(&self) -> &ReplyEngine {
        &self.replies
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to service events
    ///
    /// Multiple subscribers are supported; each sees every event emitted
    /// after it subscribed.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }
}
