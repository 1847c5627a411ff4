//! # Reaction Tracker
//!
//! Likes, dislikes and votes on persisted subjects, with counts that always
//! match the identities behind them.
//!
//! ## Core Concepts
//!
//! - **Channels**: Independent kinds of reaction (`like`, `dislike`, `vote`, ...)
//! - **Reaction state**: Reactor identities plus the count derived from them
//! - **Storage adapters**: Where states are persisted, injected into the tracker
//! - **Subscriptions**: Live feed of committed changes
//!
//! ## Example
//!
//! ```ignore
//! use reaction_tracker::{Channel, MemoryStorage, ReactionTracker, TrackerConfig};
//!
//! let storage = MemoryStorage::with_subjects(["post-1"]);
//! let tracker = ReactionTracker::new(storage, TrackerConfig::default());
//!
//! // Generic operations
//! let state = tracker.add(&"post-1".into(), &Channel::LIKE, "user-7")?;
//! assert_eq!(state.count(), 1);
//!
//! // Likeable methods
//! let post = tracker.subject("post-1");
//! post.vote(&current_user)?;
//! assert!(post.voted(&current_user)?);
//! ```

pub mod error;
pub mod likeable;
pub mod state;
pub mod storage;
pub mod subscriptions;
pub mod tracker;
pub mod types;

// Re-exports
pub use error::{ReactionError, Result};
pub use likeable::Likeable;
pub use state::{apply_action, DocumentFields};
pub use storage::{
    CompactionStats, FileStorage, FileStorageConfig, LogEntry, MemoryStorage, ReactionLog,
    StorageAdapter,
};
pub use subscriptions::{
    DropReason, ReactionEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use tracker::{ReactionTracker, TrackerConfig};
pub use types::*;
