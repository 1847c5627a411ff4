//! Persistence of reaction states.
//!
//! The tracker never writes anywhere itself; every committed state goes
//! through a [`StorageAdapter`]. Two adapters ship with the crate:
//!
//! - [`MemoryStorage`]: in-process maps, for tests and for embedders that
//!   persist subjects elsewhere
//! - [`FileStorage`]: a checksummed append-only log on disk
//!
//! # Example
//!
//! ```ignore
//! let storage = FileStorage::open_or_create(FileStorageConfig {
//!     path: "./reactions".into(),
//!     ..Default::default()
//! })?;
//!
//! storage.register_subject(&SubjectId::new("post-1"))?;
//! let tracker = ReactionTracker::new(storage, TrackerConfig::default());
//! ```

mod file;
mod log;
mod memory;

use crate::error::Result;
use crate::types::{Channel, ReactionState, SubjectId};
use std::sync::Arc;

pub use file::{FileStorage, FileStorageConfig};
pub use log::{CompactionStats, LogEntry, ReactionLog, MAX_ENTRY_LEN};
pub use memory::MemoryStorage;

/// Where reaction states live between calls.
///
/// Implementations must write a state's identities and count together:
/// after a successful `save` a later `load` returns exactly that state, and
/// after a failed `save` it returns the previous one.
pub trait StorageAdapter: Send + Sync {
    /// Load the state of one channel on a subject.
    ///
    /// Fails with `NotFound` if the subject is unknown. A known subject
    /// that never stored this channel yields an empty state.
    fn load(&self, subject: &SubjectId, channel: &Channel) -> Result<ReactionState>;

    /// Durably store the state of one channel on a subject.
    ///
    /// Fails with `Persistence` if the write could be partial, and with
    /// `NotFound` if the subject is unknown.
    fn save(&self, subject: &SubjectId, channel: &Channel, state: &ReactionState) -> Result<()>;

    /// Declare a subject so that its channels can be loaded. Idempotent.
    fn register_subject(&self, subject: &SubjectId) -> Result<()>;

    /// Whether the subject has been registered.
    fn contains_subject(&self, subject: &SubjectId) -> Result<bool>;
}

impl<S: StorageAdapter + ?Sized> StorageAdapter for Arc<S> {
    fn load(&self, subject: &SubjectId, channel: &Channel) -> Result<ReactionState> {
        (**self).load(subject, channel)
    }

    fn save(&self, subject: &SubjectId, channel: &Channel, state: &ReactionState) -> Result<()> {
        (**self).save(subject, channel, state)
    }

    fn register_subject(&self, subject: &SubjectId) -> Result<()> {
        (**self).register_subject(subject)
    }

    fn contains_subject(&self, subject: &SubjectId) -> Result<bool> {
        (**self).contains_subject(subject)
    }
}

/// Reject states whose count drifted from their identities.
pub(crate) fn check_consistent(
    subject: &SubjectId,
    channel: &Channel,
    state: &ReactionState,
) -> Result<()> {
    if state.is_consistent() {
        Ok(())
    } else {
        Err(crate::ReactionError::Persistence(format!(
            "refusing to store inconsistent state for {}/{} (count {}, {} reactors)",
            subject,
            channel,
            state.count(),
            state.reactor_ids().len()
        )))
    }
}
