//! In-memory storage adapter.

use super::{check_consistent, StorageAdapter};
use crate::error::{ReactionError, Result};
use crate::types::{Channel, ReactionState, SubjectId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Keeps every subject's channels in a map.
///
/// Saves can be made to fail on demand with [`MemoryStorage::fail_next_saves`],
/// which is how the tracker's rollback path is exercised.
#[derive(Default)]
pub struct MemoryStorage {
    /// Channel states by subject.
    subjects: RwLock<HashMap<SubjectId, HashMap<Channel, ReactionState>>>,

    /// Number of upcoming saves to reject.
    failing_saves: AtomicUsize,

    /// Successful saves so far.
    saves: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage with the given subjects already registered.
    pub fn with_subjects<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubjectId>,
    {
        let storage = Self::new();
        {
            let mut map = storage.subjects.write();
            for subject in subjects {
                map.entry(subject.into()).or_default();
            }
        }
        storage
    }

    /// Make the next `n` saves fail with a persistence error.
    pub fn fail_next_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Number of saves that reached the map.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of registered subjects.
    pub fn subject_count(&self) -> usize {
        self.subjects.read().len()
    }

    fn take_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl StorageAdapter for MemoryStorage {
    fn load(&self, subject: &SubjectId, channel: &Channel) -> Result<ReactionState> {
        let subjects = self.subjects.read();
        let channels = subjects
            .get(subject)
            .ok_or_else(|| ReactionError::NotFound(subject.clone()))?;

        Ok(channels.get(channel).cloned().unwrap_or_default())
    }

    fn save(&self, subject: &SubjectId, channel: &Channel, state: &ReactionState) -> Result<()> {
        check_consistent(subject, channel, state)?;

        if self.take_failure() {
            return Err(ReactionError::Persistence(format!(
                "injected failure saving {}/{}",
                subject, channel
            )));
        }

        let mut subjects = self.subjects.write();
        let channels = subjects
            .get_mut(subject)
            .ok_or_else(|| ReactionError::NotFound(subject.clone()))?;

        channels.insert(channel.clone(), state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn register_subject(&self, subject: &SubjectId) -> Result<()> {
        self.subjects.write().entry(subject.clone()).or_default();
        Ok(())
    }

    fn contains_subject(&self, subject: &SubjectId) -> Result<bool> {
        Ok(self.subjects.read().contains_key(subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::apply_action;
    use crate::types::{Action, ReactorId};

    fn liked_by(id: &str) -> ReactionState {
        apply_action(&ReactionState::default(), Action::Add, &ReactorId::new(id)).unwrap()
    }

    #[test]
    fn test_unknown_subject() {
        let storage = MemoryStorage::new();
        let subject = SubjectId::new("missing");

        assert!(matches!(
            storage.load(&subject, &Channel::LIKE),
            Err(ReactionError::NotFound(_))
        ));
        assert!(matches!(
            storage.save(&subject, &Channel::LIKE, &liked_by("u1")),
            Err(ReactionError::NotFound(_))
        ));
    }

    #[test]
    fn test_registered_subject_starts_empty() {
        let storage = MemoryStorage::with_subjects(["p1"]);
        let state = storage.load(&"p1".into(), &Channel::VOTE).unwrap();

        assert!(state.is_empty());
        assert_eq!(state.count(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::with_subjects(["p1"]);
        let subject = SubjectId::new("p1");

        storage.save(&subject, &Channel::LIKE, &liked_by("u1")).unwrap();

        let state = storage.load(&subject, &Channel::LIKE).unwrap();
        assert_eq!(state, liked_by("u1"));
        assert!(storage.load(&subject, &Channel::DISLIKE).unwrap().is_empty());
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let storage = MemoryStorage::with_subjects(["p1"]);
        let subject = SubjectId::new("p1");

        storage.fail_next_saves(1);
        let result = storage.save(&subject, &Channel::LIKE, &liked_by("u1"));
        assert!(matches!(result, Err(ReactionError::Persistence(_))));
        assert!(storage.load(&subject, &Channel::LIKE).unwrap().is_empty());

        // Only one failure was armed
        storage.save(&subject, &Channel::LIKE, &liked_by("u1")).unwrap();
        assert_eq!(storage.load(&subject, &Channel::LIKE).unwrap().count(), 1);
    }

    #[test]
    fn test_rejects_inconsistent_state() {
        let storage = MemoryStorage::with_subjects(["p1"]);
        let bad = ReactionState::from_raw(vec![ReactorId::new("u1")], 5, 1);

        let result = storage.save(&"p1".into(), &Channel::LIKE, &bad);
        assert!(matches!(result, Err(ReactionError::Persistence(_))));
    }
}
