//! Like, dislike and vote methods bound to one subject.

use crate::error::Result;
use crate::state::DocumentFields;
use crate::storage::StorageAdapter;
use crate::tracker::ReactionTracker;
use crate::types::{Channel, ReactionState, Reactor, ReactorId, SubjectId};

/// A subject seen through its tracker.
///
/// Each method is the tracker operation on one of the three standard
/// channels. Every channel checks its own set: voting consults `voters`,
/// never `likers`.
pub struct Likeable<'t, S: StorageAdapter> {
    tracker: &'t ReactionTracker<S>,
    subject: SubjectId,
}

impl<'t, S: StorageAdapter> Likeable<'t, S> {
    pub(crate) fn new(tracker: &'t ReactionTracker<S>, subject: SubjectId) -> Self {
        Self { tracker, subject }
    }

    pub fn id(&self) -> &SubjectId {
        &self.subject
    }

    // --- Like ---

    pub fn like<'r>(&self, liker: impl Into<Reactor<'r>>) -> Result<ReactionState> {
        self.tracker.add(&self.subject, &Channel::LIKE, liker)
    }

    pub fn unlike<'r>(&self, liker: impl Into<Reactor<'r>>) -> Result<ReactionState> {
        self.tracker.remove(&self.subject, &Channel::LIKE, liker)
    }

    pub fn liked<'r>(&self, liker: impl Into<Reactor<'r>>) -> Result<bool> {
        self.tracker.has(&self.subject, &Channel::LIKE, liker)
    }

    pub fn likes(&self) -> Result<u64> {
        self.tracker.count(&self.subject, &Channel::LIKE)
    }

    pub fn likers(&self) -> Result<Vec<ReactorId>> {
        self.tracker.reactors(&self.subject, &Channel::LIKE)
    }

    // --- Dislike ---

    pub fn dislike<'r>(&self, disliker: impl Into<Reactor<'r>>) -> Result<ReactionState> {
        self.tracker.add(&self.subject, &Channel::DISLIKE, disliker)
    }

    pub fn undislike<'r>(&self, disliker: impl Into<Reactor<'r>>) -> Result<ReactionState> {
        self.tracker.remove(&self.subject, &Channel::DISLIKE, disliker)
    }

    pub fn disliked<'r>(&self, disliker: impl Into<Reactor<'r>>) -> Result<bool> {
        self.tracker.has(&self.subject, &Channel::DISLIKE, disliker)
    }

    pub fn dislikes(&self) -> Result<u64> {
        self.tracker.count(&self.subject, &Channel::DISLIKE)
    }

    pub fn dislikers(&self) -> Result<Vec<ReactorId>> {
        self.tracker.reactors(&self.subject, &Channel::DISLIKE)
    }

    // --- Vote ---

    pub fn vote<'r>(&self, voter: impl Into<Reactor<'r>>) -> Result<ReactionState> {
        self.tracker.add(&self.subject, &Channel::VOTE, voter)
    }

    pub fn unvote<'r>(&self, voter: impl Into<Reactor<'r>>) -> Result<ReactionState> {
        self.tracker.remove(&self.subject, &Channel::VOTE, voter)
    }

    pub fn voted<'r>(&self, voter: impl Into<Reactor<'r>>) -> Result<bool> {
        self.tracker.has(&self.subject, &Channel::VOTE, voter)
    }

    pub fn votes(&self) -> Result<u64> {
        self.tracker.count(&self.subject, &Channel::VOTE)
    }

    pub fn voters(&self) -> Result<Vec<ReactorId>> {
        self.tracker.reactors(&self.subject, &Channel::VOTE)
    }

    /// Count and identity fields of every configured channel, shaped for
    /// storage on the subject's document.
    pub fn fields(&self) -> Result<DocumentFields> {
        let mut fields = DocumentFields::new();
        for channel in self.tracker.channels() {
            let state = self.tracker.state(&self.subject, channel)?;
            fields.merge(channel, &state);
        }
        Ok(fields)
    }
}
