//! The reaction tracker: serialized add/remove with derived counts.

use crate::error::{ReactionError, Result};
use crate::likeable::Likeable;
use crate::state::apply_action;
use crate::storage::StorageAdapter;
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{Action, Channel, ReactionKey, ReactionState, Reactor, ReactorId, SubjectId};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tracker configuration.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Channels this tracker accepts. Fixed for the tracker's lifetime.
    pub channels: Vec<Channel>,

    /// How long a mutation waits for its (subject, channel) lock.
    pub lock_timeout: Duration,

    /// Number of channel states kept in memory.
    pub cache_size: usize,

    /// Idle per-key locks are pruned once the table reaches this size.
    pub lock_table_prune_at: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            channels: vec![Channel::LIKE, Channel::DISLIKE, Channel::VOTE],
            lock_timeout: Duration::from_secs(5),
            cache_size: 1024,
            lock_table_prune_at: 4096,
        }
    }
}

impl TrackerConfig {
    /// Configuration accepting only the given channels.
    pub fn with_channels(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            channels: channels.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// Tracks reactions on subjects, one independent set per channel.
///
/// Mutations on the same (subject, channel) pair are serialized: the
/// read-modify-write of identities and count, the save, and the cache
/// update all happen under that pair's lock. Pairs never wait on each
/// other. The tracker is `Send + Sync`; share it through an `Arc`.
///
/// A storage adapter should be driven by a single tracker, since the
/// tracker caches the states it has committed.
pub struct ReactionTracker<S: StorageAdapter> {
    storage: S,

    config: TrackerConfig,

    /// One lock per (subject, channel) pair.
    locks: Mutex<HashMap<ReactionKey, Arc<Mutex<()>>>>,

    /// Committed states. Only written while holding the pair's lock.
    cache: Mutex<LruCache<ReactionKey, ReactionState>>,

    subscriptions: SubscriptionManager,
}

impl<S: StorageAdapter> ReactionTracker<S> {
    pub fn new(storage: S, config: TrackerConfig) -> Self {
        let cache_size = NonZeroUsize::new(config.cache_size).unwrap_or(NonZeroUsize::MIN);

        Self {
            storage,
            config,
            locks: Mutex::new(HashMap::new()),
            cache: Mutex::new(LruCache::new(cache_size)),
            subscriptions: SubscriptionManager::new(),
        }
    }

    // --- Reaction Operations ---

    /// Add a reactor to a channel. A reactor already present is a no-op:
    /// nothing is written and the current state is returned.
    pub fn add<'r>(
        &self,
        subject: &SubjectId,
        channel: &Channel,
        reactor: impl Into<Reactor<'r>>,
    ) -> Result<ReactionState> {
        self.apply(subject, channel, reactor, Action::Add)
    }

    /// Remove a reactor from a channel. A reactor not present is a no-op.
    pub fn remove<'r>(
        &self,
        subject: &SubjectId,
        channel: &Channel,
        reactor: impl Into<Reactor<'r>>,
    ) -> Result<ReactionState> {
        self.apply(subject, channel, reactor, Action::Remove)
    }

    /// Whether the reactor is in the channel's set.
    pub fn has<'r>(
        &self,
        subject: &SubjectId,
        channel: &Channel,
        reactor: impl Into<Reactor<'r>>,
    ) -> Result<bool> {
        self.ensure_channel(channel)?;
        let reactor = reactor.into().normalize()?;

        Ok(self.state(subject, channel)?.contains(&reactor))
    }

    /// Apply an action and persist the result.
    ///
    /// On a failed save the tracker keeps the pre-call state, nothing is
    /// broadcast, and the storage error is returned. Nothing is retried.
    pub fn apply<'r>(
        &self,
        subject: &SubjectId,
        channel: &Channel,
        reactor: impl Into<Reactor<'r>>,
        action: Action,
    ) -> Result<ReactionState> {
        self.ensure_channel(channel)?;
        let reactor = reactor.into().normalize()?;

        let key = ReactionKey::new(subject, channel);
        let lock = self.key_lock(&key);
        let _guard = lock
            .try_lock_for(self.config.lock_timeout)
            .ok_or_else(|| ReactionError::LockTimeout {
                subject: subject.clone(),
                channel: channel.clone(),
            })?;

        let current = self.committed_state(&key)?;

        let next = match apply_action(&current, action, &reactor) {
            Some(next) => next,
            None => {
                debug!(%subject, %channel, %reactor, ?action, "reaction unchanged");
                return Ok(current);
            }
        };

        if let Err(e) = self.storage.save(subject, channel, &next) {
            warn!(%subject, %channel, %reactor, ?action, error = %e, "failed to save reaction");
            self.cache.lock().put(key, current);
            return Err(e);
        }

        self.cache.lock().put(key, next.clone());
        debug!(%subject, %channel, %reactor, ?action, count = next.count(), "reaction committed");

        self.subscriptions
            .broadcast_change(subject, channel, action, &reactor, &next);

        Ok(next)
    }

    /// Current state of a channel on a subject.
    pub fn state(&self, subject: &SubjectId, channel: &Channel) -> Result<ReactionState> {
        self.ensure_channel(channel)?;

        let key = ReactionKey::new(subject, channel);
        if let Some(state) = self.cache.lock().get(&key).cloned() {
            return Ok(state);
        }

        // Not cached here: only lock holders may fill the cache, or a slow
        // read could overwrite a newer commit.
        self.storage.load(subject, channel)
    }

    /// Number of reactors on a channel.
    pub fn count(&self, subject: &SubjectId, channel: &Channel) -> Result<u64> {
        Ok(self.state(subject, channel)?.count())
    }

    /// Reactor identities on a channel, in the order they reacted.
    pub fn reactors(&self, subject: &SubjectId, channel: &Channel) -> Result<Vec<ReactorId>> {
        Ok(self.state(subject, channel)?.reactor_ids().to_vec())
    }

    /// Handle exposing the like/dislike/vote methods for one subject.
    pub fn subject(&self, subject: impl Into<SubjectId>) -> Likeable<'_, S> {
        Likeable::new(self, subject.into())
    }

    // --- Subscriptions ---

    /// Receive every change committed from now on that matches the filter.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    // --- Accessors ---

    pub fn channels(&self) -> &[Channel] {
        &self.config.channels
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // --- Private Helpers ---

    fn ensure_channel(&self, channel: &Channel) -> Result<()> {
        if self.config.channels.contains(channel) {
            Ok(())
        } else {
            Err(ReactionError::ChannelNotConfigured(channel.clone()))
        }
    }

    /// Get (or create) the lock for a pair.
    fn key_lock(&self, key: &ReactionKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();

        if locks.len() >= self.config.lock_table_prune_at {
            // Entries only the table references have no holder or waiter.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// State as last committed. Caller must hold the pair's lock.
    fn committed_state(&self, key: &ReactionKey) -> Result<ReactionState> {
        if let Some(state) = self.cache.lock().get(key).cloned() {
            return Ok(state);
        }

        let state = self.storage.load(&key.subject, &key.channel)?;
        self.cache.lock().put(key.clone(), state.clone());
        Ok(state)
    }

    #[cfg(test)]
    fn lock_table_len(&self) -> usize {
        self.locks.lock().len()
    }
}
