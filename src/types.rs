//! Core types for reaction tracking.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of the entity being reacted to.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        SubjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({})", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        SubjectId::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        SubjectId(id)
    }
}

/// Raw identity of a reactor, as stored in a reaction set.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactorId(String);

impl ReactorId {
    pub fn new(id: impl Into<String>) -> Self {
        ReactorId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReactorId({})", self.0)
    }
}

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named category of reaction.
///
/// Channels are fixed when a tracker is configured. The three channels of a
/// likeable document are available as constants; any other name can be
/// configured with [`Channel::new`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(Cow<'static, str>);

impl Channel {
    pub const LIKE: Channel = Channel(Cow::Borrowed("like"));
    pub const DISLIKE: Channel = Channel(Cow::Borrowed("dislike"));
    pub const VOTE: Channel = Channel(Cow::Borrowed("vote"));

    pub fn new(name: impl Into<String>) -> Self {
        Channel(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Document field holding the derived count (`likes`, `votes`, ...).
    pub fn count_field(&self) -> String {
        format!("{}s", self.0)
    }

    /// Document field holding the reactor identities (`likers`, `voters`, ...).
    pub fn set_field(&self) -> String {
        if self.0.ends_with('e') {
            format!("{}rs", self.0)
        } else {
            format!("{}ers", self.0)
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that carries a reactor identity, typically a user model.
pub trait Identified {
    fn reactor_id(&self) -> ReactorId;
}

impl Identified for ReactorId {
    fn reactor_id(&self) -> ReactorId {
        self.clone()
    }
}

/// A reactor argument before normalization.
pub enum Reactor<'a> {
    /// A raw identity value.
    Raw(ReactorId),
    /// An object exposing an identity accessor.
    Bearer(&'a dyn Identified),
}

impl Reactor<'_> {
    /// Resolve to the raw identity stored in reaction sets.
    ///
    /// Empty or whitespace-only identities are rejected.
    pub fn normalize(self) -> crate::Result<ReactorId> {
        let id = match self {
            Reactor::Raw(id) => id,
            Reactor::Bearer(bearer) => bearer.reactor_id(),
        };

        if id.as_str().trim().is_empty() {
            return Err(crate::ReactionError::InvalidIdentity(format!(
                "empty identity {:?}",
                id.as_str()
            )));
        }

        Ok(id)
    }
}

impl fmt::Debug for Reactor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reactor::Raw(id) => write!(f, "Reactor::Raw({})", id),
            Reactor::Bearer(bearer) => write!(f, "Reactor::Bearer({})", bearer.reactor_id()),
        }
    }
}

impl From<&str> for Reactor<'_> {
    fn from(id: &str) -> Self {
        Reactor::Raw(ReactorId::new(id))
    }
}

impl From<String> for Reactor<'_> {
    fn from(id: String) -> Self {
        Reactor::Raw(ReactorId(id))
    }
}

impl From<ReactorId> for Reactor<'_> {
    fn from(id: ReactorId) -> Self {
        Reactor::Raw(id)
    }
}

impl<'a, T: Identified> From<&'a T> for Reactor<'a> {
    fn from(bearer: &'a T) -> Self {
        Reactor::Bearer(bearer)
    }
}

/// Whether a call adds or removes a reactor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Add,
    Remove,
}

/// One (subject, channel) pair. The unit of serialization and persistence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionKey {
    pub subject: SubjectId,
    pub channel: Channel,
}

impl ReactionKey {
    pub fn new(subject: &SubjectId, channel: &Channel) -> Self {
        Self {
            subject: subject.clone(),
            channel: channel.clone(),
        }
    }
}

impl fmt::Display for ReactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.channel)
    }
}

/// Reactor identities plus the count derived from them.
///
/// `count` always equals the number of identities and identities never
/// repeat. Fields are private so that only [`crate::state::apply_action`]
/// and [`ReactionState::from_parts`] can build a non-empty state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionState {
    /// Identities in the order they reacted.
    reactor_ids: Vec<ReactorId>,

    /// Derived from `reactor_ids`.
    count: u64,

    /// Bumped on every committed mutation.
    version: u64,
}

impl ReactionState {
    /// Build a state from stored identities, checking for duplicates.
    pub fn from_parts(reactor_ids: Vec<ReactorId>, version: u64) -> crate::Result<Self> {
        let mut seen = std::collections::HashSet::with_capacity(reactor_ids.len());
        for id in &reactor_ids {
            if !seen.insert(id) {
                return Err(crate::ReactionError::Corruption(format!(
                    "duplicate reactor {} in stored state",
                    id
                )));
            }
        }

        Ok(Self {
            count: reactor_ids.len() as u64,
            reactor_ids,
            version,
        })
    }

    pub fn reactor_ids(&self) -> &[ReactorId] {
        &self.reactor_ids
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains(&self, reactor: &ReactorId) -> bool {
        self.reactor_ids.contains(reactor)
    }

    pub fn is_empty(&self) -> bool {
        self.reactor_ids.is_empty()
    }

    /// True when the count matches the identities and none repeat.
    pub fn is_consistent(&self) -> bool {
        if self.count != self.reactor_ids.len() as u64 {
            return false;
        }
        let mut seen = std::collections::HashSet::with_capacity(self.reactor_ids.len());
        self.reactor_ids.iter().all(|id| seen.insert(id))
    }

    pub(crate) fn into_parts(self) -> (Vec<ReactorId>, u64, u64) {
        (self.reactor_ids, self.count, self.version)
    }

    pub(crate) fn from_raw(reactor_ids: Vec<ReactorId>, count: u64, version: u64) -> Self {
        Self {
            reactor_ids,
            count,
            version,
        }
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}
