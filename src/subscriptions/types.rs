//! Subscription types for live reaction updates.

use crate::types::{Action, Channel, ReactionState, ReactorId, SubjectId, Timestamp};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::default(),
        }
    }
}

/// Filter criteria for subscriptions. `None` matches everything.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Only these subjects.
    pub subjects: Option<Vec<SubjectId>>,

    /// Only these channels.
    pub channels: Option<Vec<Channel>>,
}

impl SubscriptionFilter {
    /// Every change on every subject.
    pub fn all() -> Self {
        Self::default()
    }

    /// Changes on specific subjects.
    pub fn subjects(subjects: Vec<SubjectId>) -> Self {
        Self {
            subjects: Some(subjects),
            ..Default::default()
        }
    }

    /// Changes on specific channels.
    pub fn channels(channels: Vec<Channel>) -> Self {
        Self {
            channels: Some(channels),
            ..Default::default()
        }
    }

    pub fn matches(&self, subject: &SubjectId, channel: &Channel) -> bool {
        if let Some(ref subjects) = self.subjects {
            if !subjects.contains(subject) {
                return false;
            }
        }

        if let Some(ref channels) = self.channels {
            if !channels.contains(channel) {
                return false;
            }
        }

        true
    }
}

/// Events emitted by subscriptions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionEvent {
    /// A reaction was committed.
    Changed {
        subject: SubjectId,
        channel: Channel,
        action: Action,
        reactor: ReactorId,
        /// State after the change.
        state: ReactionState,
        at: Timestamp,
    },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<ReactionEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ReactionEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ReactionEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ReactionEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
