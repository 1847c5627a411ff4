//! Error types for reaction tracking.

use crate::types::{Channel, SubjectId};
use thiserror::Error;

/// Main error type for tracker and storage operations.
#[derive(Debug, Error)]
pub enum ReactionError {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Subject not found: {0}")]
    NotFound(SubjectId),

    #[error("Invalid reactor identity: {0}")]
    InvalidIdentity(String),

    #[error("Channel not configured: {0}")]
    ChannelNotConfigured(Channel),

    #[error("Timed out waiting for lock on {subject}/{channel}")]
    LockTimeout { subject: SubjectId, channel: Channel },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Storage is locked by another process")]
    Locked,

    #[error("Storage not initialized")]
    NotInitialized,
}

impl ReactionError {
    /// Whether the failure happened while committing a state change.
    pub fn is_persistence(&self) -> bool {
        matches!(self, ReactionError::Persistence(_))
    }
}

impl From<serde_json::Error> for ReactionError {
    fn from(e: serde_json::Error) -> Self {
        ReactionError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for ReactionError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        ReactionError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ReactionError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        ReactionError::Deserialization(e.to_string())
    }
}

/// Result type for reaction operations.
pub type Result<T> = std::result::Result<T, ReactionError>;
