//! Subscription system for live reaction changes.
//!
//! Every committed add or remove is broadcast to subscribers whose filter
//! matches the subject and channel. No-ops are not broadcast. Buffers are
//! bounded; a subscriber that falls behind is dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = tracker.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::channels(vec![Channel::LIKE]),
//!     ..Default::default()
//! });
//!
//! loop {
//!     match handle.recv() {
//!         Ok(ReactionEvent::Changed { subject, state, .. }) => {
//!             println!("{} now has {} likes", subject, state.count())
//!         }
//!         Ok(ReactionEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, ReactionEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
