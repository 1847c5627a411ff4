//! Reaction state transitions and document projection.
//!
//! Transitions are pure: they take the current state and return the next
//! one, leaving persistence and locking to the tracker.

mod fields;
mod operations;

pub use fields::DocumentFields;
pub use operations::apply_action;
