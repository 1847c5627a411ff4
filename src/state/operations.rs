//! Reaction state transitions.

use crate::types::{Action, ReactionState, ReactorId};

/// Apply an action to a reaction state.
///
/// Returns `None` when the action would not change the state: adding a
/// reactor already present, or removing one that is absent. Otherwise
/// returns the new state with the count recomputed from the identities and
/// the version bumped. The input state is left untouched so callers can
/// keep it for rollback.
pub fn apply_action(
    state: &ReactionState,
    action: Action,
    reactor: &ReactorId,
) -> Option<ReactionState> {
    match action {
        Action::Add => {
            if state.contains(reactor) {
                return None;
            }

            let (mut ids, _, version) = state.clone().into_parts();
            ids.push(reactor.clone());

            let count = ids.len() as u64;
            Some(ReactionState::from_raw(ids, count, version + 1))
        }

        Action::Remove => {
            if !state.contains(reactor) {
                return None;
            }

            let (mut ids, _, version) = state.clone().into_parts();
            // Keep the order of the remaining reactors stable.
            ids.retain(|id| id != reactor);

            let count = ids.len() as u64;
            Some(ReactionState::from_raw(ids, count, version + 1))
        }
    }
}
