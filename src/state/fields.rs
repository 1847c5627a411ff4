//! Projection of reaction states onto document fields.
//!
//! A likeable document keeps each channel as two fields: a count
//! (`likes`) and the identities behind it (`likers`). These helpers build
//! that shape so an embedding data layer can store it next to the subject.

use crate::types::{Channel, ReactionState};
use serde_json::{Map, Value};

impl ReactionState {
    /// The two document fields for this state on `channel`.
    pub fn to_fields(&self, channel: &Channel) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(channel.count_field(), Value::from(self.count()));
        fields.insert(
            channel.set_field(),
            Value::Array(
                self.reactor_ids()
                    .iter()
                    .map(|id| Value::String(id.as_str().to_string()))
                    .collect(),
            ),
        );
        fields
    }
}

/// Accumulates the fields of several channels into one document object.
#[derive(Clone, Debug, Default)]
pub struct DocumentFields {
    fields: Map<String, Value>,
}

impl DocumentFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one channel's fields.
    pub fn merge(&mut self, channel: &Channel, state: &ReactionState) -> &mut Self {
        self.fields.extend(state.to_fields(channel));
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::apply_action;
    use crate::types::{Action, ReactorId};
    use serde_json::json;

    #[test]
    fn test_to_fields() {
        let state = ReactionState::default();
        let state = apply_action(&state, Action::Add, &ReactorId::new("u1")).unwrap();

        let fields = state.to_fields(&Channel::LIKE);
        assert_eq!(fields["likes"], json!(1));
        assert_eq!(fields["likers"], json!(["u1"]));
    }

    #[test]
    fn test_merge_channels() {
        let liked = apply_action(&ReactionState::default(), Action::Add, &ReactorId::new("u1"))
            .unwrap();
        let empty = ReactionState::default();

        let mut doc = DocumentFields::new();
        doc.merge(&Channel::LIKE, &liked)
            .merge(&Channel::DISLIKE, &empty)
            .merge(&Channel::VOTE, &empty);

        assert_eq!(
            doc.into_value(),
            json!({
                "likes": 1,
                "likers": ["u1"],
                "dislikes": 0,
                "dislikers": [],
                "votes": 0,
                "voters": [],
            })
        );
    }
}
