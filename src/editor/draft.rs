//! Draft/original pair behind every editor.

use serde::Serialize;

/// Two independent copies of an editable value: the last persisted state and
/// the in-progress edits. Change detection is a full structural comparison of
/// the serialized forms.
#[derive(Debug, Clone)]
pub struct DraftState<T> {
    original: T,
    draft: T,
}

impl<T: Clone + Serialize> DraftState<T> {
    pub fn new(value: T) -> Self {
        Self {
            original: value.clone(),
            draft: value,
        }
    }

    pub fn draft(&self) -> &T {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut T {
        &mut self.draft
    }

    pub fn original(&self) -> &T {
        &self.original
    }

    /// Replace the draft.
    pub fn set(&mut self, draft: T) {
        self.draft = draft;
    }

    pub fn has_changes(&self) -> bool {
        match (serde_json::to_value(&self.draft), serde_json::to_value(&self.original)) {
            (Ok(draft), Ok(original)) => draft != original,
            // Unserializable state cannot be proven clean.
            _ => true,
        }
    }

    /// Discard edits.
    pub fn reset(&mut self) {
        self.draft = self.original.clone();
    }

    /// Promote the draft after it has been persisted.
    pub fn commit(&mut self) {
        self.original = self.draft.clone();
    }

    /// Follow an external change of the source, dropping uncommitted edits.
    pub fn resync(&mut self, source: T) {
        self.original = source.clone();
        self.draft = source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    #[test]
    fn test_edit_reset_commit() {
        let mut state = DraftState::new(json!({"email": "a@x.com", "links": [1, 2]}));
        assert!(!state.has_changes());

        state.draft_mut()["email"] = json!("b@x.com");
        assert!(state.has_changes());
        assert_eq!(state.original()["email"], "a@x.com");

        state.reset();
        assert!(!state.has_changes());
        assert_eq!(state.draft()["email"], "a@x.com");

        state.set(json!({"email": "c@x.com", "links": [1, 2]}));
        state.commit();
        assert!(!state.has_changes());
        assert_eq!(state.original()["email"], "c@x.com");
    }

    #[test]
    fn test_structural_not_reference_equality() {
        let mut state = DraftState::new(json!({"a": [1, {"b": true}]}));
        state.set(json!({"a": [1, {"b": true}]}));
        assert!(!state.has_changes());
    }

    #[test]
    fn test_resync_discards_edits() {
        let mut state = DraftState::new(json!({"title": "Old"}));
        state.draft_mut()["title"] = json!("Editing");
        state.resync(json!({"title": "Refetched"}));
        assert_eq!(state.draft()["title"], "Refetched");
        assert!(!state.has_changes());
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_clone_round_trip(value in arb_json()) {
            let serialized = serde_json::to_string(&value).unwrap();
            let cloned: Value = serde_json::from_str(&serialized).unwrap();
            prop_assert_eq!(&cloned, &value);
            prop_assert!(!DraftState::new(value).has_changes());
        }

        #[test]
        fn prop_reset_is_idempotent(original in arb_json(), edited in arb_json()) {
            let mut once = DraftState::new(original.clone());
            once.set(edited.clone());
            once.reset();

            let mut twice = DraftState::new(original);
            twice.set(edited);
            twice.reset();
            twice.reset();

            prop_assert_eq!(once.draft(), twice.draft());
            prop_assert!(!twice.has_changes());
        }
    }
}
