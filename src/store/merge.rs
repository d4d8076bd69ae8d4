use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde_json::{Map, Value};

/// Field-name keyed state, the default store state shape.
pub type StateMap = Map<String, Value>;

/// A state type that can produce its next version from a partial update.
///
/// `merge` must not modify `self`: the current state may already be
/// published to readers. Entries present in `partial` replace the
/// corresponding entries of the current state; nested values are replaced
/// wholesale, not merged.
pub trait ShallowMerge: Sized {
    /// The partial update accepted by [`Store::set_state`](crate::Store::set_state).
    type Partial;

    /// Build the next state from `self` and `partial`.
    fn merge(&self, partial: Self::Partial) -> Self;
}

impl ShallowMerge for Map<String, Value> {
    type Partial = Map<String, Value>;

    fn merge(&self, partial: Self::Partial) -> Self {
        let mut next = self.clone();
        next.extend(partial);
        next
    }
}

impl<K: Ord + Clone, V: Clone> ShallowMerge for BTreeMap<K, V> {
    type Partial = BTreeMap<K, V>;

    fn merge(&self, partial: Self::Partial) -> Self {
        let mut next = self.clone();
        next.extend(partial);
        next
    }
}

impl<K: Eq + Hash + Clone, V: Clone> ShallowMerge for HashMap<K, V> {
    type Partial = HashMap<K, V>;

    fn merge(&self, partial: Self::Partial) -> Self {
        let mut next = self.clone();
        next.extend(partial);
        next
    }
}

/// Build a [`StateMap`] from a JSON object literal.
///
/// Non-object values produce an empty map.
pub fn state_map(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_replaces_present_fields_only() {
        let current = state_map(json!({ "count": 0, "name": "a" }));
        let next = current.merge(state_map(json!({ "name": "b" })));

        assert_eq!(next["count"], json!(0));
        assert_eq!(next["name"], json!("b"));
        // The previous version is untouched.
        assert_eq!(current["name"], json!("a"));
    }

    #[test]
    fn merge_is_shallow() {
        let current = state_map(json!({ "user": { "id": 1, "name": "a" } }));
        let next = current.merge(state_map(json!({ "user": { "id": 2 } })));

        assert_eq!(next["user"], json!({ "id": 2 }));
    }

    #[test]
    fn merge_adds_new_fields() {
        let current: BTreeMap<&str, i32> = BTreeMap::from([("a", 1)]);
        let next = current.merge(BTreeMap::from([("b", 2)]));

        assert_eq!(next, BTreeMap::from([("a", 1), ("b", 2)]));
    }

    #[test]
    fn non_object_literal_is_empty() {
        assert!(state_map(json!([1, 2, 3])).is_empty());
    }
}
