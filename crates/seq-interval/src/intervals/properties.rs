//! Per-interval property changes under collaboration.
//!
//! Property changes are last-writer-wins keyed by op sequence number.  A
//! local change applies immediately but its op has not been sequenced
//! yet, so the key is marked *pending*: remote changes to a pending key
//! are masked (the local change will sequence later and win), and the
//! mark is dropped when the local op is acked or rolled back.

use std::collections::HashMap;

use serde_json::Value;

use crate::mergetree::client::{SeqNumber, UNASSIGNED_SEQUENCE_NUMBER};
use crate::PropertySet;

/// Tracks pending (un-acked) property changes for one interval.
#[derive(Debug, Clone, Default)]
pub struct PropertiesManager {
    /// Count of in-flight local changes per key.
    pending: HashMap<String, usize>,
}

impl PropertiesManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `delta` to `target` and return the previous value of every
    /// key that actually changed (the rollback delta).  `Null` values
    /// delete keys.
    ///
    /// `seq` is [`UNASSIGNED_SEQUENCE_NUMBER`] for a pending local
    /// change, the op's sequence number for a remote change, or
    /// [`crate::mergetree::client::UNIVERSAL_SEQUENCE_NUMBER`] when not
    /// collaborating.
    pub fn handle_properties(
        &mut self,
        delta: &PropertySet,
        target: &mut PropertySet,
        seq: SeqNumber,
        collaborating: bool,
    ) -> PropertySet {
        let mut previous = PropertySet::new();
        for (key, value) in delta {
            if collaborating
                && seq != UNASSIGNED_SEQUENCE_NUMBER
                && self.pending.get(key).is_some_and(|n| *n > 0)
            {
                // A local change to this key is still in flight; it will
                // be sequenced after `seq` and wins.
                continue;
            }
            let old = if value.is_null() {
                target.remove(key)
            } else {
                target.insert(key.clone(), value.clone())
            };
            previous.insert(key.clone(), old.unwrap_or(Value::Null));
            if collaborating && seq == UNASSIGNED_SEQUENCE_NUMBER {
                *self.pending.entry(key.clone()).or_insert(0) += 1;
            }
        }
        previous
    }

    /// The op carrying `delta` has been sequenced; drop its pending
    /// marks.
    pub fn ack(&mut self, delta: &PropertySet) {
        for key in delta.keys() {
            self.unmark_pending(key);
        }
    }

    /// Revert a pending local change using the previous-value delta
    /// returned by [`PropertiesManager::handle_properties`].
    pub fn rollback(&mut self, previous: &PropertySet, target: &mut PropertySet) {
        for (key, value) in previous {
            if value.is_null() {
                target.remove(key);
            } else {
                target.insert(key.clone(), value.clone());
            }
            self.unmark_pending(key);
        }
    }

    /// Transfer the property map and the pending bookkeeping to a new
    /// owner.  Used when a modification rebuilds an interval around the
    /// same id: the rebuilt interval must keep masking remote changes to
    /// keys whose local ops are still in flight.
    pub fn copy_to(&self, source: &PropertySet, target: &mut PropertySet) -> PropertiesManager {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
        self.clone()
    }

    /// `true` when a local change to `key` has not been acked yet.
    pub fn has_pending_property(&self, key: &str) -> bool {
        self.pending.get(key).is_some_and(|n| *n > 0)
    }

    fn unmark_pending(&mut self, key: &str) {
        if let Some(count) = self.pending.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.pending.remove(key);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mergetree::client::UNIVERSAL_SEQUENCE_NUMBER;

    fn props(pairs: &[(&str, Value)]) -> PropertySet {
        let mut set = PropertySet::new();
        for (key, value) in pairs {
            set.insert((*key).to_string(), value.clone());
        }
        set
    }

    #[test]
    fn non_collaborating_changes_apply_directly() {
        let mut mgr = PropertiesManager::new();
        let mut target = PropertySet::new();
        mgr.handle_properties(
            &props(&[("color", json!("red"))]),
            &mut target,
            UNIVERSAL_SEQUENCE_NUMBER,
            false,
        );
        assert_eq!(target.get("color"), Some(&json!("red")));
        assert!(!mgr.has_pending_property("color"));
    }

    #[test]
    fn null_deletes_key() {
        let mut mgr = PropertiesManager::new();
        let mut target = props(&[("color", json!("red"))]);
        mgr.handle_properties(
            &props(&[("color", Value::Null)]),
            &mut target,
            UNIVERSAL_SEQUENCE_NUMBER,
            false,
        );
        assert!(target.get("color").is_none());
    }

    #[test]
    fn pending_local_change_masks_remote() {
        let mut mgr = PropertiesManager::new();
        let mut target = PropertySet::new();
        // Local change, not yet acked.
        mgr.handle_properties(
            &props(&[("color", json!("red"))]),
            &mut target,
            UNASSIGNED_SEQUENCE_NUMBER,
            true,
        );
        assert!(mgr.has_pending_property("color"));

        // Remote change arrives before our ack; ours wins.
        mgr.handle_properties(&props(&[("color", json!("blue"))]), &mut target, 17, true);
        assert_eq!(target.get("color"), Some(&json!("red")));

        // After ack, remote changes apply again.
        mgr.ack(&props(&[("color", json!("red"))]));
        assert!(!mgr.has_pending_property("color"));
        mgr.handle_properties(&props(&[("color", json!("green"))]), &mut target, 18, true);
        assert_eq!(target.get("color"), Some(&json!("green")));
    }

    #[test]
    fn rollback_restores_previous_values() {
        let mut mgr = PropertiesManager::new();
        let mut target = props(&[("color", json!("red"))]);
        let previous = mgr.handle_properties(
            &props(&[("color", json!("blue")), ("weight", json!(2))]),
            &mut target,
            UNASSIGNED_SEQUENCE_NUMBER,
            true,
        );
        assert_eq!(target.get("color"), Some(&json!("blue")));
        assert_eq!(target.get("weight"), Some(&json!(2)));

        mgr.rollback(&previous, &mut target);
        assert_eq!(target.get("color"), Some(&json!("red")));
        assert!(target.get("weight").is_none());
        assert!(!mgr.has_pending_property("color"));
        assert!(!mgr.has_pending_property("weight"));
    }

    #[test]
    fn copy_to_carries_map_and_pending_state() {
        let mut mgr = PropertiesManager::new();
        let mut source = PropertySet::new();
        mgr.handle_properties(
            &props(&[("color", json!("red"))]),
            &mut source,
            UNASSIGNED_SEQUENCE_NUMBER,
            true,
        );

        let mut target = props(&[("kept", json!(true))]);
        let mut copied = mgr.copy_to(&source, &mut target);
        assert_eq!(target.get("color"), Some(&json!("red")));
        assert_eq!(target.get("kept"), Some(&json!(true)));

        // The copy still masks remote changes to the in-flight key.
        assert!(copied.has_pending_property("color"));
        copied.handle_properties(&props(&[("color", json!("blue"))]), &mut target, 9, true);
        assert_eq!(target.get("color"), Some(&json!("red")));
    }

    #[test]
    fn overlapping_pending_changes_need_every_ack() {
        let mut mgr = PropertiesManager::new();
        let mut target = PropertySet::new();
        let delta = props(&[("color", json!("red"))]);
        mgr.handle_properties(&delta, &mut target, UNASSIGNED_SEQUENCE_NUMBER, true);
        mgr.handle_properties(&delta, &mut target, UNASSIGNED_SEQUENCE_NUMBER, true);

        mgr.ack(&delta);
        assert!(mgr.has_pending_property("color"));
        mgr.ack(&delta);
        assert!(!mgr.has_pending_property("color"));
    }
}
