//! The sequence interval value.
//!
//! An interval is a labeled range whose endpoints are
//! [`LocalReferencePosition`]s into the underlying sequence.  It is
//! immutable by convention: [`SequenceInterval::modify`] returns a new
//! interval sharing the same id, and the endpoints are replaced rather
//! than moved.  All operations that need the sequence take the client as
//! an explicit argument.

use std::cmp::Ordering;

use serde_json::json;
use uuid::Uuid;

use crate::error::UsageError;
use crate::mergetree::client::{
    max_reference_position, min_reference_position, SeqNumber, SequenceClient,
    UNASSIGNED_SEQUENCE_NUMBER, UNIVERSAL_SEQUENCE_NUMBER,
};
use crate::mergetree::place::{endpoint_pos_and_side, SequencePlace, SequencePosition, Side};
use crate::mergetree::reference::{
    ref_type, LocalReferencePosition, RefAnchor, SlideCallback, SlidingPreference,
};
use crate::mergetree::stickiness::{
    compute_stickiness_from_side, end_reference_sliding_preference,
    start_reference_sliding_preference, Stickiness,
};
use crate::PropertySet;

use super::factory::{create_position_reference, RefOrigin, SequencedOp};
use super::properties::PropertiesManager;
use super::serialized::{SerializedInterval, SerializedIntervalDelta};

/// Reserved property key mirroring the interval id on the wire.
pub const INTERVAL_ID_PROP: &str = "intervalId";

/// Reserved property key carrying the owning collection's label on the
/// wire.
pub const REFERENCE_RANGE_LABELS_PROP: &str = "referenceRangeLabels";

/// Interval behavior flags.
///
/// `NEST` and `SIMPLE` are legacy; every non-transient interval behaves
/// as `SLIDE_ON_REMOVE` once its creation is acknowledged.
pub mod interval_type {
    pub const SIMPLE: u8 = 0x0;
    pub const NEST: u8 = 0x1;
    pub const SLIDE_ON_REMOVE: u8 = 0x2;
    pub const TRANSIENT: u8 = 0x4;
}

/// Side order at equal reference positions: `Before` sorts greater when
/// it is the first argument.
fn compare_sides(a: Side, b: Side) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if a == Side::Before {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

// ── SequenceInterval ──────────────────────────────────────────────────────

/// A labeled range anchored into the sequence.
pub struct SequenceInterval {
    id: String,
    label: String,
    pub start: LocalReferencePosition,
    pub end: LocalReferencePosition,
    pub interval_type: u8,
    pub start_side: Side,
    pub end_side: Side,
    properties: PropertySet,
    property_manager: PropertiesManager,
    callbacks_attached: bool,
}

impl SequenceInterval {
    /// Build an interval from already-configured endpoint references.
    ///
    /// The reserved wire keys are stripped from `props`; they are
    /// re-inserted only on serialization.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        label: String,
        start: LocalReferencePosition,
        end: LocalReferencePosition,
        interval_type: u8,
        props: Option<&PropertySet>,
        start_side: Side,
        end_side: Side,
    ) -> Self {
        let mut properties = props.cloned().unwrap_or_default();
        properties.remove(INTERVAL_ID_PROP);
        properties.remove(REFERENCE_RANGE_LABELS_PROP);
        Self {
            id,
            label,
            start,
            end,
            interval_type,
            start_side,
            end_side,
            properties,
            property_manager: PropertiesManager::new(),
            callbacks_attached: false,
        }
    }

    pub fn get_interval_id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn is_transient(&self) -> bool {
        self.interval_type & interval_type::TRANSIENT != 0
    }

    /// Stickiness derived from the current anchors and sides.  Never
    /// cached: an endpoint's segment may have slid since creation.
    pub fn stickiness(&self) -> Stickiness {
        compute_stickiness_from_side(
            sentinel_position(&self.start),
            self.start_side,
            sentinel_position(&self.end),
            self.end_side,
        )
    }

    pub fn start_position<C: SequenceClient + ?Sized>(&self, client: &C) -> usize {
        client.local_reference_position_to_position(&self.start)
    }

    pub fn end_position<C: SequenceClient + ?Sized>(&self, client: &C) -> usize {
        client.local_reference_position_to_position(&self.end)
    }

    /// A fresh interval with the same id, label, endpoints, and
    /// properties.  Slide-listener subscriptions are not cloned.
    pub fn clone_interval(&self) -> Self {
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            interval_type: self.interval_type,
            start_side: self.start_side,
            end_side: self.end_side,
            properties: self.properties.clone(),
            property_manager: self.property_manager.clone(),
            callbacks_attached: false,
        }
    }

    // ── Ordering ──────────────────────────────────────────────────────────

    /// Order by start reference; at equal references a `Before` start
    /// sorts after an `After` start.
    pub fn compare_start<C: SequenceClient + ?Sized>(&self, b: &Self, client: &C) -> Ordering {
        let cmp = client.compare_reference_positions(&self.start, &b.start);
        if cmp == Ordering::Equal {
            compare_sides(self.start_side, b.start_side)
        } else {
            cmp
        }
    }

    /// Order by end reference; at equal references an `After` end sorts
    /// after a `Before` end (note the swapped arguments).
    pub fn compare_end<C: SequenceClient + ?Sized>(&self, b: &Self, client: &C) -> Ordering {
        let cmp = client.compare_reference_positions(&self.end, &b.end);
        if cmp == Ordering::Equal {
            compare_sides(b.end_side, self.end_side)
        } else {
            cmp
        }
    }

    /// Total order: lexicographic on `(start, end, id)`.
    pub fn compare<C: SequenceClient + ?Sized>(&self, b: &Self, client: &C) -> Ordering {
        self.compare_start(b, client)
            .then_with(|| self.compare_end(b, client))
            .then_with(|| self.id.cmp(&b.id))
    }

    /// `true` when the two intervals share at least one reference
    /// position.
    pub fn overlaps<C: SequenceClient + ?Sized>(&self, b: &Self, client: &C) -> bool {
        client.compare_reference_positions(&self.start, &b.end) != Ordering::Greater
            && client.compare_reference_positions(&self.end, &b.start) != Ordering::Less
    }

    /// `true` when this interval overlaps the numeric range
    /// `[b_start, b_end)`.  Strict comparisons: endpoints are
    /// semantically exclusive.
    pub fn overlaps_pos<C: SequenceClient + ?Sized>(
        &self,
        client: &C,
        b_start: usize,
        b_end: usize,
    ) -> bool {
        let start_pos = self.start_position(client);
        let end_pos = self.end_position(client);
        end_pos > b_start && start_pos < b_end
    }

    // ── Combination ───────────────────────────────────────────────────────

    /// The smallest interval covering both inputs.  Shares the winning
    /// endpoint references, carries a fresh id, `self`'s label and type,
    /// and no properties.
    pub fn union<C: SequenceClient + ?Sized>(&self, b: &Self, client: &C) -> Self {
        let new_start = min_reference_position(client, &self.start, &b.start).clone();
        let new_end = max_reference_position(client, &self.end, &b.end).clone();

        let start_side = if LocalReferencePosition::same(&self.start, &b.start) {
            // Inclusive union: Before wins on the left.
            if self.start_side == Side::Before || b.start_side == Side::Before {
                Side::Before
            } else {
                Side::After
            }
        } else if LocalReferencePosition::same(&new_start, &self.start) {
            self.start_side
        } else {
            b.start_side
        };
        let end_side = if LocalReferencePosition::same(&self.end, &b.end) {
            // After wins on the right.
            if self.end_side == Side::After || b.end_side == Side::After {
                Side::After
            } else {
                Side::Before
            }
        } else if LocalReferencePosition::same(&new_end, &self.end) {
            self.end_side
        } else {
            b.end_side
        };

        SequenceInterval::new(
            Uuid::new_v4().to_string(),
            self.label.clone(),
            new_start,
            new_end,
            self.interval_type,
            None,
            start_side,
            end_side,
        )
    }

    /// Rebuild this interval with new endpoints and/or label, reusing the
    /// id.  Endpoints left `None` keep their current reference object;
    /// changed endpoints get a replacement reference.  A local-only
    /// modification (`op == None`) pins the replacements with
    /// stay-on-remove until it is acked.
    #[allow(clippy::too_many_arguments)]
    pub fn modify<C: SequenceClient + ?Sized>(
        &self,
        label: &str,
        start: Option<SequencePlace>,
        end: Option<SequencePlace>,
        op: Option<SequencedOp>,
        local_seq: Option<SeqNumber>,
        use_new_sliding_behavior: bool,
        client: &mut C,
    ) -> Result<Self, UsageError> {
        let (start_pos, start_side, end_pos, end_side) = endpoint_pos_and_side(start, end);
        let new_start_side = start_side.unwrap_or(self.start_side);
        let new_end_side = end_side.unwrap_or(self.end_side);

        // Stickiness from the requested tuple; unchanged endpoints
        // contribute their current segment's endpoint type.
        let stickiness = compute_stickiness_from_side(
            start_pos.or_else(|| sentinel_position(&self.start)),
            new_start_side,
            end_pos.or_else(|| sentinel_position(&self.end)),
            new_end_side,
        );

        let origin = match op {
            Some(op) => RefOrigin::Op {
                ref_seq: op.reference_sequence_number,
                client_id: op.client_id,
            },
            None => RefOrigin::Local { local_seq },
        };

        let new_start = match start_pos {
            Some(pos) => {
                let pref = start_reference_sliding_preference(stickiness);
                let reference = create_position_reference(
                    client,
                    pos,
                    replacement_ref_type(self.start.ref_type(), op.is_none()),
                    origin,
                    pref,
                    pref == SlidingPreference::Backward,
                    use_new_sliding_behavior,
                )?;
                if let Some(props) = self.start.properties() {
                    reference.add_properties(&props);
                }
                reference
            }
            None => self.start.clone(),
        };
        let new_end = match end_pos {
            Some(pos) => {
                let pref = end_reference_sliding_preference(stickiness);
                let reference = create_position_reference(
                    client,
                    pos,
                    replacement_ref_type(self.end.ref_type(), op.is_none()),
                    origin,
                    pref,
                    pref == SlidingPreference::Forward,
                    use_new_sliding_behavior,
                )?;
                if let Some(props) = self.end.properties() {
                    reference.add_properties(&props);
                }
                reference
            }
            None => self.end.clone(),
        };

        let mut modified = SequenceInterval::new(
            self.id.clone(),
            label.to_string(),
            new_start,
            new_end,
            self.interval_type,
            None,
            new_start_side,
            new_end_side,
        );
        modified.property_manager = self
            .property_manager
            .copy_to(&self.properties, &mut modified.properties);
        Ok(modified)
    }

    // ── Serialization ─────────────────────────────────────────────────────

    /// Full wire form: endpoints, sides, and the complete property bag.
    pub fn serialize<C: SequenceClient + ?Sized>(&self, client: &C) -> SerializedInterval {
        self.serialize_delta(client, Some(&self.properties), true)
    }

    /// Wire form of a change: `props` plus, when `include_endpoints`,
    /// the resolved endpoint positions and sides.
    pub fn serialize_delta<C: SequenceClient + ?Sized>(
        &self,
        client: &C,
        props: Option<&PropertySet>,
        include_endpoints: bool,
    ) -> SerializedIntervalDelta {
        let (start, end, start_side, end_side) = if include_endpoints {
            (
                Some(endpoint_wire_position(&self.start, client)),
                Some(endpoint_wire_position(&self.end, client)),
                Some(self.start_side),
                Some(self.end_side),
            )
        } else {
            (None, None, None, None)
        };

        let mut properties = props.cloned().unwrap_or_default();
        properties.insert(INTERVAL_ID_PROP.to_string(), json!(self.id));
        properties.insert(REFERENCE_RANGE_LABELS_PROP.to_string(), json!([self.label]));

        SerializedIntervalDelta {
            start,
            end,
            start_side,
            end_side,
            interval_type: self.interval_type,
            stickiness: Some(self.stickiness()),
            sequence_number: client.current_seq(),
            properties: Some(properties),
        }
    }

    // ── Properties ────────────────────────────────────────────────────────

    /// Apply a property delta.  `op_seq` is the op's sequence number for
    /// remote changes and `None` for local ones.  Returns the
    /// previous-value delta (used for rollback).
    pub fn change_properties<C: SequenceClient + ?Sized>(
        &mut self,
        props: &PropertySet,
        client: &C,
        op_seq: Option<SeqNumber>,
    ) -> PropertySet {
        let collaborating = client.is_collaborating();
        let seq = op_seq.unwrap_or(if collaborating {
            UNASSIGNED_SEQUENCE_NUMBER
        } else {
            UNIVERSAL_SEQUENCE_NUMBER
        });
        self.property_manager
            .handle_properties(props, &mut self.properties, seq, collaborating)
    }

    /// Revert a pending local property change using the previous-value
    /// delta from [`SequenceInterval::change_properties`].
    pub fn rollback_properties_change(&mut self, previous: &PropertySet) {
        self.property_manager
            .rollback(previous, &mut self.properties);
    }

    /// The op carrying this property delta has been sequenced.
    pub fn ack_properties_change(&mut self, props: &PropertySet, _op_seq: SeqNumber) {
        self.property_manager.ack(props);
    }

    pub fn has_pending_property(&self, key: &str) -> bool {
        self.property_manager.has_pending_property(key)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// The creation op has been sequenced: both endpoints transition from
    /// stay-on-remove to slide-on-remove.  No-op for transient intervals.
    pub fn ack_creation(&self) {
        if self.is_transient() {
            return;
        }
        self.start.set_slide_on_remove();
        self.end.set_slide_on_remove();
    }

    /// Wire `before`/`after` into both endpoints' slide callbacks.
    /// Idempotent: an existing subscription blocks a new one.
    pub fn add_position_change_listeners(&mut self, before: SlideCallback, after: SlideCallback) {
        if self.callbacks_attached {
            return;
        }
        self.callbacks_attached = true;
        self.start
            .set_callbacks(Some(before.clone()), Some(after.clone()));
        self.end.set_callbacks(Some(before), Some(after));
    }

    /// Clear both endpoints' slide callbacks.
    pub fn remove_position_change_listeners(&mut self) {
        if self.callbacks_attached {
            self.callbacks_attached = false;
            self.start.set_callbacks(None, None);
            self.end.set_callbacks(None, None);
        }
    }
}

/// The sentinel an endpoint clings to, if any.
fn sentinel_position(reference: &LocalReferencePosition) -> Option<SequencePosition> {
    match reference.anchor() {
        RefAnchor::StartOfSequence => Some(SequencePosition::Start),
        RefAnchor::EndOfSequence => Some(SequencePosition::End),
        _ => None,
    }
}

/// Wire position of an endpoint: the sentinel tag when anchored to a
/// sequence endpoint, the resolved index otherwise.
fn endpoint_wire_position<C: SequenceClient + ?Sized>(
    reference: &LocalReferencePosition,
    client: &C,
) -> SequencePosition {
    match sentinel_position(reference) {
        Some(pos) => pos,
        None => {
            SequencePosition::Index(client.local_reference_position_to_position(reference))
        }
    }
}

/// Reference type for a replacement endpoint.  A local-only modification
/// must not slide until acked.
fn replacement_ref_type(base: u32, local: bool) -> u32 {
    if local {
        (base & !ref_type::SLIDE_ON_REMOVE) | ref_type::STAY_ON_REMOVE
    } else {
        base
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
