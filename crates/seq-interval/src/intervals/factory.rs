//! Endpoint factory — turns `(position, side, origin)` requests into
//! correctly configured references and intervals.
//!
//! The origin of a creation request decides how its endpoints react to
//! removal: remote and snapshot intervals slide immediately, local ones
//! stay pinned until their creation op is acknowledged, transient ones
//! detach.  The factory is the single place where those flag choices are
//! made.

use tracing::debug;
use uuid::Uuid;

use crate::error::UsageError;
use crate::mergetree::client::{ResolveContext, SegmentOffset, SeqNumber, SequenceClient};
use crate::mergetree::place::{SequencePlace, SequencePosition};
use crate::mergetree::reference::{
    ref_type, LocalReferencePosition, RefAnchor, SlidingPreference,
};
use crate::mergetree::stickiness::{
    compute_stickiness_from_side, end_reference_sliding_preference,
    start_reference_sliding_preference,
};
use crate::PropertySet;

use super::interval::{interval_type, SequenceInterval, REFERENCE_RANGE_LABELS_PROP};

/// Identity of a sequenced op, as delivered by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencedOp {
    pub sequence_number: SeqNumber,
    pub reference_sequence_number: SeqNumber,
    pub client_id: u64,
}

/// Where a creation request originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefOrigin {
    /// Immediate local user action.  `local_seq` is set when replaying a
    /// pending local change during rebase.
    Local { local_seq: Option<SeqNumber> },
    /// An inbound remote op.
    Op {
        ref_seq: SeqNumber,
        client_id: u64,
    },
    /// Loading from a snapshot.
    Snapshot,
    /// Rolling back a pending local change.
    Rollback,
    /// Ephemeral; never sequenced.
    Transient,
}

impl RefOrigin {
    fn is_op(&self) -> bool {
        matches!(self, RefOrigin::Op { .. })
    }
}

/// Create a reference at `pos`, configured for its origin.
///
/// Remote-op references resolve in the op's view and are pre-slid so the
/// local anchor matches what the sender's peers computed after any
/// removes.  When the position cannot be resolved and the origin permits
/// it, a detached reference is returned; it attaches when the content it
/// refers to materializes during rebase.
pub fn create_position_reference<C: SequenceClient + ?Sized>(
    client: &mut C,
    pos: SequencePosition,
    ref_flags: u32,
    origin: RefOrigin,
    sliding: SlidingPreference,
    can_slide_to_endpoint: bool,
    use_new_sliding_behavior: bool,
) -> Result<LocalReferencePosition, UsageError> {
    if origin.is_op() && ref_flags & ref_type::SLIDE_ON_REMOVE == 0 {
        return Err(UsageError::OpReferenceMustSlideOnRemove);
    }
    if matches!(origin, RefOrigin::Local { .. }) && ref_flags & ref_type::SLIDE_ON_REMOVE != 0 {
        return Err(UsageError::LocalReferenceMustStayOnRemove);
    }

    let index = match pos {
        SequencePosition::Start => {
            return Ok(client.create_local_reference_position(
                RefAnchor::StartOfSequence,
                ref_flags,
                None,
                sliding,
                can_slide_to_endpoint,
            ));
        }
        SequencePosition::End => {
            return Ok(client.create_local_reference_position(
                RefAnchor::EndOfSequence,
                ref_flags,
                None,
                sliding,
                can_slide_to_endpoint,
            ));
        }
        SequencePosition::Index(n) => n,
    };

    let ctx = match origin {
        RefOrigin::Op { ref_seq, client_id } => ResolveContext::Remote { ref_seq, client_id },
        RefOrigin::Local {
            local_seq: Some(local_seq),
        } => ResolveContext::Local { local_seq },
        _ => ResolveContext::Current,
    };
    let mut segoff = client.get_containing_segment(index, ctx);

    if origin.is_op() {
        if let Some(resolved) = segoff {
            // Land where remote peers computed this reference after any
            // removes in flight.
            match client.slide_to_segment(resolved, sliding, use_new_sliding_behavior) {
                Some(RefAnchor::Segment { segment, offset }) => {
                    segoff = Some(SegmentOffset { segment, offset });
                }
                Some(anchor @ (RefAnchor::StartOfSequence | RefAnchor::EndOfSequence)) => {
                    return Ok(client.create_local_reference_position(
                        anchor,
                        ref_flags,
                        None,
                        sliding,
                        can_slide_to_endpoint,
                    ));
                }
                Some(RefAnchor::Detached) | None => segoff = None,
            }
        }
    }

    match segoff {
        Some(SegmentOffset { segment, offset }) => Ok(client.create_local_reference_position(
            RefAnchor::Segment { segment, offset },
            ref_flags,
            None,
            sliding,
            can_slide_to_endpoint,
        )),
        None => {
            let permitted = matches!(
                origin,
                RefOrigin::Op { .. }
                    | RefOrigin::Snapshot
                    | RefOrigin::Rollback
                    | RefOrigin::Local { local_seq: Some(_) }
            ) || ref_flags & ref_type::TRANSIENT != 0;
            if !permitted {
                return Err(UsageError::NonTransientReferenceNeedsSegment);
            }
            Ok(client.create_detached_local_reference_position(sliding, ref_flags))
        }
    }
}

/// Create an interval over `[start, end]`, with endpoints configured for
/// the request's origin.  Missing places cling to the corresponding
/// sequence endpoint; a missing `id` gets a fresh UUID.
#[allow(clippy::too_many_arguments)]
pub fn create_sequence_interval<C: SequenceClient + ?Sized>(
    label: &str,
    id: Option<String>,
    start: Option<SequencePlace>,
    end: Option<SequencePlace>,
    client: &mut C,
    interval_flags: u8,
    origin: RefOrigin,
    use_new_sliding_behavior: bool,
    props: Option<&PropertySet>,
) -> Result<SequenceInterval, UsageError> {
    let (start_pos, start_side) = start.unwrap_or(SequencePlace::Start).pos_and_side();
    let (end_pos, end_side) = end.unwrap_or(SequencePlace::End).pos_and_side();
    let stickiness =
        compute_stickiness_from_side(Some(start_pos), start_side, Some(end_pos), end_side);

    let mut begin_flags = ref_type::RANGE_BEGIN;
    let mut end_flags = ref_type::RANGE_END;
    if interval_flags & interval_type::TRANSIENT != 0 {
        begin_flags |= ref_type::TRANSIENT;
        end_flags |= ref_type::TRANSIENT;
    } else if matches!(origin, RefOrigin::Op { .. } | RefOrigin::Snapshot) {
        begin_flags |= ref_type::SLIDE_ON_REMOVE;
        end_flags |= ref_type::SLIDE_ON_REMOVE;
    } else {
        begin_flags |= ref_type::STAY_ON_REMOVE;
        end_flags |= ref_type::STAY_ON_REMOVE;
    }

    let start_pref = start_reference_sliding_preference(stickiness);
    let end_pref = end_reference_sliding_preference(stickiness);

    let start_ref = create_position_reference(
        client,
        start_pos,
        begin_flags,
        origin,
        start_pref,
        start_pref == SlidingPreference::Backward,
        use_new_sliding_behavior,
    )?;
    let end_ref = create_position_reference(
        client,
        end_pos,
        end_flags,
        origin,
        end_pref,
        end_pref == SlidingPreference::Forward,
        use_new_sliding_behavior,
    )?;

    let mut label_props = PropertySet::new();
    label_props.insert(
        REFERENCE_RANGE_LABELS_PROP.to_string(),
        serde_json::json!([label]),
    );
    start_ref.add_properties(&label_props);
    end_ref.add_properties(&label_props);

    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
    debug!(%id, label, ?origin, "created sequence interval");

    Ok(SequenceInterval::new(
        id,
        label.to_string(),
        start_ref,
        end_ref,
        interval_flags,
        props,
        start_side,
        end_side,
    ))
}

/// An ephemeral interval for queries and iteration; never sequenced and
/// never acked.
pub fn create_transient_interval<C: SequenceClient + ?Sized>(
    start: Option<SequencePlace>,
    end: Option<SequencePlace>,
    client: &mut C,
) -> Result<SequenceInterval, UsageError> {
    create_sequence_interval(
        "transient",
        None,
        start,
        end,
        client,
        interval_type::TRANSIENT,
        RefOrigin::Transient,
        false,
        None,
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mergetree::place::Side;
    use crate::mergetree::text_client::TextMergeTree;

    fn setup() -> TextMergeTree {
        TextMergeTree::with_text("hello world")
    }

    #[test]
    fn op_references_must_slide() {
        let mut tree = setup();
        let err = create_position_reference(
            &mut tree,
            SequencePosition::Index(0),
            ref_type::RANGE_BEGIN | ref_type::STAY_ON_REMOVE,
            RefOrigin::Op {
                ref_seq: 1,
                client_id: 2,
            },
            SlidingPreference::Forward,
            true,
            false,
        )
        .unwrap_err();
        assert_eq!(err, UsageError::OpReferenceMustSlideOnRemove);
    }

    #[test]
    fn local_references_must_not_slide() {
        let mut tree = setup();
        let err = create_position_reference(
            &mut tree,
            SequencePosition::Index(0),
            ref_type::RANGE_BEGIN | ref_type::SLIDE_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            SlidingPreference::Forward,
            true,
            false,
        )
        .unwrap_err();
        assert_eq!(err, UsageError::LocalReferenceMustStayOnRemove);
    }

    #[test]
    fn local_reference_past_the_end_needs_a_segment() {
        let mut tree = setup();
        let err = create_position_reference(
            &mut tree,
            SequencePosition::Index(99),
            ref_type::RANGE_BEGIN | ref_type::STAY_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            SlidingPreference::Forward,
            true,
            false,
        )
        .unwrap_err();
        assert_eq!(err, UsageError::NonTransientReferenceNeedsSegment);
    }

    #[test]
    fn op_reference_past_the_end_detaches() {
        let mut tree = setup();
        let r = create_position_reference(
            &mut tree,
            SequencePosition::Index(99),
            ref_type::RANGE_BEGIN | ref_type::SLIDE_ON_REMOVE,
            RefOrigin::Op {
                ref_seq: 1,
                client_id: 2,
            },
            SlidingPreference::Forward,
            true,
            false,
        )
        .expect("op origin may detach");
        assert_eq!(r.anchor(), RefAnchor::Detached);
    }

    #[test]
    fn transient_reference_past_the_end_detaches() {
        let mut tree = setup();
        let r = create_position_reference(
            &mut tree,
            SequencePosition::Index(99),
            ref_type::RANGE_BEGIN | ref_type::TRANSIENT,
            RefOrigin::Transient,
            SlidingPreference::Forward,
            false,
            false,
        )
        .expect("transient refs may detach");
        assert_eq!(r.anchor(), RefAnchor::Detached);
    }

    #[test]
    fn sentinel_positions_pass_through() {
        let mut tree = setup();
        let r = create_position_reference(
            &mut tree,
            SequencePosition::Start,
            ref_type::RANGE_BEGIN | ref_type::STAY_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            SlidingPreference::Backward,
            true,
            false,
        )
        .expect("sentinels always resolve");
        assert_eq!(r.anchor(), RefAnchor::StartOfSequence);
    }

    #[test]
    fn local_interval_endpoints_stay_on_remove() {
        let mut tree = setup();
        let i = create_sequence_interval(
            "x",
            None,
            Some(SequencePlace::Pos(0)),
            Some(SequencePlace::Pos(5)),
            &mut tree,
            interval_type::SLIDE_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            false,
            None,
        )
        .expect("interval must build");
        assert!(i.start.has_ref_type(ref_type::RANGE_BEGIN));
        assert!(i.end.has_ref_type(ref_type::RANGE_END));
        for endpoint in [&i.start, &i.end] {
            assert!(endpoint.has_ref_type(ref_type::STAY_ON_REMOVE));
            assert!(!endpoint.has_ref_type(ref_type::SLIDE_ON_REMOVE));
        }
    }

    #[test]
    fn op_interval_endpoints_slide_on_remove() {
        let mut tree = setup();
        let i = create_sequence_interval(
            "x",
            None,
            Some(SequencePlace::Pos(0)),
            Some(SequencePlace::Pos(5)),
            &mut tree,
            interval_type::SLIDE_ON_REMOVE,
            RefOrigin::Op {
                ref_seq: 3,
                client_id: 7,
            },
            false,
            None,
        )
        .expect("interval must build");
        for endpoint in [&i.start, &i.end] {
            assert!(endpoint.has_ref_type(ref_type::SLIDE_ON_REMOVE));
            assert!(!endpoint.has_ref_type(ref_type::STAY_ON_REMOVE));
        }
    }

    #[test]
    fn default_sides_derive_end_sticky_preferences() {
        let mut tree = setup();
        let i = create_sequence_interval(
            "x",
            None,
            Some(SequencePlace::Pos(0)),
            Some(SequencePlace::Pos(5)),
            &mut tree,
            interval_type::SLIDE_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            false,
            None,
        )
        .expect("interval must build");
        // (Before, Before) endpoints: both references chase content
        // forward; only the end may land on the end sentinel.
        assert_eq!(i.start.sliding_preference(), SlidingPreference::Forward);
        assert!(!i.start.can_slide_to_endpoint());
        assert_eq!(i.end.sliding_preference(), SlidingPreference::Forward);
        assert!(i.end.can_slide_to_endpoint());
    }

    #[test]
    fn endpoints_carry_the_collection_label() {
        let mut tree = setup();
        let i = create_sequence_interval(
            "comments",
            None,
            Some(SequencePlace::Pos(1)),
            Some(SequencePlace::Pos(4)),
            &mut tree,
            interval_type::SLIDE_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            false,
            None,
        )
        .expect("interval must build");
        for endpoint in [&i.start, &i.end] {
            let bag = endpoint.properties().expect("label bag must exist");
            assert_eq!(
                bag.get(REFERENCE_RANGE_LABELS_PROP),
                Some(&json!(["comments"]))
            );
        }
    }

    #[test]
    fn missing_places_cling_to_the_sequence_ends() {
        let mut tree = setup();
        let i = create_sequence_interval(
            "x",
            None,
            None,
            None,
            &mut tree,
            interval_type::SLIDE_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            false,
            None,
        )
        .expect("interval must build");
        assert_eq!(i.start.anchor(), RefAnchor::StartOfSequence);
        assert_eq!(i.end.anchor(), RefAnchor::EndOfSequence);
    }

    #[test]
    fn transient_interval_is_flagged_throughout() {
        let mut tree = setup();
        let i = create_transient_interval(
            Some(SequencePlace::Pos(2)),
            Some(SequencePlace::Pos(6)),
            &mut tree,
        )
        .expect("interval must build");
        assert!(i.is_transient());
        for endpoint in [&i.start, &i.end] {
            assert!(endpoint.has_ref_type(ref_type::TRANSIENT));
            assert!(!endpoint.has_ref_type(ref_type::SLIDE_ON_REMOVE));
            assert!(!endpoint.has_ref_type(ref_type::STAY_ON_REMOVE));
        }
    }

    #[test]
    fn mid_side_interior_places_set_interval_sides() {
        let mut tree = setup();
        let i = create_sequence_interval(
            "x",
            None,
            Some(SequencePlace::Interior(2, Side::After)),
            Some(SequencePlace::Interior(9, Side::Before)),
            &mut tree,
            interval_type::SLIDE_ON_REMOVE,
            RefOrigin::Local { local_seq: None },
            false,
            None,
        )
        .expect("interval must build");
        assert_eq!(i.start_side, Side::After);
        assert_eq!(i.end_side, Side::Before);
        // Full stickiness: start clings backward, end clings forward.
        assert_eq!(i.start.sliding_preference(), SlidingPreference::Backward);
        assert!(i.start.can_slide_to_endpoint());
        assert_eq!(i.end.sliding_preference(), SlidingPreference::Forward);
        assert!(i.end.can_slide_to_endpoint());
    }
}
