//! The collaborator surface the interval core consumes.
//!
//! The sequence itself (segment storage, position bookkeeping, sliding
//! mechanics) lives behind [`SequenceClient`]; the interval core only
//! dictates how references are configured and asks the client to create,
//! resolve, and compare them.  Interval operations therefore take the
//! client as an explicit argument rather than holding a borrow.

use std::cmp::Ordering;

use super::reference::{LocalReferencePosition, RefAnchor, SegmentId, SlidingPreference};
use crate::PropertySet;

/// Op sequence number.  Negative values are reserved sentinels.
pub type SeqNumber = i64;

/// Sequence number of local changes that have not been acknowledged yet.
pub const UNASSIGNED_SEQUENCE_NUMBER: SeqNumber = -1;

/// Sequence number applied to changes made while not collaborating.
pub const UNIVERSAL_SEQUENCE_NUMBER: SeqNumber = 0;

// ── Resolution inputs ─────────────────────────────────────────────────────

/// A resolved `(segment, offset)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOffset {
    pub segment: SegmentId,
    pub offset: usize,
}

/// Which view of the sequence a position resolves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveContext {
    /// The current session-space view.
    Current,
    /// The view a remote op was generated against.
    Remote {
        ref_seq: SeqNumber,
        client_id: u64,
    },
    /// The view as of a pending local change.
    Local { local_seq: SeqNumber },
}

// ── SequenceClient ────────────────────────────────────────────────────────

/// Capabilities the interval core requires of the underlying sequence.
pub trait SequenceClient {
    /// Create a reference attached at `anchor`, registering it so the
    /// sequence can relocate it when segments are removed.
    fn create_local_reference_position(
        &mut self,
        anchor: RefAnchor,
        ref_type: u32,
        properties: Option<PropertySet>,
        sliding: SlidingPreference,
        can_slide_to_endpoint: bool,
    ) -> LocalReferencePosition;

    /// Create a reference that is not attached anywhere yet.  It will
    /// attach when the content it refers to materializes.
    fn create_detached_local_reference_position(
        &mut self,
        sliding: SlidingPreference,
        ref_type: u32,
    ) -> LocalReferencePosition;

    /// Resolve a numeric position to its containing segment in the given
    /// view.  `None` when the position is outside the sequence.
    fn get_containing_segment(&self, pos: usize, ctx: ResolveContext)
        -> Option<SegmentOffset>;

    /// Where a reference at `segoff` ends up after the segment's removal,
    /// sliding in the given direction.  `use_new_sliding_behavior` allows
    /// landing on the sequence sentinels instead of reversing direction
    /// when the preferred direction is exhausted.
    fn slide_to_segment(
        &self,
        segoff: SegmentOffset,
        sliding: SlidingPreference,
        use_new_sliding_behavior: bool,
    ) -> Option<RefAnchor>;

    /// The reference's numeric position in the current view.
    fn local_reference_position_to_position(&self, reference: &LocalReferencePosition) -> usize;

    /// Document order over references.
    fn compare_reference_positions(
        &self,
        a: &LocalReferencePosition,
        b: &LocalReferencePosition,
    ) -> Ordering;

    /// The latest sequence number this client has observed.
    fn current_seq(&self) -> SeqNumber;

    /// `true` when attached to a collaboration session.
    fn is_collaborating(&self) -> bool;
}

/// Whichever reference compares smaller; `a` wins ties.
pub fn min_reference_position<'a, C: SequenceClient + ?Sized>(
    client: &C,
    a: &'a LocalReferencePosition,
    b: &'a LocalReferencePosition,
) -> &'a LocalReferencePosition {
    if client.compare_reference_positions(a, b) == Ordering::Greater {
        b
    } else {
        a
    }
}

/// Whichever reference compares greater; `a` wins ties.
pub fn max_reference_position<'a, C: SequenceClient + ?Sized>(
    client: &C,
    a: &'a LocalReferencePosition,
    b: &'a LocalReferencePosition,
) -> &'a LocalReferencePosition {
    if client.compare_reference_positions(a, b) == Ordering::Less {
        b
    } else {
        a
    }
}
