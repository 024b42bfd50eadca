//! A minimal in-memory sequence implementing [`SequenceClient`].
//!
//! Uses a simple `Vec` of segments with removal tombstones instead of a
//! balanced tree.  This gives O(n) per operation instead of O(log n),
//! which is correct but not optimised for large documents.  Removed
//! segments stay in the list so stay-on-remove references keep a slot to
//! resolve against.

use std::cmp::Ordering;

use tracing::trace;

use super::client::{ResolveContext, SegmentOffset, SeqNumber, SequenceClient};
use super::reference::{
    ref_type, LocalReferencePosition, RefAnchor, SegmentId, SlidingPreference,
};
use crate::PropertySet;

// ── Segment ───────────────────────────────────────────────────────────────

/// One contiguous run of characters, the atomic unit of removal.
#[derive(Debug)]
struct Segment {
    id: SegmentId,
    text: String,
    removed: bool,
    /// References currently anchored inside this segment.
    refs: Vec<LocalReferencePosition>,
}

impl Segment {
    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Characters this segment contributes to the visible sequence.
    fn live_len(&self) -> usize {
        if self.removed {
            0
        } else {
            self.char_len()
        }
    }
}

// ── TextMergeTree ─────────────────────────────────────────────────────────

/// A single-site sequence of character segments with relocatable
/// references.
#[derive(Debug, Default)]
pub struct TextMergeTree {
    segments: Vec<Segment>,
    next_segment_id: SegmentId,
    seq: SeqNumber,
    collaborating: bool,
}

impl TextMergeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence pre-populated with `text` as a single segment.
    pub fn with_text(text: &str) -> Self {
        let mut tree = Self::new();
        tree.insert_text(0, text);
        tree
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// The visible text.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| !s.removed)
            .map(|s| s.text.as_str())
            .collect()
    }

    /// Number of visible characters.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Segment::live_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Insert `text` so that it starts at visible position `pos`.
    /// Positions past the end append.
    pub fn insert_text(&mut self, pos: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let pos = pos.min(self.len());
        let idx = self.split_at(pos);
        let id = self.alloc_segment_id();
        self.segments.insert(
            idx,
            Segment {
                id,
                text: text.to_string(),
                removed: false,
                refs: Vec::new(),
            },
        );
    }

    /// Remove the visible range `[start, end)`, relocating references per
    /// their reference type and sliding preference.
    pub fn remove_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.len());
        if end <= start {
            return;
        }
        let first = self.split_at(start);
        let last = self.split_at(end);

        let mut newly_removed = Vec::new();
        for i in first..last {
            if !self.segments[i].removed {
                self.segments[i].removed = true;
                newly_removed.push(i);
            }
        }
        for &i in &newly_removed {
            self.relocate_refs_on_removed(i);
        }
    }

    // ── Collab window ─────────────────────────────────────────────────────

    pub fn set_collaborating(&mut self, collaborating: bool) {
        self.collaborating = collaborating;
    }

    /// Record that ops up to `seq` have been observed.
    pub fn advance_seq(&mut self, seq: SeqNumber) {
        if seq > self.seq {
            self.seq = seq;
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn alloc_segment_id(&mut self) -> SegmentId {
        self.next_segment_id += 1;
        self.next_segment_id
    }

    fn segment_index(&self, id: SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }

    /// Ensure a segment boundary exists at visible position `pos` and
    /// return the index of the segment starting there
    /// (`segments.len()` when `pos` equals the visible length).
    fn split_at(&mut self, pos: usize) -> usize {
        let mut acc = 0;
        for i in 0..self.segments.len() {
            let live = self.segments[i].live_len();
            if acc + live > pos {
                let offset = pos - acc;
                if offset > 0 {
                    self.split_segment(i, offset);
                    return i + 1;
                }
                return i;
            }
            acc += live;
        }
        self.segments.len()
    }

    /// Split segment `i` at character `offset`, redistributing anchored
    /// references onto the piece that still contains their character.
    fn split_segment(&mut self, i: usize, offset: usize) {
        let new_id = self.alloc_segment_id();
        let seg = &mut self.segments[i];
        let byte = seg
            .text
            .char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(seg.text.len());
        let suffix = seg.text.split_off(byte);
        let removed = seg.removed;

        let mut moved = Vec::new();
        seg.refs.retain(|r| match r.anchor() {
            RefAnchor::Segment { offset: ro, .. } if ro >= offset => {
                moved.push(r.clone());
                false
            }
            _ => true,
        });
        for r in &moved {
            if let RefAnchor::Segment { offset: ro, .. } = r.anchor() {
                r.set_anchor(RefAnchor::Segment {
                    segment: new_id,
                    offset: ro - offset,
                });
            }
        }

        self.segments.insert(
            i + 1,
            Segment {
                id: new_id,
                text: suffix,
                removed,
                refs: moved,
            },
        );
    }

    /// Relocate every reference on the newly removed segment `i`.
    fn relocate_refs_on_removed(&mut self, i: usize) {
        let refs = std::mem::take(&mut self.segments[i].refs);
        let mut staying = Vec::new();
        for r in refs {
            if r.has_ref_type(ref_type::TRANSIENT) {
                r.set_anchor(RefAnchor::Detached);
                continue;
            }
            if !r.has_ref_type(ref_type::SLIDE_ON_REMOVE) {
                // Stay-on-remove references keep their slot in the
                // removed segment until acked.
                staying.push(r);
                continue;
            }
            let landing =
                self.slide_from_index(i, r.sliding_preference(), r.can_slide_to_endpoint());
            r.invoke_before_slide();
            trace!(?landing, "reference sliding off removed segment");
            match landing {
                Some(RefAnchor::Segment { segment, offset }) => {
                    r.set_anchor(RefAnchor::Segment { segment, offset });
                    if let Some(target) = self.segment_index(segment) {
                        self.segments[target].refs.push(r.clone());
                    }
                }
                Some(anchor) => r.set_anchor(anchor),
                None => r.set_anchor(RefAnchor::Detached),
            }
            r.invoke_after_slide();
        }
        self.segments[i].refs = staying;
    }

    /// Landing spot for a reference sliding off segment `i`.
    fn slide_from_index(
        &self,
        i: usize,
        sliding: SlidingPreference,
        can_slide_to_endpoint: bool,
    ) -> Option<RefAnchor> {
        let next_live = |from: usize| {
            (from + 1..self.segments.len()).find(|&j| !self.segments[j].removed)
        };
        let prev_live = |from: usize| (0..from).rev().find(|&j| !self.segments[j].removed);

        match sliding {
            SlidingPreference::Forward => {
                if let Some(j) = next_live(i) {
                    return Some(RefAnchor::Segment {
                        segment: self.segments[j].id,
                        offset: 0,
                    });
                }
                if can_slide_to_endpoint {
                    return Some(RefAnchor::EndOfSequence);
                }
                prev_live(i).map(|j| RefAnchor::Segment {
                    segment: self.segments[j].id,
                    offset: self.segments[j].char_len() - 1,
                })
            }
            SlidingPreference::Backward => {
                if let Some(j) = prev_live(i) {
                    return Some(RefAnchor::Segment {
                        segment: self.segments[j].id,
                        offset: self.segments[j].char_len() - 1,
                    });
                }
                if can_slide_to_endpoint {
                    return Some(RefAnchor::StartOfSequence);
                }
                next_live(i).map(|j| RefAnchor::Segment {
                    segment: self.segments[j].id,
                    offset: 0,
                })
            }
        }
    }

    fn position_of_anchor(&self, anchor: RefAnchor) -> usize {
        match anchor {
            RefAnchor::Detached | RefAnchor::StartOfSequence => 0,
            RefAnchor::EndOfSequence => self.len(),
            RefAnchor::Segment { segment, offset } => {
                let Some(idx) = self.segment_index(segment) else {
                    return 0;
                };
                let before: usize = self.segments[..idx].iter().map(Segment::live_len).sum();
                if self.segments[idx].removed {
                    before
                } else {
                    before + offset
                }
            }
        }
    }

    /// Total order key: detached, then start, then segments in document
    /// order, then end.
    fn rank(&self, anchor: RefAnchor) -> (u8, usize, usize) {
        match anchor {
            RefAnchor::Detached => (0, 0, 0),
            RefAnchor::StartOfSequence => (1, 0, 0),
            RefAnchor::Segment { segment, offset } => {
                (2, self.segment_index(segment).unwrap_or(0), offset)
            }
            RefAnchor::EndOfSequence => (3, 0, 0),
        }
    }
}

impl SequenceClient for TextMergeTree {
    fn create_local_reference_position(
        &mut self,
        anchor: RefAnchor,
        ref_type: u32,
        properties: Option<PropertySet>,
        sliding: SlidingPreference,
        can_slide_to_endpoint: bool,
    ) -> LocalReferencePosition {
        let reference =
            LocalReferencePosition::new(anchor, ref_type, sliding, can_slide_to_endpoint);
        if let Some(props) = properties {
            reference.add_properties(&props);
        }
        if let RefAnchor::Segment { segment, .. } = anchor {
            if let Some(idx) = self.segment_index(segment) {
                self.segments[idx].refs.push(reference.clone());
            }
        }
        reference
    }

    fn create_detached_local_reference_position(
        &mut self,
        sliding: SlidingPreference,
        ref_type: u32,
    ) -> LocalReferencePosition {
        LocalReferencePosition::new(RefAnchor::Detached, ref_type, sliding, false)
    }

    fn get_containing_segment(
        &self,
        pos: usize,
        _ctx: ResolveContext,
    ) -> Option<SegmentOffset> {
        // A single-site sequence has one view; the context only matters
        // for clients that keep per-perspective state.
        let mut acc = 0;
        for seg in &self.segments {
            let live = seg.live_len();
            if acc + live > pos {
                return Some(SegmentOffset {
                    segment: seg.id,
                    offset: pos - acc,
                });
            }
            acc += live;
        }
        None
    }

    fn slide_to_segment(
        &self,
        segoff: SegmentOffset,
        sliding: SlidingPreference,
        use_new_sliding_behavior: bool,
    ) -> Option<RefAnchor> {
        let idx = self.segment_index(segoff.segment)?;
        if !self.segments[idx].removed {
            return Some(RefAnchor::Segment {
                segment: segoff.segment,
                offset: segoff.offset,
            });
        }
        self.slide_from_index(idx, sliding, use_new_sliding_behavior)
    }

    fn local_reference_position_to_position(&self, reference: &LocalReferencePosition) -> usize {
        self.position_of_anchor(reference.anchor())
    }

    fn compare_reference_positions(
        &self,
        a: &LocalReferencePosition,
        b: &LocalReferencePosition,
    ) -> Ordering {
        self.rank(a.anchor()).cmp(&self.rank(b.anchor()))
    }

    fn current_seq(&self) -> SeqNumber {
        self.seq
    }

    fn is_collaborating(&self) -> bool {
        self.collaborating
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
