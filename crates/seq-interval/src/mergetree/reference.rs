//! Local reference positions — relocatable handles into the sequence.
//!
//! A reference is anchored to a character (segment + offset) or to one of
//! the virtual sequence endpoints.  Unlike a plain index it survives
//! concurrent edits: when its anchoring segment is removed, a
//! slide-on-remove reference relocates to a surviving neighbor in the
//! direction of its [`SlidingPreference`], while a stay-on-remove
//! reference keeps pointing at the removed segment's slot.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::PropertySet;

/// Identifies a segment within its owning sequence.
pub type SegmentId = u64;

// ── Reference type flags ──────────────────────────────────────────────────

/// Bitset describing what a reference is and how it reacts to removal of
/// its anchoring segment.
///
/// `SLIDE_ON_REMOVE` and `STAY_ON_REMOVE` are mutually exclusive at any
/// moment; the construction sites enforce this, not the type.
pub mod ref_type {
    pub const NONE: u32 = 0;
    /// The begin endpoint of an interval.
    pub const RANGE_BEGIN: u32 = 1 << 0;
    /// The end endpoint of an interval.
    pub const RANGE_END: u32 = 1 << 1;
    /// Relocates to a surviving segment when the anchor is removed.
    pub const SLIDE_ON_REMOVE: u32 = 1 << 2;
    /// Keeps pointing at the removed segment's slot.  Used for pending
    /// local creations whose op has not been acknowledged yet.
    pub const STAY_ON_REMOVE: u32 = 1 << 3;
    /// Ephemeral; detaches instead of sliding and is never acked.
    pub const TRANSIENT: u32 = 1 << 4;
}

/// Direction a reference relocates when its anchoring segment is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SlidingPreference {
    Forward = 0,
    Backward = 1,
}

// ── RefAnchor ─────────────────────────────────────────────────────────────

/// Where a reference is currently attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefAnchor {
    /// Not attached to anything.  Arises for references created against
    /// content that is not (yet) present locally, and for transient
    /// references whose segment was removed.
    Detached,
    /// The virtual position before the entire sequence.
    StartOfSequence,
    /// The virtual position after the entire sequence.
    EndOfSequence,
    /// Offset `offset` within the identified segment.
    Segment { segment: SegmentId, offset: usize },
}

// ── LocalReferencePosition ────────────────────────────────────────────────

/// Callback invoked around a reference slide.
pub type SlideCallback = Rc<dyn Fn()>;

struct RefState {
    anchor: RefAnchor,
    ref_type: u32,
    sliding: SlidingPreference,
    can_slide_to_endpoint: bool,
    properties: Option<PropertySet>,
    before_slide: Option<SlideCallback>,
    after_slide: Option<SlideCallback>,
}

/// A relocatable handle to a position in the sequence.
///
/// Clones are cheap and share state; identity is pointer identity
/// ([`LocalReferencePosition::same`]).  Numeric resolution requires the
/// owning client, which is also the only party that re-anchors the
/// reference.
#[derive(Clone)]
pub struct LocalReferencePosition {
    state: Rc<RefCell<RefState>>,
}

impl LocalReferencePosition {
    pub(crate) fn new(
        anchor: RefAnchor,
        ref_type: u32,
        sliding: SlidingPreference,
        can_slide_to_endpoint: bool,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(RefState {
                anchor,
                ref_type,
                sliding,
                can_slide_to_endpoint,
                properties: None,
                before_slide: None,
                after_slide: None,
            })),
        }
    }

    /// `true` when `a` and `b` are the same underlying reference.
    pub fn same(a: &LocalReferencePosition, b: &LocalReferencePosition) -> bool {
        Rc::ptr_eq(&a.state, &b.state)
    }

    pub fn anchor(&self) -> RefAnchor {
        self.state.borrow().anchor
    }

    pub(crate) fn set_anchor(&self, anchor: RefAnchor) {
        self.state.borrow_mut().anchor = anchor;
    }

    pub fn ref_type(&self) -> u32 {
        self.state.borrow().ref_type
    }

    /// `true` when any of the given flags is set.
    pub fn has_ref_type(&self, flags: u32) -> bool {
        self.state.borrow().ref_type & flags != 0
    }

    pub fn sliding_preference(&self) -> SlidingPreference {
        self.state.borrow().sliding
    }

    pub fn can_slide_to_endpoint(&self) -> bool {
        self.state.borrow().can_slide_to_endpoint
    }

    /// The acknowledgement transition: a pending stay-on-remove reference
    /// becomes slide-on-remove once its creation op is sequenced.
    pub fn set_slide_on_remove(&self) {
        let mut state = self.state.borrow_mut();
        if state.ref_type & ref_type::TRANSIENT != 0 {
            return;
        }
        state.ref_type = (state.ref_type & !ref_type::STAY_ON_REMOVE) | ref_type::SLIDE_ON_REMOVE;
        trace!(ref_type = state.ref_type, "reference acked to slide-on-remove");
    }

    /// A copy of the reference's property bag, if any.
    pub fn properties(&self) -> Option<PropertySet> {
        self.state.borrow().properties.clone()
    }

    /// Merge `props` into the reference's property bag.
    pub fn add_properties(&self, props: &PropertySet) {
        let mut state = self.state.borrow_mut();
        let bag = state.properties.get_or_insert_with(PropertySet::new);
        for (key, value) in props {
            bag.insert(key.clone(), value.clone());
        }
    }

    /// Install or clear the slide callbacks.
    pub fn set_callbacks(&self, before: Option<SlideCallback>, after: Option<SlideCallback>) {
        let mut state = self.state.borrow_mut();
        state.before_slide = before;
        state.after_slide = after;
    }

    pub fn has_callbacks(&self) -> bool {
        let state = self.state.borrow();
        state.before_slide.is_some() || state.after_slide.is_some()
    }

    pub(crate) fn invoke_before_slide(&self) {
        // Clone the callback out so the state borrow is released before
        // user code runs.
        let cb = self.state.borrow().before_slide.clone();
        if let Some(cb) = cb {
            cb();
        }
    }

    pub(crate) fn invoke_after_slide(&self) {
        let cb = self.state.borrow().after_slide.clone();
        if let Some(cb) = cb {
            cb();
        }
    }
}

impl fmt::Debug for LocalReferencePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("LocalReferencePosition")
            .field("anchor", &state.anchor)
            .field("ref_type", &format_args!("{:#07b}", state.ref_type))
            .field("sliding", &state.sliding)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
