//! The sequence side of the interval subsystem: positions, sides,
//! stickiness, relocatable references, and the collaborator surface the
//! interval core consumes.

pub mod client;
pub mod place;
pub mod reference;
pub mod stickiness;
pub mod text_client;

pub use client::{
    max_reference_position, min_reference_position, ResolveContext, SegmentOffset, SeqNumber,
    SequenceClient, UNASSIGNED_SEQUENCE_NUMBER, UNIVERSAL_SEQUENCE_NUMBER,
};
pub use place::{endpoint_pos_and_side, SequencePlace, SequencePosition, Side};
pub use reference::{
    ref_type, LocalReferencePosition, RefAnchor, SegmentId, SlideCallback, SlidingPreference,
};
pub use stickiness::{
    compute_stickiness_from_side, end_reference_sliding_preference,
    start_reference_sliding_preference, Stickiness,
};
pub use text_client::TextMergeTree;
