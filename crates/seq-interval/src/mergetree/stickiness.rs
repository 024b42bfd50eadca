//! Endpoint stickiness and the sliding preferences derived from it.
//!
//! Stickiness says whether content inserted exactly at an interval
//! boundary lands inside or outside the interval.  It is never stored:
//! it is derived from the endpoint positions and sides, and in turn
//! determines which direction each endpoint reference slides when its
//! anchoring segment is removed.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::place::{SequencePosition, Side};
use super::reference::SlidingPreference;

// ── Stickiness ────────────────────────────────────────────────────────────

/// Whether an interval's start, end, both, or neither endpoint sticks to
/// content inserted at the boundary.
///
/// Bit 0 is start-stickiness, bit 1 is end-stickiness.  Serializes as its
/// numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Stickiness {
    None = 0,
    Start = 1,
    End = 2,
    Full = 3,
}

impl Stickiness {
    pub fn sticks_at_start(&self) -> bool {
        (*self as u8) & (Stickiness::Start as u8) != 0
    }

    pub fn sticks_at_end(&self) -> bool {
        (*self as u8) & (Stickiness::End as u8) != 0
    }
}

impl TryFrom<u8> for Stickiness {
    type Error = ();
    fn try_from(n: u8) -> Result<Self, ()> {
        match n {
            0 => Ok(Stickiness::None),
            1 => Ok(Stickiness::Start),
            2 => Ok(Stickiness::End),
            3 => Ok(Stickiness::Full),
            _ => Err(()),
        }
    }
}

impl Serialize for Stickiness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Stickiness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StickinessVisitor;

        impl Visitor<'_> for StickinessVisitor {
            type Value = Stickiness;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a stickiness value in 0..=3")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(|n| Stickiness::try_from(n).ok())
                    .ok_or_else(|| E::custom(format!("invalid stickiness: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                if v < 0 {
                    return Err(E::custom(format!("invalid stickiness: {v}")));
                }
                self.visit_u64(v as u64)
            }
        }

        deserializer.deserialize_any(StickinessVisitor)
    }
}

// ── Derivation ────────────────────────────────────────────────────────────

/// Derive stickiness from the endpoint positions and sides.
///
/// The start sticks when it sits after its character (inserts at the
/// boundary extend the interval leftward-adjacent content into it) or
/// clings to the `"start"` sentinel; the end sticks when it sits before
/// its character or clings to `"end"`.  `None` positions (an endpoint
/// being left unchanged by a modification) contribute only their side.
pub fn compute_stickiness_from_side(
    start_pos: Option<SequencePosition>,
    start_side: Side,
    end_pos: Option<SequencePosition>,
    end_side: Side,
) -> Stickiness {
    let start_sticky =
        start_side == Side::After || matches!(start_pos, Some(SequencePosition::Start));
    let end_sticky = end_side == Side::Before || matches!(end_pos, Some(SequencePosition::End));
    match (start_sticky, end_sticky) {
        (false, false) => Stickiness::None,
        (true, false) => Stickiness::Start,
        (false, true) => Stickiness::End,
        (true, true) => Stickiness::Full,
    }
}

/// Direction the start reference slides when its segment is removed.
///
/// A sticky start clings to content on its left, so it slides backward;
/// otherwise it chases the surviving content on its right.
pub fn start_reference_sliding_preference(stickiness: Stickiness) -> SlidingPreference {
    if stickiness.sticks_at_start() {
        SlidingPreference::Backward
    } else {
        SlidingPreference::Forward
    }
}

/// Direction the end reference slides when its segment is removed.
pub fn end_reference_sliding_preference(stickiness: Stickiness) -> SlidingPreference {
    if stickiness.sticks_at_end() {
        SlidingPreference::Forward
    } else {
        SlidingPreference::Backward
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
