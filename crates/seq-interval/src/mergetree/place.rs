//! Logical positions and endpoint sides.
//!
//! A position in the sequence is either a character index or one of two
//! virtual sentinels just before / just after the entire sequence.  An
//! endpoint request additionally carries a [`Side`] saying which side of
//! the character the endpoint logically sits at.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Side ──────────────────────────────────────────────────────────────────

/// Which side of a character position an endpoint logically sits at.
///
/// When characters are inserted at an interval boundary, the side decides
/// whether the new characters fall inside or outside the interval:
///
/// - `Before`: the endpoint sits to the *left* of the character.
/// - `After`:  the endpoint sits to the *right* of the character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    Before = 0,
    After = 1,
}

// ── SequencePosition ──────────────────────────────────────────────────────

/// A logical position: a character index, or a sentinel clinging to one
/// end of the whole sequence.
///
/// On the wire this is a JSON number or one of the strings `"start"` /
/// `"end"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequencePosition {
    Index(usize),
    /// The virtual position immediately before the entire sequence.
    Start,
    /// The virtual position immediately after the entire sequence.
    End,
}

impl SequencePosition {
    /// `true` for the `"start"` / `"end"` sentinels.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, SequencePosition::Index(_))
    }
}

impl fmt::Display for SequencePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencePosition::Index(n) => write!(f, "{n}"),
            SequencePosition::Start => f.write_str("start"),
            SequencePosition::End => f.write_str("end"),
        }
    }
}

impl From<usize> for SequencePosition {
    fn from(n: usize) -> Self {
        SequencePosition::Index(n)
    }
}

impl Serialize for SequencePosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SequencePosition::Index(n) => serializer.serialize_u64(*n as u64),
            SequencePosition::Start => serializer.serialize_str("start"),
            SequencePosition::End => serializer.serialize_str("end"),
        }
    }
}

impl<'de> Deserialize<'de> for SequencePosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PosVisitor;

        impl Visitor<'_> for PosVisitor {
            type Value = SequencePosition;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer, \"start\", or \"end\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(SequencePosition::Index(v as usize))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                if v < 0 {
                    return Err(E::custom("position index cannot be negative"));
                }
                Ok(SequencePosition::Index(v as usize))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                match v {
                    "start" => Ok(SequencePosition::Start),
                    "end" => Ok(SequencePosition::End),
                    other => Err(E::custom(format!("unknown position sentinel: {other:?}"))),
                }
            }
        }

        deserializer.deserialize_any(PosVisitor)
    }
}

// ── SequencePlace ─────────────────────────────────────────────────────────

/// A caller-facing endpoint request: a bare index (side defaults to
/// `Before`), a sentinel, or an interior `(index, side)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePlace {
    Pos(usize),
    Start,
    End,
    Interior(usize, Side),
}

impl SequencePlace {
    /// Split the place into its `(position, side)` parts.
    pub fn pos_and_side(&self) -> (SequencePosition, Side) {
        match *self {
            SequencePlace::Pos(n) => (SequencePosition::Index(n), Side::Before),
            SequencePlace::Start => (SequencePosition::Start, Side::Before),
            SequencePlace::End => (SequencePosition::End, Side::Before),
            SequencePlace::Interior(n, side) => (SequencePosition::Index(n), side),
        }
    }
}

impl From<usize> for SequencePlace {
    fn from(n: usize) -> Self {
        SequencePlace::Pos(n)
    }
}

impl From<(usize, Side)> for SequencePlace {
    fn from((pos, side): (usize, Side)) -> Self {
        SequencePlace::Interior(pos, side)
    }
}

impl From<SequencePosition> for SequencePlace {
    fn from(pos: SequencePosition) -> Self {
        match pos {
            SequencePosition::Index(n) => SequencePlace::Pos(n),
            SequencePosition::Start => SequencePlace::Start,
            SequencePosition::End => SequencePlace::End,
        }
    }
}

/// Normalize optional endpoint places into
/// `(startPos, startSide, endPos, endSide)` parts, leaving `None` where
/// the caller supplied no place (meaning "keep the current endpoint").
pub fn endpoint_pos_and_side(
    start: Option<SequencePlace>,
    end: Option<SequencePlace>,
) -> (
    Option<SequencePosition>,
    Option<Side>,
    Option<SequencePosition>,
    Option<Side>,
) {
    let (start_pos, start_side) = match start {
        Some(place) => {
            let (pos, side) = place.pos_and_side();
            (Some(pos), Some(side))
        }
        None => (None, None),
    };
    let (end_pos, end_side) = match end {
        Some(place) => {
            let (pos, side) = place.pos_and_side();
            (Some(pos), Some(side))
        }
        None => (None, None),
    };
    (start_pos, start_side, end_pos, end_side)
}

// ── Tests ─────────────────────────────────────────────────────────────────
