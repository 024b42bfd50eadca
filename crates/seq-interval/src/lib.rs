//! seq-interval — collaborative intervals over a concurrently edited
//! character sequence.
//!
//! Attaches labeled ranges ("intervals") to positions in a mutable
//! sequence and preserves each interval's intended meaning across remote
//! edits that insert or delete characters around, inside, or across its
//! endpoints.  Interval endpoints are [`mergetree::LocalReferencePosition`]s
//! anchored to segments of the sequence; when an anchoring segment is
//! removed the reference *slides* to a surviving neighbor, directed by a
//! sliding preference derived from the interval's endpoint sides.
//!
//! The sequence itself is consumed through the [`mergetree::SequenceClient`]
//! trait; [`mergetree::TextMergeTree`] is a simple in-memory implementation
//! suitable for tests and single-site use.

pub mod error;
pub mod intervals;
pub mod mergetree;

pub use error::UsageError;
pub use intervals::factory::{
    create_sequence_interval, create_transient_interval, RefOrigin, SequencedOp,
};
pub use intervals::interval::SequenceInterval;
pub use intervals::serialized::{
    from_serialized, get_serialized_properties, SerializedInterval, SerializedIntervalDelta,
    SerializedProperties,
};
pub use mergetree::client::SequenceClient;
pub use mergetree::text_client::TextMergeTree;

/// Arbitrary user properties attached to intervals and references.
pub type PropertySet = serde_json::Map<String, serde_json::Value>;
