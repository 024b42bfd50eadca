//! Wire format for intervals.
//!
//! A serialized delta carries a property payload and, optionally, the
//! resolved endpoint positions and sides.  The interval id and the
//! owning collection's label ride inside the property payload under
//! reserved keys; they are extracted on deserialization and never appear
//! as user-visible properties.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::UsageError;
use crate::mergetree::client::{SeqNumber, SequenceClient};
use crate::mergetree::place::{SequencePlace, SequencePosition, Side};
use crate::mergetree::stickiness::Stickiness;
use crate::PropertySet;

use super::factory::{create_sequence_interval, RefOrigin};
use super::interval::{SequenceInterval, INTERVAL_ID_PROP, REFERENCE_RANGE_LABELS_PROP};

// ── Wire types ────────────────────────────────────────────────────────────

/// Wire form of an interval change: properties plus optional endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedIntervalDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<SequencePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<SequencePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_side: Option<Side>,
    pub interval_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stickiness: Option<Stickiness>,
    pub sequence_number: SeqNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertySet>,
}

/// A full serialization: a delta with every endpoint field populated.
pub type SerializedInterval = SerializedIntervalDelta;

// ── Reserved-key extraction ───────────────────────────────────────────────

/// Decomposition of a serialized interval's property payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedProperties {
    pub id: String,
    pub labels: Vec<String>,
    /// The remaining, user-visible properties.
    pub properties: PropertySet,
}

/// Extract the reserved keys from a serialized interval's property
/// payload.
///
/// Records written before interval ids existed synthesize
/// `"legacy<start>-<end>"`.  Records sharing identical endpoints
/// therefore share the synthesized id; that collision is tolerated here
/// and left to owning collections to disambiguate.
pub fn get_serialized_properties(serialized: &SerializedIntervalDelta) -> SerializedProperties {
    let mut properties = serialized.properties.clone().unwrap_or_default();
    let id = match properties.remove(INTERVAL_ID_PROP) {
        Some(Value::String(id)) => id,
        _ => legacy_interval_id(serialized),
    };
    let labels = match properties.remove(REFERENCE_RANGE_LABELS_PROP) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(label) => Some(label),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    SerializedProperties {
        id,
        labels,
        properties,
    }
}

fn legacy_interval_id(serialized: &SerializedIntervalDelta) -> String {
    format!(
        "legacy{}-{}",
        wire_position_text(serialized.start),
        wire_position_text(serialized.end)
    )
}

fn wire_position_text(pos: Option<SequencePosition>) -> String {
    match pos {
        Some(pos) => pos.to_string(),
        None => "none".to_string(),
    }
}

// ── Reconstruction ────────────────────────────────────────────────────────

/// Rebuild an interval from its wire form.
///
/// `origin` is an op origin for inbound remote records, or
/// [`RefOrigin::Snapshot`] when loading.  Unknown reserved content in
/// the payload is dropped silently.
pub fn from_serialized<C: SequenceClient + ?Sized>(
    client: &mut C,
    serialized: &SerializedInterval,
    origin: RefOrigin,
) -> Result<SequenceInterval, UsageError> {
    let SerializedProperties {
        id,
        labels,
        properties,
    } = get_serialized_properties(serialized);
    let label = labels.into_iter().next().unwrap_or_default();
    let start = wire_place(serialized.start, serialized.start_side);
    let end = wire_place(serialized.end, serialized.end_side);
    create_sequence_interval(
        &label,
        Some(id),
        start,
        end,
        client,
        serialized.interval_type,
        origin,
        false,
        Some(&properties),
    )
}

fn wire_place(pos: Option<SequencePosition>, side: Option<Side>) -> Option<SequencePlace> {
    let pos = pos?;
    Some(match (pos, side) {
        (SequencePosition::Index(n), Some(side)) => SequencePlace::Interior(n, side),
        (SequencePosition::Index(n), None) => SequencePlace::Pos(n),
        (SequencePosition::Start, _) => SequencePlace::Start,
        (SequencePosition::End, _) => SequencePlace::End,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(properties: Option<PropertySet>) -> SerializedIntervalDelta {
        SerializedIntervalDelta {
            start: Some(SequencePosition::Index(3)),
            end: Some(SequencePosition::Index(7)),
            start_side: None,
            end_side: None,
            interval_type: 2,
            stickiness: None,
            sequence_number: 0,
            properties,
        }
    }

    #[test]
    fn missing_id_synthesizes_legacy_id() {
        let parsed = get_serialized_properties(&record(Some(PropertySet::new())));
        assert_eq!(parsed.id, "legacy3-7");
        assert!(parsed.labels.is_empty());
        assert!(parsed.properties.is_empty());
    }

    #[test]
    fn legacy_id_is_deterministic() {
        let a = get_serialized_properties(&record(None));
        let b = get_serialized_properties(&record(None));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn legacy_id_uses_sentinel_tags() {
        let mut rec = record(None);
        rec.start = Some(SequencePosition::Start);
        rec.end = Some(SequencePosition::End);
        assert_eq!(get_serialized_properties(&rec).id, "legacystart-end");
    }

    #[test]
    fn reserved_keys_are_extracted() {
        let mut props = PropertySet::new();
        props.insert(INTERVAL_ID_PROP.into(), json!("abc"));
        props.insert(REFERENCE_RANGE_LABELS_PROP.into(), json!(["hl"]));
        props.insert("color".into(), json!("red"));
        let parsed = get_serialized_properties(&record(Some(props)));
        assert_eq!(parsed.id, "abc");
        assert_eq!(parsed.labels, vec!["hl".to_string()]);
        assert_eq!(parsed.properties.get("color"), Some(&json!("red")));
        assert!(parsed.properties.get(INTERVAL_ID_PROP).is_none());
    }

    #[test]
    fn malformed_reserved_values_fall_back() {
        let mut props = PropertySet::new();
        props.insert(INTERVAL_ID_PROP.into(), json!(42));
        props.insert(REFERENCE_RANGE_LABELS_PROP.into(), json!("not-a-list"));
        let parsed = get_serialized_properties(&record(Some(props)));
        assert_eq!(parsed.id, "legacy3-7");
        assert!(parsed.labels.is_empty());
    }

    #[test]
    fn wire_shape_uses_camel_case_fields() {
        let mut props = PropertySet::new();
        props.insert(INTERVAL_ID_PROP.into(), json!("abc"));
        let delta = SerializedIntervalDelta {
            start: Some(SequencePosition::Index(2)),
            end: Some(SequencePosition::End),
            start_side: Some(Side::After),
            end_side: Some(Side::Before),
            interval_type: 2,
            stickiness: Some(Stickiness::Full),
            sequence_number: 11,
            properties: Some(props),
        };
        let value = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            value,
            json!({
                "start": 2,
                "end": "end",
                "startSide": "After",
                "endSide": "Before",
                "intervalType": 2,
                "stickiness": 3,
                "sequenceNumber": 11,
                "properties": { "intervalId": "abc" },
            })
        );
        let back: SerializedIntervalDelta = serde_json::from_value(value).unwrap();
        assert_eq!(back, delta);
    }

    #[test]
    fn omitted_fields_are_absent_from_the_wire() {
        let delta = SerializedIntervalDelta {
            start: None,
            end: None,
            start_side: None,
            end_side: None,
            interval_type: 2,
            stickiness: None,
            sequence_number: 0,
            properties: None,
        };
        let value = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            value,
            json!({ "intervalType": 2, "sequenceNumber": 0 })
        );
    }
}
