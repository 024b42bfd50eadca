//! The interval core: endpoint factory, the interval value itself, the
//! per-interval property change manager, and the wire format.

pub mod factory;
pub mod interval;
pub mod properties;
pub mod serialized;

pub use factory::{
    create_position_reference, create_sequence_interval, create_transient_interval, RefOrigin,
    SequencedOp,
};
pub use interval::{interval_type, SequenceInterval, INTERVAL_ID_PROP, REFERENCE_RANGE_LABELS_PROP};
pub use properties::PropertiesManager;
pub use serialized::{
    from_serialized, get_serialized_properties, SerializedInterval, SerializedIntervalDelta,
    SerializedProperties,
};
