#![allow(dead_code)]

use seq_interval::intervals::interval_type;
use seq_interval::mergetree::SequencePlace;
use seq_interval::{create_sequence_interval, RefOrigin, SequenceInterval, TextMergeTree};

/// The canonical eleven-character playground.
pub fn hello_world() -> TextMergeTree {
    TextMergeTree::with_text("hello world")
}

/// A locally created interval; endpoints stay-on-remove until acked.
pub fn local_interval(
    tree: &mut TextMergeTree,
    label: &str,
    start: impl Into<SequencePlace>,
    end: impl Into<SequencePlace>,
) -> SequenceInterval {
    create_sequence_interval(
        label,
        None,
        Some(start.into()),
        Some(end.into()),
        tree,
        interval_type::SLIDE_ON_REMOVE,
        RefOrigin::Local { local_seq: None },
        false,
        None,
    )
    .expect("interval must build")
}

/// A locally created interval whose creation op has been acked, so the
/// endpoints slide on remove.
pub fn acked_interval(
    tree: &mut TextMergeTree,
    label: &str,
    start: impl Into<SequencePlace>,
    end: impl Into<SequencePlace>,
) -> SequenceInterval {
    let interval = local_interval(tree, label, start, end);
    interval.ack_creation();
    interval
}
