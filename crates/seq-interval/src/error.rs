//! Error types for the interval subsystem.

use thiserror::Error;

/// A caller violated the interval subsystem's usage contract.
///
/// These are raised synchronously and indicate a bug at the call site;
/// the owning layer decides whether to discard the offending request or
/// close the document.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// References created from a remote op must relocate when their
    /// anchoring segment is removed.
    #[error("op references must be slide-on-remove")]
    OpReferenceMustSlideOnRemove,
    /// Pending local references may not slide until their creation op is
    /// acknowledged.
    #[error("local references cannot be slide-on-remove")]
    LocalReferenceMustStayOnRemove,
    #[error("non-transient references need segment")]
    NonTransientReferenceNeedsSegment,
}
