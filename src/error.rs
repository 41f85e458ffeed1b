// src/error.rs

use crate::tags::{Tag, TagType};
use thiserror::Error;

/// Core error types for Rpmmeta
#[derive(Error, Debug)]
pub enum Error {
    /// Entry declares a type the decoder does not handle
    #[error("unsupported tag data type: {0:?}")]
    UnsupportedType(TagType),

    /// Payload does not match its declared type and count
    #[error("malformed data for tag {tag}: {reason}")]
    Malformed { tag: Tag, reason: String },

    /// Value kind incompatible with the tag's declared type
    #[error("invalid data for tag {tag}: expected {expected:?}")]
    TypeMismatch { tag: Tag, expected: TagType },

    /// Merge precondition violated: match-tag values differ
    #[error("match tag mismatch")]
    MatchTagMismatch,

    /// A header in a merge lacks the match tag entirely
    #[error("match tag missing in header")]
    MatchTagMissing,

    /// More source headers than targets in a merge batch
    #[error("unpaired source header in merge")]
    UnpairedSource,

    /// Tag name or number not known to the registry
    #[error("unknown header tag: {0}")]
    UnknownTag(String),

    /// A tag the operation requires is not present in the header
    #[error("required tag {0} not present in header")]
    MissingTag(Tag),

    /// Parallel dependency tag arrays disagree in length
    #[error("dependency tag triple length mismatch for {0}")]
    DepTripleMismatch(Tag),
}

/// Result type alias using Rpmmeta's Error type
pub type Result<T> = std::result::Result<T, Error>;
