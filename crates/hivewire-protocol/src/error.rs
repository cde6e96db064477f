//! Error types for the protocol layer.
//!
//! Two enums, two failure classes:
//!
//! - [`SchemaError`] — a specification or registry is malformed. Raised at
//!   construction/registration time, never during decode.
//! - [`CodecError`] — the codec and its inputs disagree: a payload value
//!   doesn't match the declared wire type, or a buffer doesn't contain
//!   what the schema promises. These are fatal for the operation; there
//!   is no recoverable path, and swallowing one would silently corrupt
//!   the wire format.
//!
//! This layer never logs; errors propagate to the caller (the transport
//! adapter or application code), which decides what the user sees.

use crate::types::WireType;

/// Errors raised while building or registering event specifications.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A variable-size field appeared anywhere but the last position.
    ///
    /// `decode` reads fields at precomputed absolute offsets; a variable
    /// field in the middle would make every later offset wrong whenever
    /// the runtime length differs from the assumed one.
    #[error("event `{event}`: variable-size field `{field}` must be the last field")]
    VariableFieldNotLast { event: String, field: String },

    /// A fixed-width field's declared byte size disagrees with its type.
    #[error(
        "event `{event}`: field `{field}` declares {declared} bytes but {wire_type} occupies {expected}"
    )]
    FieldSizeMismatch {
        event: String,
        field: String,
        wire_type: WireType,
        declared: u32,
        expected: u32,
    },

    /// Two fields in one event share a name.
    #[error("event `{event}`: duplicate field name `{field}`")]
    DuplicateFieldName { event: String, field: String },

    /// Two specifications in one registry share an event id.
    #[error("duplicate event id {id}: `{existing}` vs `{incoming}`")]
    DuplicateEventId {
        id: u32,
        existing: String,
        incoming: String,
    },
}

/// Errors raised by the binary codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A payload value's type doesn't match the declared wire type.
    ///
    /// Includes the variable-field case: a field with declared size 0
    /// whose runtime value is not a string. Either way the schema
    /// registry and the caller have drifted apart — a programmer error.
    #[error("field `{field}` expects {expected} on the wire but the value is {actual}")]
    ValueMismatch {
        field: String,
        expected: WireType,
        actual: WireType,
    },

    /// The message carries a different number of values than the event
    /// declares fields.
    #[error("message carries {actual} fields but event `{event}` declares {expected}")]
    FieldCountMismatch {
        event: String,
        expected: usize,
        actual: usize,
    },

    /// The message's event id doesn't match the specification used to
    /// encode or decode it.
    #[error("message event id {message_id} does not match `{event}` (id {spec_id})")]
    EventIdMismatch {
        event: String,
        spec_id: u32,
        message_id: u32,
    },

    /// A fixed-length string field's runtime value encodes to a
    /// different number of UTF-8 bytes than declared.
    #[error("fixed string field `{field}` encodes to {actual} bytes, declared {declared}")]
    StringLengthMismatch {
        field: String,
        declared: u32,
        actual: usize,
    },

    /// The buffer is too short for the read or write at hand.
    #[error("buffer truncated: need {needed} bytes at offset {offset}, buffer is {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// A boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte {0:#04x} (expected 0 or 1)")]
    InvalidBool(u8),

    /// A string field's bytes are not valid UTF-8.
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        field: String,
        #[source]
        source: std::str::Utf8Error,
    },
}
