//! Unified error type for the Hivewire event layer.

use hivewire_protocol::{CodecError, SchemaError};
use hivewire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `hivewire` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HivewireError {
    /// A schema-level error (invalid layout, duplicate registration).
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A codec-level error (value mismatch, truncated buffer).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A transport-level error (frame channel closed, write failed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An inbound frame named an event id the registry doesn't know.
    ///
    /// Usually a version skew between client and server; the caller
    /// decides whether to drop the frame or tear down the connection.
    #[error("no event registered for id {0}")]
    UnknownEvent(u32),
}
