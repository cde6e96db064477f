//! Wire protocol for Hivewire.
//!
//! This crate defines the "language" the colony client shares with the
//! independently implemented game server:
//!
//! - **Types** ([`WireType`], [`Value`], [`FieldDescriptor`],
//!   [`EventSpecification`], [`Message`]) — what travels on the wire and
//!   how it is described.
//! - **Registry** ([`EventRegistry`]) — the static id → specification
//!   lookup used on the decode path.
//! - **Codec** ([`codec`]) — byte-exact encode/decode against the fixed
//!   binary layout.
//! - **Errors** ([`SchemaError`], [`CodecError`]) — what can go wrong
//!   building schemas and moving bytes.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the event
//! multiplexer (who gets notified). It knows nothing about sockets or
//! subscriptions — only about bytes and the schemas that give them
//! meaning.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Multiplexer (subscribers)
//! ```

mod error;
mod registry;
mod types;

pub mod codec;

pub use codec::Endian;
pub use error::{CodecError, SchemaError};
pub use registry::EventRegistry;
pub use types::{
    EventSpecification, FieldDescriptor, Message, Permissions, Role, Value,
    WireType, ENVELOPE_SIZE,
};
