//! Core types for Hivewire's binary wire format.
//!
//! This module defines the shared vocabulary between the client and the
//! independently-implemented game server: which wire types exist, how an
//! event's payload is laid out, and what a decoded message looks like.
//!
//! The numeric event id and the field order inside an
//! [`EventSpecification`] ARE the wire contract. Changing either without
//! versioning breaks every peer on the other side of the socket.

// Serde is used for the *description* of events (so registries can be
// loaded from JSON for tooling and tests), never for the wire bytes
// themselves — those follow the fixed binary layout in `codec`.
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::SchemaError;

/// The fixed envelope size: `sender_id` (4 bytes) + `event_id` (4 bytes).
pub const ENVELOPE_SIZE: u32 = 8;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Every type a field can have on the wire.
///
/// This is a *closed* sum type: `encode`/`decode` match it exhaustively,
/// so "unknown wire type" is a compile error here, not a runtime failure.
/// A codec dispatching on loose runtime tags would have to treat an
/// unrecognized tag as a fatal error; the enum removes that class
/// entirely.
///
/// Fixed-width types have a constant byte size (see [`fixed_size`]).
/// [`Str`](WireType::Str) is the one variable-size type: its on-wire
/// length is the UTF-8 byte length of the runtime value.
///
/// [`fixed_size`]: WireType::fixed_size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    /// Unsigned 8-bit integer (1 byte).
    U8,
    /// Unsigned 16-bit integer (2 bytes).
    U16,
    /// Unsigned 32-bit integer (4 bytes).
    U32,
    /// Unsigned 64-bit integer (8 bytes).
    U64,
    /// Signed 8-bit integer (1 byte).
    I8,
    /// Signed 16-bit integer (2 bytes).
    I16,
    /// Signed 32-bit integer (4 bytes).
    I32,
    /// Signed 64-bit integer (8 bytes).
    I64,
    /// IEEE-754 single-precision float (4 bytes).
    F32,
    /// IEEE-754 double-precision float (8 bytes).
    F64,
    /// Boolean, 1 byte on the wire: 0 or 1.
    Bool,
    /// UTF-8 string. Variable size (declared size 0), or a fixed byte
    /// length when the peers agree on one out of band.
    Str,
}

impl WireType {
    /// The constant on-wire size of this type, or `None` for [`Str`].
    ///
    /// [`Str`]: WireType::Str
    pub const fn fixed_size(self) -> Option<u32> {
        match self {
            WireType::U8 | WireType::I8 | WireType::Bool => Some(1),
            WireType::U16 | WireType::I16 => Some(2),
            WireType::U32 | WireType::I32 | WireType::F32 => Some(4),
            WireType::U64 | WireType::I64 | WireType::F64 => Some(8),
            WireType::Str => None,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::U8 => "u8",
            WireType::U16 => "u16",
            WireType::U32 => "u32",
            WireType::U64 => "u64",
            WireType::I8 => "i8",
            WireType::I16 => "i16",
            WireType::I32 => "i32",
            WireType::I64 => "i64",
            WireType::F32 => "f32",
            WireType::F64 => "f64",
            WireType::Bool => "bool",
            WireType::Str => "str",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Runtime values
// ---------------------------------------------------------------------------

/// The runtime representation of a single field value.
///
/// One variant per [`WireType`]. 64-bit integers are real `u64`/`i64` —
/// never a float. An IEEE-754 double cannot hold the full 64-bit integer
/// domain losslessly, so carrying the exact-width types here is a hard
/// correctness requirement, not a style choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// The wire type this value encodes as.
    pub fn wire_type(&self) -> WireType {
        match self {
            Value::U8(_) => WireType::U8,
            Value::U16(_) => WireType::U16,
            Value::U32(_) => WireType::U32,
            Value::U64(_) => WireType::U64,
            Value::I8(_) => WireType::I8,
            Value::I16(_) => WireType::I16,
            Value::I32(_) => WireType::I32,
            Value::I64(_) => WireType::I64,
            Value::F32(_) => WireType::F32,
            Value::F64(_) => WireType::F64,
            Value::Bool(_) => WireType::Bool,
            Value::Str(_) => WireType::Str,
        }
    }

    /// Returns the inner `u32`, if this is a `U32`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the inner `u64`, if this is a `U64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the inner `i64`, if this is an `I64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the inner `f64`, if this is an `F64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the inner `bool`, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the inner string slice, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

// `From` impls so payloads can be built without naming every variant:
// `vec![123u32.into(), "Test".into(), 3.14f64.into()]`.

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::I8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Who an actor is, from the event system's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A spectator or not-yet-authenticated visitor.
    Guest,
    /// The player who owns the colony.
    Owner,
    /// The authoritative game server.
    Server,
}

/// Per-event emission permission flags.
///
/// Carried as data on every [`EventSpecification`]; the layer that knows
/// the local actor's [`Role`] decides where to enforce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    /// Guests may emit this event.
    pub guest: bool,
    /// The colony owner may emit this event.
    pub owner: bool,
    /// The server may emit this event.
    pub server: bool,
}

impl Permissions {
    /// Everyone may emit.
    pub const fn all() -> Self {
        Self {
            guest: true,
            owner: true,
            server: true,
        }
    }

    /// Only the server may emit.
    pub const fn server_only() -> Self {
        Self {
            guest: false,
            owner: false,
            server: true,
        }
    }

    /// Whether the given role is allowed to emit.
    pub fn allows(self, role: Role) -> bool {
        match role {
            Role::Guest => self.guest,
            Role::Owner => self.owner,
            Role::Server => self.server,
        }
    }
}

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// One field in an event's payload layout.
///
/// `byte_size` is the *declared* on-wire size. 0 means variable: the
/// field's size is computed from the runtime value (only [`WireType::Str`]
/// supports this). A nonzero size on a `Str` field declares a fixed-length
/// string the peers agreed on out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, used for lookups and error messages.
    pub name: String,
    /// The wire type of the field's value.
    pub wire_type: WireType,
    /// Declared on-wire size in bytes; 0 = variable.
    pub byte_size: u32,
}

impl FieldDescriptor {
    /// A field with the natural size of its wire type
    /// (variable for [`WireType::Str`]).
    pub fn new(name: impl Into<String>, wire_type: WireType) -> Self {
        Self {
            name: name.into(),
            wire_type,
            byte_size: wire_type.fixed_size().unwrap_or(0),
        }
    }

    /// A fixed-length UTF-8 string field of exactly `len` bytes.
    pub fn fixed_str(name: impl Into<String>, len: u32) -> Self {
        Self {
            name: name.into(),
            wire_type: WireType::Str,
            byte_size: len,
        }
    }

    /// Whether this field's size is computed from the runtime value.
    pub fn is_variable(&self) -> bool {
        self.byte_size == 0
    }
}

// ---------------------------------------------------------------------------
// Event specifications
// ---------------------------------------------------------------------------

/// The declarative, shared description of one event type's wire layout.
///
/// Construction validates the layout rules and precomputes, once, the
/// absolute byte offset of every field and the minimum encoded size. The
/// fields are private so a specification can never exist with offsets
/// that disagree with its structure.
///
/// ## Layout rules (checked by [`new`](EventSpecification::new))
///
/// - At most one variable-size field, and it must be last. `decode` reads
///   every field at a precomputed absolute offset; a variable field
///   anywhere else would shift every later offset by an amount only known
///   at runtime, which is exactly the ambiguity this rule forbids.
/// - A fixed-width wire type's declared size must equal its natural size.
/// - Field names must be unique within the event.
///
/// Deserializing a specification (e.g. a registry loaded from JSON) goes
/// through the same constructor, so dynamically-loaded schemas get the
/// same validation as compiled-in ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "RawEventSpecification",
    try_from = "RawEventSpecification"
)]
pub struct EventSpecification {
    id: u32,
    name: String,
    permissions: Permissions,
    structure: Vec<FieldDescriptor>,
    /// 8 (envelope) + Σ declared sizes. A variable field contributes 0,
    /// so this is the floor of any valid encoding.
    expected_min_size: u32,
    /// Absolute byte offset of each field (offset 8 + cumulative
    /// declared sizes of the preceding fields).
    offsets: Vec<u32>,
}

impl EventSpecification {
    /// Builds and validates a specification.
    ///
    /// # Errors
    /// Returns a [`SchemaError`] when the layout rules above are violated.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        permissions: Permissions,
        structure: Vec<FieldDescriptor>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();

        let last = structure.len().saturating_sub(1);
        for (index, field) in structure.iter().enumerate() {
            match (field.wire_type.fixed_size(), field.byte_size) {
                // Variable string: only allowed in the last position.
                (None, 0) => {
                    if index != last {
                        return Err(SchemaError::VariableFieldNotLast {
                            event: name,
                            field: field.name.clone(),
                        });
                    }
                }
                // Fixed-length string: any positive length is fine.
                (None, _) => {}
                // Fixed-width type: declared size must match exactly.
                (Some(expected), declared) => {
                    if declared != expected {
                        return Err(SchemaError::FieldSizeMismatch {
                            event: name,
                            field: field.name.clone(),
                            wire_type: field.wire_type,
                            declared,
                            expected,
                        });
                    }
                }
            }

            if structure[..index].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateFieldName {
                    event: name,
                    field: field.name.clone(),
                });
            }
        }

        let mut offsets = Vec::with_capacity(structure.len());
        let mut cursor = ENVELOPE_SIZE;
        for field in &structure {
            offsets.push(cursor);
            cursor += field.byte_size;
        }

        Ok(Self {
            id,
            name,
            permissions,
            structure,
            expected_min_size: cursor,
            offsets,
        })
    }

    /// The numeric event id — the wire contract.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Human-readable event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emission permission flags.
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// The ordered field layout.
    pub fn structure(&self) -> &[FieldDescriptor] {
        &self.structure
    }

    /// The smallest number of bytes any encoding of this event occupies.
    pub fn expected_min_size(&self) -> u32 {
        self.expected_min_size
    }

    /// Absolute byte offsets, one per field, parallel to
    /// [`structure`](Self::structure).
    pub fn field_offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Index of the field named `name`, if any.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.structure.iter().position(|f| f.name == name)
    }

    /// Whether the last field is variable-size (consumes the buffer
    /// remainder on decode).
    pub fn has_variable_tail(&self) -> bool {
        self.structure.last().is_some_and(FieldDescriptor::is_variable)
    }
}

impl fmt::Display for EventSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.name, self.id)
    }
}

/// The serialized form of [`EventSpecification`] — just the declared
/// parts. Derived data (offsets, minimum size) is recomputed on load so
/// a hand-edited JSON registry cannot smuggle in inconsistent offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEventSpecification {
    id: u32,
    name: String,
    #[serde(default)]
    permissions: Permissions,
    structure: Vec<FieldDescriptor>,
}

impl From<EventSpecification> for RawEventSpecification {
    fn from(spec: EventSpecification) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            permissions: spec.permissions,
            structure: spec.structure,
        }
    }
}

impl TryFrom<RawEventSpecification> for EventSpecification {
    type Error = SchemaError;

    fn try_from(raw: RawEventSpecification) -> Result<Self, SchemaError> {
        EventSpecification::new(raw.id, raw.name, raw.permissions, raw.structure)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A fully-stamped event message: the envelope plus the payload values in
/// declared field order.
///
/// The multiplexer freezes a message behind an `Arc` before dispatch, so
/// subscribers all observe the same immutable payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Identity of the emitting actor (bytes 0–3 on the wire).
    pub sender_id: u32,
    /// The event id (bytes 4–7 on the wire); selects the specification.
    pub event_id: u32,
    /// Field values, parallel to the specification's `structure`.
    pub fields: Vec<Value>,
}

impl Message {
    /// Assembles a message from its envelope and payload.
    pub fn new(sender_id: u32, event_id: u32, fields: Vec<Value>) -> Self {
        Self {
            sender_id,
            event_id,
            fields,
        }
    }

    /// Looks up a field value by name through the specification.
    ///
    /// Returns `None` when the name isn't declared or the payload is
    /// shorter than the structure (a malformed message the codec would
    /// reject anyway).
    pub fn field<'a>(
        &'a self,
        spec: &EventSpecification,
        name: &str,
    ) -> Option<&'a Value> {
        self.fields.get(spec.field_index(name)?)
    }
}

// =========================================================================
// Tests
// =========================================================================
