//! The binary codec: byte-exact encode/decode of event messages.
//!
//! The wire layout is a fixed contract shared with an independently
//! implemented server, so this codec is hand-written — a serialization
//! framework would own the layout, and the layout is not ours to own:
//!
//! ```text
//! bytes 0–3   sender_id   u32, big-endian
//! bytes 4–7   event_id    u32, big-endian
//! bytes 8..   payload     fields in declared order, no padding,
//!                         no length prefixes
//! ```
//!
//! The per-type primitives (`read_*`/`write_*`) are public: they are the
//! unit the round-trip tests exercise, and interop tooling uses them
//! directly. Multi-byte numerics default to big-endian; every primitive
//! takes an explicit [`Endian`] so the little-endian half of the interop
//! test matrix can drive the same code. The envelope itself is always
//! big-endian regardless of the flag — that part of the contract has no
//! variant.

use crate::{
    CodecError, EventSpecification, FieldDescriptor, Message, Value, WireType, ENVELOPE_SIZE,
};

/// Byte order for multi-byte numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Network byte order — the wire default.
    #[default]
    Big,
    /// Little-endian, for interop testing against tooling that speaks it.
    Little,
}

// ---------------------------------------------------------------------------
// Bounds checking
// ---------------------------------------------------------------------------

/// Borrows exactly `needed` bytes at `offset`, or reports truncation.
fn slice_at(buf: &[u8], offset: usize, needed: usize) -> Result<&[u8], CodecError> {
    buf.get(offset..offset + needed).ok_or(CodecError::Truncated {
        offset,
        needed,
        len: buf.len(),
    })
}

/// Mutable counterpart of [`slice_at`].
fn slice_at_mut(
    buf: &mut [u8],
    offset: usize,
    needed: usize,
) -> Result<&mut [u8], CodecError> {
    let len = buf.len();
    buf.get_mut(offset..offset + needed)
        .ok_or(CodecError::Truncated {
            offset,
            needed,
            len,
        })
}

// ---------------------------------------------------------------------------
// Per-type primitives — unsigned integers
// ---------------------------------------------------------------------------

/// Writes an unsigned 8-bit integer at `offset`.
pub fn write_u8(buf: &mut [u8], offset: usize, v: u8) -> Result<(), CodecError> {
    slice_at_mut(buf, offset, 1)?[0] = v;
    Ok(())
}

/// Reads an unsigned 8-bit integer at `offset`.
pub fn read_u8(buf: &[u8], offset: usize) -> Result<u8, CodecError> {
    Ok(slice_at(buf, offset, 1)?[0])
}

/// Writes an unsigned 16-bit integer at `offset`.
pub fn write_u16(buf: &mut [u8], offset: usize, v: u16, endian: Endian) -> Result<(), CodecError> {
    let bytes = match endian {
        Endian::Big => v.to_be_bytes(),
        Endian::Little => v.to_le_bytes(),
    };
    slice_at_mut(buf, offset, 2)?.copy_from_slice(&bytes);
    Ok(())
}

/// Reads an unsigned 16-bit integer at `offset`.
pub fn read_u16(buf: &[u8], offset: usize, endian: Endian) -> Result<u16, CodecError> {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(slice_at(buf, offset, 2)?);
    Ok(match endian {
        Endian::Big => u16::from_be_bytes(bytes),
        Endian::Little => u16::from_le_bytes(bytes),
    })
}

/// Writes an unsigned 32-bit integer at `offset`.
pub fn write_u32(buf: &mut [u8], offset: usize, v: u32, endian: Endian) -> Result<(), CodecError> {
    let bytes = match endian {
        Endian::Big => v.to_be_bytes(),
        Endian::Little => v.to_le_bytes(),
    };
    slice_at_mut(buf, offset, 4)?.copy_from_slice(&bytes);
    Ok(())
}

/// Reads an unsigned 32-bit integer at `offset`.
pub fn read_u32(buf: &[u8], offset: usize, endian: Endian) -> Result<u32, CodecError> {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(slice_at(buf, offset, 4)?);
    Ok(match endian {
        Endian::Big => u32::from_be_bytes(bytes),
        Endian::Little => u32::from_le_bytes(bytes),
    })
}

/// Writes an unsigned 64-bit integer at `offset`.
///
/// The value is a real `u64` end to end — the full 64-bit domain round-
/// trips losslessly, which a double-based representation cannot do.
pub fn write_u64(buf: &mut [u8], offset: usize, v: u64, endian: Endian) -> Result<(), CodecError> {
    let bytes = match endian {
        Endian::Big => v.to_be_bytes(),
        Endian::Little => v.to_le_bytes(),
    };
    slice_at_mut(buf, offset, 8)?.copy_from_slice(&bytes);
    Ok(())
}

/// Reads an unsigned 64-bit integer at `offset`.
pub fn read_u64(buf: &[u8], offset: usize, endian: Endian) -> Result<u64, CodecError> {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(slice_at(buf, offset, 8)?);
    Ok(match endian {
        Endian::Big => u64::from_be_bytes(bytes),
        Endian::Little => u64::from_le_bytes(bytes),
    })
}

// ---------------------------------------------------------------------------
// Per-type primitives — signed integers
// ---------------------------------------------------------------------------

/// Writes a signed 8-bit integer at `offset`.
pub fn write_i8(buf: &mut [u8], offset: usize, v: i8) -> Result<(), CodecError> {
    write_u8(buf, offset, v as u8)
}

/// Reads a signed 8-bit integer at `offset`.
pub fn read_i8(buf: &[u8], offset: usize) -> Result<i8, CodecError> {
    Ok(read_u8(buf, offset)? as i8)
}

/// Writes a signed 16-bit integer at `offset`.
pub fn write_i16(buf: &mut [u8], offset: usize, v: i16, endian: Endian) -> Result<(), CodecError> {
    write_u16(buf, offset, v as u16, endian)
}

/// Reads a signed 16-bit integer at `offset`.
pub fn read_i16(buf: &[u8], offset: usize, endian: Endian) -> Result<i16, CodecError> {
    Ok(read_u16(buf, offset, endian)? as i16)
}

/// Writes a signed 32-bit integer at `offset`.
pub fn write_i32(buf: &mut [u8], offset: usize, v: i32, endian: Endian) -> Result<(), CodecError> {
    write_u32(buf, offset, v as u32, endian)
}

/// Reads a signed 32-bit integer at `offset`.
pub fn read_i32(buf: &[u8], offset: usize, endian: Endian) -> Result<i32, CodecError> {
    Ok(read_u32(buf, offset, endian)? as i32)
}

/// Writes a signed 64-bit integer at `offset`.
pub fn write_i64(buf: &mut [u8], offset: usize, v: i64, endian: Endian) -> Result<(), CodecError> {
    write_u64(buf, offset, v as u64, endian)
}

/// Reads a signed 64-bit integer at `offset`.
pub fn read_i64(buf: &[u8], offset: usize, endian: Endian) -> Result<i64, CodecError> {
    Ok(read_u64(buf, offset, endian)? as i64)
}

// ---------------------------------------------------------------------------
// Per-type primitives — floats, bool, strings
// ---------------------------------------------------------------------------

/// Writes an IEEE-754 single-precision float at `offset`.
pub fn write_f32(buf: &mut [u8], offset: usize, v: f32, endian: Endian) -> Result<(), CodecError> {
    write_u32(buf, offset, v.to_bits(), endian)
}

/// Reads an IEEE-754 single-precision float at `offset`.
pub fn read_f32(buf: &[u8], offset: usize, endian: Endian) -> Result<f32, CodecError> {
    Ok(f32::from_bits(read_u32(buf, offset, endian)?))
}

/// Writes an IEEE-754 double-precision float at `offset`.
pub fn write_f64(buf: &mut [u8], offset: usize, v: f64, endian: Endian) -> Result<(), CodecError> {
    write_u64(buf, offset, v.to_bits(), endian)
}

/// Reads an IEEE-754 double-precision float at `offset`.
pub fn read_f64(buf: &[u8], offset: usize, endian: Endian) -> Result<f64, CodecError> {
    Ok(f64::from_bits(read_u64(buf, offset, endian)?))
}

/// Writes a boolean as a single byte: 1 for true, 0 for false.
pub fn write_bool(buf: &mut [u8], offset: usize, v: bool) -> Result<(), CodecError> {
    write_u8(buf, offset, v as u8)
}

/// Reads a boolean byte. Anything other than 0 or 1 is a codec error —
/// a peer sending other values is speaking a different protocol.
pub fn read_bool(buf: &[u8], offset: usize) -> Result<bool, CodecError> {
    match read_u8(buf, offset)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::InvalidBool(other)),
    }
}

/// Writes a string's UTF-8 bytes at `offset` (no length prefix).
/// Returns the number of bytes written.
pub fn write_str(buf: &mut [u8], offset: usize, v: &str) -> Result<usize, CodecError> {
    let bytes = v.as_bytes();
    slice_at_mut(buf, offset, bytes.len())?.copy_from_slice(bytes);
    Ok(bytes.len())
}

/// Reads `len` bytes at `offset` as a UTF-8 string.
///
/// The extent of a string field is never self-describing — `len` comes
/// from the declared fixed size or, for the variable tail, from the
/// buffer remainder. `field` is only used for error reporting.
pub fn read_str(
    buf: &[u8],
    offset: usize,
    len: usize,
    field: &str,
) -> Result<String, CodecError> {
    let bytes = slice_at(buf, offset, len)?;
    let s = std::str::from_utf8(bytes).map_err(|source| CodecError::InvalidUtf8 {
        field: field.to_string(),
        source,
    })?;
    Ok(s.to_string())
}

// ---------------------------------------------------------------------------
// Whole-message operations
// ---------------------------------------------------------------------------

/// The exact encoded size of `message` under `spec`, in bytes.
///
/// Fixed fields contribute their declared size; a variable string field
/// contributes the UTF-8 byte length of its runtime value.
///
/// # Errors
/// Fails when a variable-size field's value is not a string, or when the
/// payload arity doesn't match the structure — both mean the schema and
/// the caller have drifted apart.
pub fn encoded_len(message: &Message, spec: &EventSpecification) -> Result<u32, CodecError> {
    if message.fields.len() != spec.structure().len() {
        return Err(CodecError::FieldCountMismatch {
            event: spec.name().to_string(),
            expected: spec.structure().len(),
            actual: message.fields.len(),
        });
    }

    let mut total = ENVELOPE_SIZE;
    for (field, value) in spec.structure().iter().zip(&message.fields) {
        total += field_len(field, value)?;
    }
    Ok(total)
}

/// The concrete on-wire size of one field given its runtime value.
fn field_len(field: &FieldDescriptor, value: &Value) -> Result<u32, CodecError> {
    if !field.is_variable() {
        return Ok(field.byte_size);
    }
    match value {
        Value::Str(s) => Ok(s.len() as u32),
        other => Err(CodecError::ValueMismatch {
            field: field.name.clone(),
            expected: WireType::Str,
            actual: other.wire_type(),
        }),
    }
}

/// Encodes a message to a freshly allocated buffer of exactly
/// [`encoded_len`] bytes, big-endian.
pub fn encode(message: &Message, spec: &EventSpecification) -> Result<Vec<u8>, CodecError> {
    encode_with(message, spec, Endian::Big)
}

/// [`encode`] with an explicit byte order for the payload numerics.
/// The envelope is big-endian regardless.
pub fn encode_with(
    message: &Message,
    spec: &EventSpecification,
    endian: Endian,
) -> Result<Vec<u8>, CodecError> {
    if message.event_id != spec.id() {
        return Err(CodecError::EventIdMismatch {
            event: spec.name().to_string(),
            spec_id: spec.id(),
            message_id: message.event_id,
        });
    }

    let len = encoded_len(message, spec)? as usize;
    let mut buf = vec![0u8; len];

    write_u32(&mut buf, 0, message.sender_id, Endian::Big)?;
    write_u32(&mut buf, 4, message.event_id, Endian::Big)?;

    // The write cursor advances by the *actual* size of each field; for
    // fixed fields that equals the declared size, and the only field
    // whose actual size can differ is the variable tail.
    let mut cursor = ENVELOPE_SIZE as usize;
    for (field, value) in spec.structure().iter().zip(&message.fields) {
        cursor += write_field(&mut buf, cursor, field, value, endian)?;
    }

    Ok(buf)
}

/// Writes one field value at `offset`; returns the bytes written.
///
/// The match is exhaustive over the closed `WireType` × `Value` pairing:
/// every agreeing pair encodes, every disagreeing pair is a fatal
/// [`CodecError::ValueMismatch`].
fn write_field(
    buf: &mut [u8],
    offset: usize,
    field: &FieldDescriptor,
    value: &Value,
    endian: Endian,
) -> Result<usize, CodecError> {
    match (field.wire_type, value) {
        (WireType::U8, Value::U8(v)) => {
            write_u8(buf, offset, *v)?;
            Ok(1)
        }
        (WireType::U16, Value::U16(v)) => {
            write_u16(buf, offset, *v, endian)?;
            Ok(2)
        }
        (WireType::U32, Value::U32(v)) => {
            write_u32(buf, offset, *v, endian)?;
            Ok(4)
        }
        (WireType::U64, Value::U64(v)) => {
            write_u64(buf, offset, *v, endian)?;
            Ok(8)
        }
        (WireType::I8, Value::I8(v)) => {
            write_i8(buf, offset, *v)?;
            Ok(1)
        }
        (WireType::I16, Value::I16(v)) => {
            write_i16(buf, offset, *v, endian)?;
            Ok(2)
        }
        (WireType::I32, Value::I32(v)) => {
            write_i32(buf, offset, *v, endian)?;
            Ok(4)
        }
        (WireType::I64, Value::I64(v)) => {
            write_i64(buf, offset, *v, endian)?;
            Ok(8)
        }
        (WireType::F32, Value::F32(v)) => {
            write_f32(buf, offset, *v, endian)?;
            Ok(4)
        }
        (WireType::F64, Value::F64(v)) => {
            write_f64(buf, offset, *v, endian)?;
            Ok(8)
        }
        (WireType::Bool, Value::Bool(v)) => {
            write_bool(buf, offset, *v)?;
            Ok(1)
        }
        (WireType::Str, Value::Str(s)) => {
            if !field.is_variable() && s.len() != field.byte_size as usize {
                return Err(CodecError::StringLengthMismatch {
                    field: field.name.clone(),
                    declared: field.byte_size,
                    actual: s.len(),
                });
            }
            write_str(buf, offset, s)
        }
        (expected, actual) => Err(CodecError::ValueMismatch {
            field: field.name.clone(),
            expected,
            actual: actual.wire_type(),
        }),
    }
}

/// Reads the envelope: `(sender_id, event_id)`, both big-endian.
///
/// This is the first step of the inbound path — the event id selects
/// which specification decodes the remainder.
pub fn decode_header(buf: &[u8]) -> Result<(u32, u32), CodecError> {
    let sender_id = read_u32(buf, 0, Endian::Big)?;
    let event_id = read_u32(buf, 4, Endian::Big)?;
    Ok((sender_id, event_id))
}

/// Decodes a full message under `spec`, big-endian.
///
/// `sender_override` replaces the envelope's sender id in the returned
/// message — the transport adapter uses it when the connection itself is
/// the authority on who sent the frame.
pub fn decode(
    buf: &[u8],
    spec: &EventSpecification,
    sender_override: Option<u32>,
) -> Result<Message, CodecError> {
    decode_with(buf, spec, sender_override, Endian::Big)
}

/// [`decode`] with an explicit byte order for the payload numerics.
pub fn decode_with(
    buf: &[u8],
    spec: &EventSpecification,
    sender_override: Option<u32>,
    endian: Endian,
) -> Result<Message, CodecError> {
    let (sender_id, event_id) = decode_header(buf)?;

    if event_id != spec.id() {
        return Err(CodecError::EventIdMismatch {
            event: spec.name().to_string(),
            spec_id: spec.id(),
            message_id: event_id,
        });
    }

    // One upfront bound gives a precise error before any field read; a
    // variable tail may then legally consume zero bytes.
    let min = spec.expected_min_size() as usize;
    if buf.len() < min {
        return Err(CodecError::Truncated {
            offset: 0,
            needed: min,
            len: buf.len(),
        });
    }

    let mut fields = Vec::with_capacity(spec.structure().len());
    for (field, &offset) in spec.structure().iter().zip(spec.field_offsets()) {
        fields.push(read_field(buf, offset as usize, field, endian)?);
    }

    Ok(Message {
        sender_id: sender_override.unwrap_or(sender_id),
        event_id,
        fields,
    })
}

/// Reads one field value at its precomputed absolute offset.
fn read_field(
    buf: &[u8],
    offset: usize,
    field: &FieldDescriptor,
    endian: Endian,
) -> Result<Value, CodecError> {
    let value = match field.wire_type {
        WireType::U8 => Value::U8(read_u8(buf, offset)?),
        WireType::U16 => Value::U16(read_u16(buf, offset, endian)?),
        WireType::U32 => Value::U32(read_u32(buf, offset, endian)?),
        WireType::U64 => Value::U64(read_u64(buf, offset, endian)?),
        WireType::I8 => Value::I8(read_i8(buf, offset)?),
        WireType::I16 => Value::I16(read_i16(buf, offset, endian)?),
        WireType::I32 => Value::I32(read_i32(buf, offset, endian)?),
        WireType::I64 => Value::I64(read_i64(buf, offset, endian)?),
        WireType::F32 => Value::F32(read_f32(buf, offset, endian)?),
        WireType::F64 => Value::F64(read_f64(buf, offset, endian)?),
        WireType::Bool => Value::Bool(read_bool(buf, offset)?),
        WireType::Str => {
            // Declared fixed length, or the variable tail consuming the
            // buffer remainder (layout validation guarantees a variable
            // field is last, so the remainder is unambiguous).
            let len = if field.is_variable() {
                buf.len().saturating_sub(offset)
            } else {
                field.byte_size as usize
            };
            Value::Str(read_str(buf, offset, len, &field.name)?)
        }
    };
    Ok(value)
}

// =========================================================================
// Tests
// =========================================================================
