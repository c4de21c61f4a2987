//! Payload decoders.
//!
//! A packed payload is read as one big-endian unsigned integer `P` of `8 * byte_length` bits.
//! A field at `bit_offset` (counted from the most-significant end) with `bit_width` bits is
//! `(P >> shift) & mask` with `shift = total_bits - bit_offset - bit_width`. Payloads are up to
//! 160 bits, wider than any native integer, so the bits are collected directly from the bytes
//! covering the field.
//!
//! All decoders expect a schema that passed [`PayloadSchema::validate`].

use std::collections::BTreeMap;

use log::debug;

use super::{
    DecodedReading,
    error::{DecodeError, Result},
    schema::{F32_BYTES, FieldSpec, FieldValue, Layout, MAX_FIELD_BITS, PayloadSchema},
};

/// Decodes a hexadecimal payload with whichever decoder the schema layout calls for.
pub fn decode(hex_payload: &str, schema: &PayloadSchema) -> Result<DecodedReading> {
    decode_bytes(payload_bytes(hex_payload)?.as_slice(), schema)
}

/// Decodes a bit-packed payload.
pub fn decode_packed(hex_payload: &str, schema: &PayloadSchema) -> Result<DecodedReading> {
    if !matches!(schema.layout, Layout::Packed { .. }) {
        return Err(kind_mismatch(schema, "packed"));
    }
    decode_bytes(payload_bytes(hex_payload)?.as_slice(), schema)
}

/// Decodes a float-slice payload.
pub fn decode_float_slice(hex_payload: &str, schema: &PayloadSchema) -> Result<DecodedReading> {
    if !matches!(schema.layout, Layout::FloatSlice { .. }) {
        return Err(kind_mismatch(schema, "float-slice"));
    }
    decode_bytes(payload_bytes(hex_payload)?.as_slice(), schema)
}

/// Decodes an already converted payload.
pub fn decode_bytes(payload: &[u8], schema: &PayloadSchema) -> Result<DecodedReading> {
    let fields = match &schema.layout {
        Layout::Packed { fields } => {
            if payload.len() != schema.byte_length {
                return Err(length_mismatch(schema, payload.len()));
            }
            let mut values = BTreeMap::new();
            for field in fields.iter() {
                let raw = extract_raw(payload, field).ok_or_else(|| DecodeError::InvalidLayout {
                    version: schema.version.clone(),
                    reason: format!("field `{}` cannot be extracted", field.name),
                })?;
                values.insert(field.name.clone(), field.scale.apply(raw));
            }
            values
        }
        Layout::FloatSlice {
            floats,
            placeholders,
        } => {
            if payload.len() < schema.byte_length {
                return Err(length_mismatch(schema, payload.len()));
            }
            let mut values = BTreeMap::new();
            for float in floats.iter() {
                let value = read_f32_le(payload, float.byte_offset)
                    .ok_or_else(|| length_mismatch(schema, payload.len()))?;
                values.insert(float.name.clone(), FieldValue::Float(value as f64));
            }
            for placeholder in placeholders.iter() {
                values.insert(placeholder.name.clone(), placeholder.value);
            }
            values
        }
    };

    Ok(DecodedReading {
        device_class: schema.device_class.clone(),
        schema_version: schema.version.clone(),
        fields,
    })
}

/// Converts the hexadecimal payload string into bytes.
pub fn payload_bytes(hex_payload: &str) -> Result<Vec<u8>> {
    hex::decode(hex_payload).map_err(|e| {
        debug!("[payload_bytes] reject payload {}: {}", hex_payload, e);
        DecodeError::MalformedHex(e.to_string())
    })
}

/// Raw value of one field, sign-extended for signed fields.
///
/// Returns `None` when the field does not fit the payload or its width is unsupported.
pub fn extract_raw(payload: &[u8], field: &FieldSpec) -> Option<i64> {
    let width = field.bit_width;
    let end = field.bit_offset.checked_add(width)?;
    if width == 0 || width > MAX_FIELD_BITS || end as usize > payload.len() * 8 {
        return None;
    }

    let mut raw: u64 = 0;
    let mut bit = field.bit_offset;
    while bit < end {
        // Take the run of field bits that lives in the current byte.
        let in_byte = bit % 8;
        let take = (8 - in_byte).min(end - bit);
        let byte = payload[(bit / 8) as usize] as u64;
        let bits = (byte >> (8 - in_byte - take)) & ((1 << take) - 1);
        raw = (raw << take) | bits;
        bit += take;
    }

    if field.signed {
        let unused = 64 - width;
        Some(((raw << unused) as i64) >> unused)
    } else {
        Some(raw as i64)
    }
}

fn read_f32_le(payload: &[u8], offset: usize) -> Option<f32> {
    let slice = payload.get(offset..offset.checked_add(F32_BYTES)?)?;
    let mut dst = [0u8; F32_BYTES];
    dst.clone_from_slice(slice);
    Some(f32::from_le_bytes(dst))
}

fn length_mismatch(schema: &PayloadSchema, actual: usize) -> DecodeError {
    DecodeError::LengthMismatch {
        version: schema.version.clone(),
        expected: schema.byte_length,
        actual,
    }
}

fn kind_mismatch(schema: &PayloadSchema, expected: &'static str) -> DecodeError {
    DecodeError::KindMismatch {
        version: schema.version.clone(),
        expected,
    }
}
