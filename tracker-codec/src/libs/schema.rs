//! Payload layouts: field descriptors, scales and their startup validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{error::SchemaError, timestamp::TimestampFormat};

/// Widest field supported by the packed decoder. Keeps every raw value inside `i64`.
pub const MAX_FIELD_BITS: u32 = 63;

/// Largest LoRa PHY payload.
pub const MAX_PAYLOAD_BYTES: usize = 255;

/// Size in bytes of one IEEE-754 single-precision value.
pub const F32_BYTES: usize = 4;

/// Conversion from a raw integer count to a physical value.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// `value = raw / d`. `Div(10_000_000.0)` turns degree counts into decimal degrees.
    Div(f64),
    /// `value = raw * m`. Used by fields stored at a coarser resolution than reported.
    Mul(f64),
}

/// One decoded value.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
}

/// Describes one telemetry field within a packed payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    /// Distance in bits from the most-significant end of the payload.
    #[serde(rename = "bitOffset")]
    pub bit_offset: u32,
    #[serde(rename = "bitWidth")]
    pub bit_width: u32,
    #[serde(default)]
    pub scale: Scale,
    /// Two's-complement field.
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub unit: String,
}

/// A little-endian `f32` located at a fixed byte offset.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FloatSliceSpec {
    pub name: String,
    #[serde(rename = "byteOffset")]
    pub byte_offset: usize,
    #[serde(default)]
    pub unit: String,
}

/// A field the device does not transmit. The value is a documented placeholder that downstream
/// consumers read as "not applicable", not as a measurement.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Placeholder {
    pub name: String,
    pub value: FieldValue,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// Fixed-width bitfields over a big-endian view of the whole payload.
    Packed { fields: Vec<FieldSpec> },
    /// Raw `f32` values at fixed byte offsets, completed with placeholders.
    FloatSlice {
        floats: Vec<FloatSliceSpec>,
        #[serde(default)]
        placeholders: Vec<Placeholder>,
    },
}

/// One immutable, named payload layout.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PayloadSchema {
    pub version: String,
    /// Filled by the registry from the owning class.
    #[serde(skip)]
    pub device_class: String,
    /// Exact length for packed layouts, minimum length for float-slice layouts.
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(default)]
    pub timestamp: TimestampFormat,
    pub layout: Layout,
}

impl Default for Scale {
    fn default() -> Self {
        Scale::Div(1.0)
    }
}

impl Scale {
    /// Converts a raw count. Scales that keep counts integral produce [`FieldValue::Int`].
    pub fn apply(&self, raw: i64) -> FieldValue {
        match *self {
            Scale::Div(d) if d == 1.0 => FieldValue::Int(raw),
            Scale::Div(d) => FieldValue::Float(raw as f64 / d),
            Scale::Mul(m) if m.fract() == 0.0 && m.abs() <= i32::MAX as f64 => {
                match raw.checked_mul(m as i64) {
                    None => FieldValue::Float(raw as f64 * m),
                    Some(v) => FieldValue::Int(v),
                }
            }
            Scale::Mul(m) => FieldValue::Float(raw as f64 * m),
        }
    }

    fn factor(&self) -> f64 {
        match *self {
            Scale::Div(v) | Scale::Mul(v) => v,
        }
    }
}

impl FieldValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Int(v) => v as f64,
            FieldValue::Float(v) => v,
        }
    }

    /// Integer view. Floats are truncated toward zero.
    pub fn as_i64(&self) -> i64 {
        match *self {
            FieldValue::Int(v) => v,
            FieldValue::Float(v) => v as i64,
        }
    }
}

impl FieldSpec {
    pub fn unsigned(name: &str, bit_offset: u32, bit_width: u32, scale: Scale, unit: &str) -> Self {
        FieldSpec {
            name: name.to_string(),
            bit_offset,
            bit_width,
            scale,
            signed: false,
            unit: unit.to_string(),
        }
    }

    pub fn signed(name: &str, bit_offset: u32, bit_width: u32, scale: Scale, unit: &str) -> Self {
        FieldSpec {
            signed: true,
            ..FieldSpec::unsigned(name, bit_offset, bit_width, scale, unit)
        }
    }

    /// First bit after the field, `None` when the sum overflows.
    fn end(&self) -> Option<u32> {
        self.bit_offset.checked_add(self.bit_width)
    }
}

impl Layout {
    pub fn name(&self) -> &'static str {
        match self {
            Layout::Packed { .. } => "packed",
            Layout::FloatSlice { .. } => "float-slice",
        }
    }
}

impl PayloadSchema {
    /// Whether a payload of `len` bytes belongs to this layout.
    pub fn accepts_len(&self, len: usize) -> bool {
        match self.layout {
            Layout::Packed { .. } => len == self.byte_length,
            Layout::FloatSlice { .. } => len >= self.byte_length,
        }
    }

    pub fn total_bits(&self) -> u32 {
        (self.byte_length * 8) as u32
    }

    /// Names of the fields a decode of this layout produces, in layout order.
    pub fn field_names(&self) -> Vec<&str> {
        match &self.layout {
            Layout::Packed { fields } => fields.iter().map(|f| f.name.as_str()).collect(),
            Layout::FloatSlice {
                floats,
                placeholders,
            } => floats
                .iter()
                .map(|f| f.name.as_str())
                .chain(placeholders.iter().map(|p| p.name.as_str()))
                .collect(),
        }
    }

    /// Checks every constant of the layout so that transposition errors are caught before any
    /// payload is processed.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.version.is_empty() {
            return Err(self.invalid("empty version tag"));
        }
        if self.byte_length == 0 || self.byte_length > MAX_PAYLOAD_BYTES {
            return Err(self.invalid(&format!(
                "byte length {} not in 1..={}",
                self.byte_length, MAX_PAYLOAD_BYTES
            )));
        }
        if let Err(e) = self.timestamp.offset() {
            return Err(self.invalid(&e));
        }

        let mut names = HashSet::new();
        for name in self.field_names() {
            if name.is_empty() {
                return Err(self.invalid("empty field name"));
            }
            if !names.insert(name) {
                return Err(self.invalid_field(name, "is declared twice"));
            }
        }

        match &self.layout {
            Layout::Packed { fields } => self.validate_packed(fields),
            Layout::FloatSlice { floats, .. } => self.validate_float_slice(floats),
        }
    }

    fn validate_packed(&self, fields: &[FieldSpec]) -> Result<(), SchemaError> {
        if fields.is_empty() {
            return Err(self.invalid("packed layout without fields"));
        }
        let total_bits = self.total_bits();
        for field in fields {
            if field.bit_width == 0 || field.bit_width > MAX_FIELD_BITS {
                return Err(self.invalid_field(
                    &field.name,
                    &format!("width {} not in 1..={}", field.bit_width, MAX_FIELD_BITS),
                ));
            }
            match field.end() {
                None => {
                    return Err(self.invalid_field(
                        &field.name,
                        &format!("offset {} is out of range", field.bit_offset),
                    ));
                }
                Some(end) if end > total_bits => {
                    return Err(self.invalid_field(
                        &field.name,
                        &format!("ends at bit {} beyond {}", end, total_bits),
                    ));
                }
                Some(_) => (),
            }
            let factor = field.scale.factor();
            if !factor.is_finite() || factor == 0.0 {
                return Err(self.invalid_field(&field.name, "has a zero or non-finite scale"));
            }
        }

        let mut sorted: Vec<&FieldSpec> = fields.iter().collect();
        sorted.sort_by_key(|f| f.bit_offset);
        for pair in sorted.windows(2) {
            if pair[0].end().map_or(true, |end| end > pair[1].bit_offset) {
                return Err(SchemaError::Overlap {
                    version: self.version.clone(),
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_float_slice(&self, floats: &[FloatSliceSpec]) -> Result<(), SchemaError> {
        if floats.is_empty() {
            return Err(self.invalid("float-slice layout without floats"));
        }
        for float in floats {
            match float.byte_offset.checked_add(F32_BYTES) {
                None => {
                    return Err(self.invalid_field(
                        &float.name,
                        &format!("offset {} is out of range", float.byte_offset),
                    ));
                }
                Some(end) if end > self.byte_length => {
                    return Err(self.invalid_field(
                        &float.name,
                        &format!("ends at byte {} beyond {}", end, self.byte_length),
                    ));
                }
                Some(_) => (),
            }
        }

        let mut sorted: Vec<&FloatSliceSpec> = floats.iter().collect();
        sorted.sort_by_key(|f| f.byte_offset);
        for pair in sorted.windows(2) {
            if pair[0].byte_offset + F32_BYTES > pair[1].byte_offset {
                return Err(SchemaError::Overlap {
                    version: self.version.clone(),
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> SchemaError {
        SchemaError::InvalidSchema {
            version: self.version.clone(),
            reason: reason.to_string(),
        }
    }

    fn invalid_field(&self, field: &str, reason: &str) -> SchemaError {
        SchemaError::InvalidField {
            version: self.version.clone(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}
