//! Error types of the codec.

use thiserror::Error;

pub type Result<T, E = DecodeError> = core::result::Result<T, E>;

/// Outcome of a rejected decode call.
///
/// Every variant is terminal for the call that produced it only. Decoding is deterministic, so
/// retrying the same uplink always yields the same error.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("device type not recognised: {0}")]
    UnknownDevice(String),
    #[error("no {class} schema accepts a {len}-byte payload")]
    SchemaMismatch { class: String, len: usize },
    #[error("payload of schema {version} should be {expected} bytes, got {actual}")]
    LengthMismatch {
        version: String,
        expected: usize,
        actual: usize,
    },
    #[error("timestamp `{time}` does not match format {format}")]
    TimestampParseError { time: String, format: String },
    #[error("payload is not a hexadecimal string: {0}")]
    MalformedHex(String),
    #[error("schema {version} is not a {expected} layout")]
    KindMismatch {
        version: String,
        expected: &'static str,
    },
    #[error("schema {version} is not usable: {reason}")]
    InvalidLayout { version: String, reason: String },
}

/// Problems found while validating a schema table at startup.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("schema {version}: field `{field}` {reason}")]
    InvalidField {
        version: String,
        field: String,
        reason: String,
    },
    #[error("schema {version}: fields `{first}` and `{second}` overlap")]
    Overlap {
        version: String,
        first: String,
        second: String,
    },
    #[error("schema {version}: {reason}")]
    InvalidSchema { version: String, reason: String },
    #[error("duplicate schema version {0}")]
    DuplicateVersion(String),
    #[error("device {device} belongs to both {first} and {second}")]
    DuplicateDevice {
        device: String,
        first: String,
        second: String,
    },
    #[error("class {class}: schemas {first} and {second} accept the same payload length")]
    AmbiguousLength {
        class: String,
        first: String,
        second: String,
    },
    #[error("parse schema table error: {0}")]
    Parse(String),
}
