//! Uplink payload codec for LoRa GPS trackers.
//!
//! Payload layouts are data: a [`libs::registry::SchemaRegistry`] maps device EUIs to versioned
//! [`libs::schema::PayloadSchema`]s and one generic decoder per layout kind interprets them.

pub mod libs;

pub use libs::{
    DecodedReading, GatewayReport, RawUplink, UplinkRecord,
    decoder::{decode, decode_float_slice, decode_packed},
    error::{DecodeError, SchemaError},
    registry::{RegistryTable, SchemaRegistry},
    schema::{FieldSpec, FieldValue, Layout, PayloadSchema, Scale},
    timestamp::TimestampFormat,
    uplink::decode_uplink,
};
