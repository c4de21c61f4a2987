use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod decoder;
pub mod error;
pub mod registry;
pub mod schema;
pub mod timestamp;
pub mod uplink;

use schema::FieldValue;

/// One gateway's view of an uplink.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GatewayReport {
    #[serde(rename = "gatewayId")]
    pub gateway_id: String,
    pub rssi: f64,
    pub snr: f64,
    /// Estimated signal power.
    pub esp: f64,
}

/// Uplink as handed over by the network server envelope. Read-only for the codec.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RawUplink {
    #[serde(rename = "devEui")]
    pub dev_eui: String,
    pub time: String,
    #[serde(rename = "payloadHex")]
    pub payload_hex: String,
    #[serde(rename = "spFact")]
    pub sp_fact: u8,
    pub channel: String,
    #[serde(rename = "subBand")]
    pub sub_band: String,
    pub gateways: Vec<GatewayReport>,
}

/// Named values recovered from one payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DecodedReading {
    #[serde(rename = "deviceClass")]
    pub device_class: String,
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    pub fields: BTreeMap<String, FieldValue>,
}

/// A decoded reading plus the envelope metadata stored alongside it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UplinkRecord {
    #[serde(rename = "devEui")]
    pub dev_eui: String,
    /// Time string exactly as received.
    pub time: String,
    pub timestamp: DateTime<Utc>,
    pub reading: DecodedReading,
    #[serde(rename = "spFact")]
    pub sp_fact: u8,
    pub channel: String,
    #[serde(rename = "subBand")]
    pub sub_band: String,
    pub gateways: Vec<GatewayReport>,
}

impl DecodedReading {
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).copied()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.as_f64())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).map(|v| v.as_i64())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
