//! Latest snapshot per device for dashboards.

use std::collections::HashMap;

use serde::Serialize;
use tracker_codec::UplinkRecord;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatestValue {
    #[serde(rename = "devEui")]
    pub dev_eui: String,
    /// Estimated signal power seen by the reference gateway.
    #[serde(rename = "refEsp")]
    pub ref_esp: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub time: String,
    pub track: Option<i64>,
    #[serde(rename = "txPower")]
    pub tx_power: Option<i64>,
    #[serde(rename = "spFact")]
    pub sp_fact: u8,
    pub hdop: Option<f64>,
}

/// One entry per known device, updated in place and never evicted.
pub struct LatestValues {
    capacity: usize,
    ref_gateway: String,
    values: HashMap<String, LatestValue>,
}

impl LatestValues {
    /// `capacity` is the size of the known device set.
    pub fn new(capacity: usize, ref_gateway: &str) -> Self {
        LatestValues {
            capacity,
            ref_gateway: ref_gateway.to_string(),
            values: HashMap::with_capacity(capacity),
        }
    }

    /// Replaces the snapshot of the record's device.
    ///
    /// Returns `false` when the device is new and the store is already full.
    pub fn update(&mut self, record: &UplinkRecord) -> bool {
        let key = record.dev_eui.to_uppercase();
        let previous_esp = match self.values.get(&key) {
            None => {
                if self.values.len() >= self.capacity {
                    return false;
                }
                None
            }
            Some(value) => value.ref_esp,
        };
        let ref_esp = record
            .gateways
            .iter()
            .find(|g| g.gateway_id.eq_ignore_ascii_case(self.ref_gateway.as_str()))
            .map(|g| g.esp)
            .or(previous_esp);

        let reading = &record.reading;
        self.values.insert(
            key,
            LatestValue {
                dev_eui: record.dev_eui.clone(),
                ref_esp,
                latitude: reading.get_f64("latitude"),
                longitude: reading.get_f64("longitude"),
                temperature: reading.get_f64("temperature"),
                humidity: reading.get_f64("humidity"),
                time: record.time.clone(),
                track: reading.get_i64("track_id"),
                tx_power: reading.get_i64("tx_power"),
                sp_fact: record.sp_fact,
                hdop: reading.get_f64("hdop"),
            },
        );
        true
    }

    pub fn get(&self, dev_eui: &str) -> Option<&LatestValue> {
        self.values.get(&dev_eui.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
