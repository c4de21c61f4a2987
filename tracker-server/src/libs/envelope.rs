//! ThingPark uplink envelope.
//!
//! Only the members used by the tracker are mapped. Everything else sent by the network server
//! is ignored.

use serde::Deserialize;
use tracker_codec::{GatewayReport, RawUplink};

#[derive(Deserialize)]
pub struct Envelope {
    #[serde(rename = "DevEUI_uplink")]
    pub uplink: Uplink,
}

#[derive(Deserialize)]
pub struct Uplink {
    #[serde(rename = "DevEUI")]
    pub dev_eui: String,
    #[serde(rename = "Time")]
    pub time: String,
    pub payload_hex: String,
    #[serde(rename = "SpFact")]
    pub sp_fact: u8,
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "SubBand")]
    pub sub_band: String,
    #[serde(rename = "Lrrs", default)]
    pub lrrs: Lrrs,
}

#[derive(Default, Deserialize)]
pub struct Lrrs {
    #[serde(rename = "Lrr", default)]
    pub lrr: Vec<Lrr>,
}

/// One receiving gateway (LRR, long range relay).
#[derive(Deserialize)]
pub struct Lrr {
    #[serde(rename = "Lrrid")]
    pub id: String,
    #[serde(rename = "LrrRSSI")]
    pub rssi: f64,
    #[serde(rename = "LrrSNR")]
    pub snr: f64,
    #[serde(rename = "LrrESP")]
    pub esp: f64,
}

impl From<Envelope> for RawUplink {
    fn from(envelope: Envelope) -> Self {
        let uplink = envelope.uplink;
        RawUplink {
            dev_eui: uplink.dev_eui,
            time: uplink.time,
            payload_hex: uplink.payload_hex,
            sp_fact: uplink.sp_fact,
            channel: uplink.channel,
            sub_band: uplink.sub_band,
            gateways: uplink
                .lrrs
                .lrr
                .into_iter()
                .map(|lrr| GatewayReport {
                    gateway_id: lrr.id,
                    rssi: lrr.rssi,
                    snr: lrr.snr,
                    esp: lrr.esp,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thingpark_uplink() {
        let body = r#"{"DevEUI_uplink": {
            "Time": "2017-06-01T14:03:21.517+02:00",
            "DevEUI": "78AF580300000485",
            "FPort": "1",
            "FCntUp": "1542",
            "payload_hex": "01080211a01bba316c045ab730090078195a040e",
            "SpFact": 12,
            "SubBand": "G1",
            "Channel": "LC2",
            "Lrrs": {"Lrr": [
                {"Lrrid": "0B030153", "Chain": 0, "LrrRSSI": -112.0, "LrrSNR": -6.75, "LrrESP": -119.55},
                {"Lrrid": "0B030154", "Chain": 0, "LrrRSSI": -98.0, "LrrSNR": 3.5, "LrrESP": -100.1}
            ]}
        }}"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        let raw = RawUplink::from(envelope);
        assert_eq!(raw.dev_eui, "78AF580300000485");
        assert_eq!(raw.sp_fact, 12);
        assert_eq!(raw.channel, "LC2");
        assert_eq!(raw.sub_band, "G1");
        assert_eq!(raw.gateways.len(), 2);
        assert_eq!(raw.gateways[0].gateway_id, "0B030153");
        assert_eq!(raw.gateways[0].esp, -119.55);
        assert_eq!(raw.gateways[1].snr, 3.5);
    }

    #[test]
    fn no_gateways() {
        let body = r#"{"DevEUI_uplink": {
            "Time": "2017-06-01T14:03:21.517+02:00",
            "DevEUI": "78AF58060000006D",
            "payload_hex": "00",
            "SpFact": 7,
            "SubBand": "G0",
            "Channel": "LC1"
        }}"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert!(RawUplink::from(envelope).gateways.is_empty());
    }
}
