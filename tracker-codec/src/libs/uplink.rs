//! Whole-uplink decoding: the single entry point used by ingestion.

use log::debug;

use super::{
    RawUplink, UplinkRecord,
    decoder::{decode_bytes, payload_bytes},
    error::{DecodeError, Result},
    registry::SchemaRegistry,
};

/// Decodes one uplink into a record ready to be stored.
///
/// The order of checks is device, payload encoding, schema by length, payload content, then
/// timestamp. The first failure is returned and nothing partial is produced.
pub fn decode_uplink(registry: &SchemaRegistry, uplink: &RawUplink) -> Result<UplinkRecord> {
    const FN_NAME: &'static str = "decode_uplink";

    if registry.device_class(uplink.dev_eui.as_str()).is_none() {
        debug!("[{}] device type not recognised: {}", FN_NAME, uplink.dev_eui);
        return Err(DecodeError::UnknownDevice(uplink.dev_eui.clone()));
    }
    let payload = payload_bytes(uplink.payload_hex.as_str())?;
    let schema = registry.resolve(uplink.dev_eui.as_str(), payload.len())?;
    let reading = decode_bytes(payload.as_slice(), schema)?;
    let timestamp = schema.timestamp.parse(uplink.time.as_str())?;

    Ok(UplinkRecord {
        dev_eui: uplink.dev_eui.clone(),
        time: uplink.time.clone(),
        timestamp,
        reading,
        sp_fact: uplink.sp_fact,
        channel: uplink.channel.clone(),
        sub_band: uplink.sub_band.clone(),
        gateways: uplink.gateways.clone(),
    })
}
