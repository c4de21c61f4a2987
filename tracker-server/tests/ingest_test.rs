use std::sync::{Arc, Mutex};

use tracker_codec::{DecodeError, FieldValue, RawUplink, SchemaRegistry};
use tracker_server::libs::{
    envelope::Envelope,
    ingest::{IngestError, Ingestor},
    latest::LatestValues,
    store::{MemoryStore, RecordQuery, RecordStore},
};

const TUINO_PAYLOAD: &'static str = "01080211a01bba316c045ab730090078195a040e";

struct Fixture {
    ingestor: Ingestor,
    store: Arc<MemoryStore>,
    latest: Arc<Mutex<LatestValues>>,
}

fn fixture() -> Fixture {
    let registry = Arc::new(SchemaRegistry::builtin().unwrap());
    let store = Arc::new(MemoryStore::new(100));
    let latest = Arc::new(Mutex::new(LatestValues::new(
        registry.devices().len(),
        "0B030153",
    )));
    let ingestor = Ingestor::new(registry, store.clone(), latest.clone());
    Fixture {
        ingestor,
        store,
        latest,
    }
}

fn envelope(dev_eui: &str, time: &str, payload_hex: &str) -> RawUplink {
    let body = format!(
        r#"{{"DevEUI_uplink": {{
            "Time": "{}",
            "DevEUI": "{}",
            "payload_hex": "{}",
            "SpFact": 12,
            "SubBand": "G1",
            "Channel": "LC2",
            "Lrrs": {{"Lrr": [
                {{"Lrrid": "0B030153", "LrrRSSI": -112.0, "LrrSNR": -6.75, "LrrESP": -119.55}}
            ]}}
        }}}}"#,
        time, dev_eui, payload_hex
    );
    let envelope: Envelope = serde_json::from_str(body.as_str()).unwrap();
    RawUplink::from(envelope)
}

fn direxio_payload(lat: f32, lon: f32) -> String {
    let mut payload = vec![0u8; 16];
    payload[5..9].clone_from_slice(&lat.to_le_bytes());
    payload[10..14].clone_from_slice(&lon.to_le_bytes());
    payload.iter().map(|b| format!("{:02x}", b)).collect()
}

#[tokio::test]
async fn ingest_tuino() {
    let fixture = fixture();
    let uplink = envelope(
        "78AF580300000485",
        "2017-06-01T14:03:21.517+02:00",
        TUINO_PAYLOAD,
    );
    let record = fixture.ingestor.ingest(uplink).await.unwrap();
    assert_eq!(record.reading.schema_version, "tuino-v3");
    assert_eq!(record.sp_fact, 12);

    let stored = fixture.store.query(&RecordQuery::default()).await.unwrap();
    assert_eq!(stored, vec![record]);

    let latest = fixture.latest.lock().unwrap();
    let value = latest.get("78AF580300000485").unwrap();
    assert!((value.latitude.unwrap() - 46.518718).abs() < 1e-6);
    assert!((value.longitude.unwrap() - 7.3054).abs() < 1e-6);
    assert!((value.temperature.unwrap() - 20.5).abs() < 1e-6);
    assert_eq!(value.track, Some(4));
    assert_eq!(value.tx_power, Some(14));
    assert_eq!(value.ref_esp, Some(-119.55));
}

#[tokio::test]
async fn ingest_direxio() {
    let fixture = fixture();
    let payload = direxio_payload(46.51, 7.30);
    let uplink = envelope(
        "78AF58060000006D",
        "2017-06-01T14:03:21.517+02:00",
        payload.as_str(),
    );
    let record = fixture.ingestor.ingest(uplink).await.unwrap();
    assert_eq!(record.reading.device_class, "direxio");
    assert_eq!(record.reading.get("temperature"), Some(FieldValue::Int(-99)));
    assert_eq!(record.reading.get("track_id"), Some(FieldValue::Int(99)));

    let query = RecordQuery {
        track: Some(99),
        ..Default::default()
    };
    assert_eq!(fixture.store.query(&query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reject_without_side_effects() {
    let fixture = fixture();
    let time = "2017-06-01T14:03:21.517+02:00";

    let uplink = envelope("0000000000000001", time, TUINO_PAYLOAD);
    match fixture.ingestor.ingest(uplink).await {
        Err(IngestError::Decode(DecodeError::UnknownDevice(dev))) => {
            assert_eq!(dev, "0000000000000001")
        }
        _ => panic!("unknown device accepted"),
    }

    let uplink = envelope("78AF580300000485", time, &TUINO_PAYLOAD[..38]);
    assert!(matches!(
        fixture.ingestor.ingest(uplink).await,
        Err(IngestError::Decode(DecodeError::SchemaMismatch { len: 19, .. }))
    ));

    let uplink = envelope("78AF580300000485", "2017-06-01T14:03:21.517+01:00", TUINO_PAYLOAD);
    assert!(matches!(
        fixture.ingestor.ingest(uplink).await,
        Err(IngestError::Decode(DecodeError::TimestampParseError { .. }))
    ));

    assert!(fixture.store.query(&RecordQuery::default()).await.unwrap().is_empty());
    assert!(fixture.latest.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stats_by_track() {
    let fixture = fixture();
    for _ in 0..3 {
        let uplink = envelope(
            "78AF580300000506",
            "2017-06-01T14:03:21.517+02:00",
            TUINO_PAYLOAD,
        );
        fixture.ingestor.ingest(uplink).await.unwrap();
    }
    let stats = fixture.store.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.tracks[4], 3);
    assert_eq!(fixture.latest.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn saved_despite_poisoned_latest() {
    let fixture = fixture();
    let latest = fixture.latest.clone();
    let _ = std::thread::spawn(move || {
        let _guard = latest.lock().unwrap();
        panic!("poison latest values");
    })
    .join();
    assert!(fixture.latest.is_poisoned());

    let uplink = envelope(
        "78AF580300000485",
        "2017-06-01T14:03:21.517+02:00",
        TUINO_PAYLOAD,
    );
    let record = fixture.ingestor.ingest(uplink).await.unwrap();
    let stored = fixture.store.query(&RecordQuery::default()).await.unwrap();
    assert_eq!(stored, vec![record]);
}
