//! Uplink ingestion: decode, persist, then refresh the latest values.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use thiserror::Error;
use tracker_codec::{DecodeError, RawUplink, SchemaRegistry, UplinkRecord, decode_uplink};

use super::{
    latest::LatestValues,
    store::{RecordStore, StoreError},
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct Ingestor {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn RecordStore>,
    latest: Arc<Mutex<LatestValues>>,
}

impl Ingestor {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RecordStore>,
        latest: Arc<Mutex<LatestValues>>,
    ) -> Self {
        Ingestor {
            registry,
            store,
            latest,
        }
    }

    /// Handles one uplink. A rejected uplink leaves both stores untouched.
    ///
    /// Once the record is saved the uplink counts as accepted, even if the latest values cannot
    /// be refreshed.
    pub async fn ingest(&self, uplink: RawUplink) -> Result<UplinkRecord, IngestError> {
        const FN_NAME: &'static str = "Ingestor::ingest";

        let record = match decode_uplink(self.registry.as_ref(), &uplink) {
            Err(e) => {
                warn!("[{}] reject uplink from {}: {}", FN_NAME, uplink.dev_eui, e);
                return Err(IngestError::Decode(e));
            }
            Ok(record) => record,
        };
        info!(
            "[{}] receive {} data from {}: {:?}",
            FN_NAME, record.reading.schema_version, record.dev_eui, record.reading.fields
        );

        self.store.save(record.clone()).await?;

        // Saved: failing to refresh the latest values no longer rejects the uplink.
        match self.latest.lock() {
            Err(e) => warn!("[{}] latest values unavailable: {}", FN_NAME, e),
            Ok(mut mutex) => {
                if !(*mutex).update(&record) {
                    warn!("[{}] no latest value slot for {}", FN_NAME, record.dev_eui);
                }
            }
        }
        Ok(record)
    }
}
