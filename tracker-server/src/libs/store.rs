//! Record persistence.
//!
//! The server only talks to a [`RecordStore`]. [`MemoryStore`] keeps the latest records in a
//! bounded queue and drops the oldest one when full.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracker_codec::UplinkRecord;

use super::STATS_TRACKS;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Record filter. Every condition is optional and all given conditions must hold.
#[derive(Clone, Debug, Default)]
pub struct RecordQuery {
    pub dev_eui: Option<String>,
    pub track: Option<i64>,
    /// Exclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub end: Option<DateTime<Utc>>,
    /// Exclusive upper bound of the horizontal dilution of precision.
    pub max_hdop: Option<f64>,
    pub sp_fact: Option<u8>,
    pub tx_power: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    /// Number of records of tracks `0..STATS_TRACKS`.
    pub tracks: Vec<usize>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, record: UplinkRecord) -> Result<(), StoreError>;

    /// Matching records, oldest first.
    async fn query(&self, query: &RecordQuery) -> Result<Vec<UplinkRecord>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

pub struct MemoryStore {
    max_records: usize,
    records: Mutex<VecDeque<UplinkRecord>>,
}

impl MemoryStore {
    pub fn new(max_records: usize) -> Self {
        MemoryStore {
            max_records: max_records.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, record: UplinkRecord) -> Result<(), StoreError> {
        let mut mutex = self
            .records
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        (*mutex).push_back(record);
        if (*mutex).len() > self.max_records {
            (*mutex).pop_front();
        }
        Ok(())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<UplinkRecord>, StoreError> {
        let mutex = self
            .records
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok((*mutex)
            .iter()
            .filter(|x| query.matches(x))
            .map(|x| x.clone())
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mutex = self
            .records
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut tracks = vec![0; STATS_TRACKS];
        for record in (*mutex).iter() {
            if let Some(track) = record.reading.get_i64("track_id") {
                if track >= 0 && (track as usize) < STATS_TRACKS {
                    tracks[track as usize] += 1;
                }
            }
        }
        Ok(StoreStats {
            total: (*mutex).len(),
            tracks,
        })
    }
}

impl RecordQuery {
    pub fn matches(&self, record: &UplinkRecord) -> bool {
        if let Some(dev_eui) = self.dev_eui.as_ref() {
            if !dev_eui.eq_ignore_ascii_case(record.dev_eui.as_str()) {
                return false;
            }
        }
        if let Some(track) = self.track {
            if record.reading.get_i64("track_id") != Some(track) {
                return false;
            }
        }
        if let Some(start) = self.start {
            if record.timestamp <= start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if record.timestamp >= end {
                return false;
            }
        }
        if let Some(max_hdop) = self.max_hdop {
            match record.reading.get_f64("hdop") {
                Some(hdop) if hdop < max_hdop => (),
                _ => return false,
            }
        }
        if let Some(sp_fact) = self.sp_fact {
            if record.sp_fact != sp_fact {
                return false;
            }
        }
        if let Some(tx_power) = self.tx_power {
            if record.reading.get_i64("tx_power") != Some(tx_power) {
                return false;
            }
        }
        true
    }
}
