//! Ingestion server for LoRa GPS tracker uplinks.

pub mod libs;
pub mod routes;
