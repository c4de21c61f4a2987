pub mod data;
pub mod uplink;
