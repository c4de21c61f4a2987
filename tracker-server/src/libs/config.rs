//! Program configurations.

use std::env;

use clap::{Arg, ArgMatches, Command};
use serde::Deserialize;

/// Configuration file object.
#[derive(Default, Deserialize)]
pub struct Config {
    /// HTTP(S) listening port.
    pub port: Option<u16>,
    /// TLS certificate PEM file. HTTPS is served when both `certFile` and `keyFile` are set.
    #[serde(rename = "certFile")]
    pub cert_file: Option<String>,
    /// TLS private key PEM file.
    #[serde(rename = "keyFile")]
    pub key_file: Option<String>,
    /// JSON5 schema table replacing the built-in payload layouts.
    #[serde(rename = "schemaFile")]
    pub schema_file: Option<String>,
    /// Gateway whose estimated signal power is shown in the latest values.
    #[serde(rename = "refGateway")]
    pub ref_gateway: Option<String>,
    /// Maximum records kept by the in-memory store.
    #[serde(rename = "maxRecords")]
    pub max_records: Option<usize>,
}

pub const DEF_PORT: u16 = 3000;
pub const DEF_PORT_STR: &'static str = "3000";
pub const DEF_REF_GATEWAY: &'static str = "0B030153";
pub const DEF_MAX_RECORDS: usize = 1000;
pub const DEF_MAX_RECORDS_STR: &'static str = "1000";

/// To register Clap arguments.
pub fn reg_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("tracker-server.port")
            .long("tracker-server.port")
            .help("HTTP(S) port")
            .num_args(1)
            .value_parser(1..=65535)
            .default_value(DEF_PORT_STR),
    )
    .arg(
        Arg::new("tracker-server.cert-file")
            .long("tracker-server.cert-file")
            .help("TLS certificate file for HTTPS")
            .num_args(1),
    )
    .arg(
        Arg::new("tracker-server.key-file")
            .long("tracker-server.key-file")
            .help("TLS private key file for HTTPS")
            .num_args(1),
    )
    .arg(
        Arg::new("tracker-server.schema-file")
            .long("tracker-server.schema-file")
            .help("JSON5 payload schema table to replace the built-in one")
            .num_args(1),
    )
    .arg(
        Arg::new("tracker-server.ref-gateway")
            .long("tracker-server.ref-gateway")
            .help("Reference gateway ID for the latest signal power")
            .num_args(1)
            .default_value(DEF_REF_GATEWAY),
    )
    .arg(
        Arg::new("tracker-server.max-records")
            .long("tracker-server.max-records")
            .help("Maximum number of records kept in memory")
            .num_args(1)
            .value_parser(1..=1_000_000)
            .default_value(DEF_MAX_RECORDS_STR),
    )
}

/// To read input arguments from command-line arguments and environment variables.
///
/// This function will call [`apply_default()`] to fill missing values so you do not need call it
/// again.
pub fn read_args(args: &ArgMatches) -> Config {
    apply_default(&Config {
        port: match args.get_one::<i64>("tracker-server.port") {
            None => match env::var("TRACKER_SERVER_PORT") {
                Err(_) => Some(DEF_PORT),
                Ok(v) => match v.parse::<u16>() {
                    Err(_) => Some(DEF_PORT),
                    Ok(v) => Some(v),
                },
            },
            Some(v) => Some(*v as u16),
        },
        cert_file: match args.get_one::<String>("tracker-server.cert-file") {
            None => match env::var("TRACKER_SERVER_CERT_FILE") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
        key_file: match args.get_one::<String>("tracker-server.key-file") {
            None => match env::var("TRACKER_SERVER_KEY_FILE") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
        schema_file: match args.get_one::<String>("tracker-server.schema-file") {
            None => match env::var("TRACKER_SERVER_SCHEMA_FILE") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
        ref_gateway: match args.get_one::<String>("tracker-server.ref-gateway") {
            None => match env::var("TRACKER_SERVER_REF_GATEWAY") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
        max_records: match args.get_one::<i64>("tracker-server.max-records") {
            None => match env::var("TRACKER_SERVER_MAX_RECORDS") {
                Err(_) => Some(DEF_MAX_RECORDS),
                Ok(v) => match v.parse::<usize>() {
                    Err(_) => Some(DEF_MAX_RECORDS),
                    Ok(v) => Some(v),
                },
            },
            Some(v) => Some(*v as usize),
        },
    })
}

/// Fill missing configuration with default values.
pub fn apply_default(config: &Config) -> Config {
    Config {
        port: match config.port {
            None => Some(DEF_PORT),
            Some(port) => Some(port),
        },
        cert_file: config.cert_file.clone(),
        key_file: config.key_file.clone(),
        schema_file: config.schema_file.clone(),
        ref_gateway: match config.ref_gateway.as_ref() {
            None => Some(DEF_REF_GATEWAY.to_string()),
            Some(gateway) => Some(gateway.clone()),
        },
        max_records: match config.max_records {
            None | Some(0) => Some(DEF_MAX_RECORDS),
            Some(max) => Some(max),
        },
    }
}
