use std::{error::Error as StdError, fs, net::SocketAddr, time::Duration};

use axum::{Router, ServiceExt, extract::Request};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Arg as ClapArg, Command};
use log::{self, error, info};
use serde::Deserialize;
use sylvia_iot_sdk::util::logger;
use tokio;
use tower_http::{cors::CorsLayer, normalize_path::NormalizePath, timeout::TimeoutLayer};

use tracker_server::{libs, routes};

#[derive(Deserialize)]
struct AppConfig {
    log: logger::Config,
    #[serde(rename = "trackerServer")]
    tracker_server: libs::config::Config,
}

const PROJ_NAME: &'static str = env!("CARGO_PKG_NAME");
const PROJ_VER: &'static str = env!("CARGO_PKG_VERSION");
const SERV_PATH: &'static str = "/tracker";
const REQ_TIMEOUT_SECS: u64 = 60;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    const FN_NAME: &'static str = "main";

    let conf = match init_config() {
        Err(e) => {
            let conf = &logger::Config {
                ..Default::default()
            };
            logger::init(PROJ_NAME, &conf);
            error!("[{}] read config error: {}", FN_NAME, e);
            return Ok(());
        }
        Ok(conf) => conf,
    };

    logger::init(PROJ_NAME, &conf.log);

    let tracker_conf = libs::config::apply_default(&conf.tracker_server);
    let state = match routes::new_state(SERV_PATH, &tracker_conf).await {
        Err(e) => {
            error!("[{}] new state error: {}", FN_NAME, e);
            return Ok(());
        }
        Ok(state) => state,
    };
    let app: Router = routes::new_service(&state)
        .layer(TimeoutLayer::new(Duration::from_secs(REQ_TIMEOUT_SECS)))
        .layer(CorsLayer::permissive());
    let app = NormalizePath::trim_trailing_slash(app);

    let port = match tracker_conf.port {
        None => libs::config::DEF_PORT,
        Some(port) => port,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    match (tracker_conf.cert_file.as_ref(), tracker_conf.key_file.as_ref()) {
        (Some(cert), Some(key)) => {
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            let tls = match RustlsConfig::from_pem_file(cert, key).await {
                Err(e) => {
                    error!("[{}] load TLS files error: {}", FN_NAME, e);
                    return Ok(());
                }
                Ok(tls) => tls,
            };
            info!("[{}] HTTPS on {}{}", FN_NAME, addr, SERV_PATH);
            axum_server::bind_rustls(addr, tls)
                .serve(ServiceExt::<Request>::into_make_service(app))
                .await
        }
        _ => {
            info!("[{}] HTTP on {}{}", FN_NAME, addr, SERV_PATH);
            axum_server::bind(addr)
                .serve(ServiceExt::<Request>::into_make_service(app))
                .await
        }
    }
}

fn init_config() -> Result<AppConfig, Box<dyn StdError>> {
    let mut args = Command::new(PROJ_NAME).version(PROJ_VER).arg(
        ClapArg::new("file")
            .short('f')
            .long("file")
            .help("config file")
            .num_args(1),
    );
    args = logger::reg_args(args);
    args = libs::config::reg_args(args);
    let args = args.get_matches();

    if let Some(v) = args.get_one::<String>("file") {
        let conf_str = fs::read_to_string(v)?;
        return Ok(json5::from_str(conf_str.as_str())?);
    }

    Ok(AppConfig {
        log: logger::read_args(&args),
        tracker_server: libs::config::read_args(&args),
    })
}
