use std::{
    error::Error as StdError,
    fs,
    io::{Error as IoError, ErrorKind},
    sync::{Arc, Mutex},
};

use axum::{
    Router,
    extract::{FromRequestParts, Query as AxumQuery},
    http::request::Parts,
};
use log::info;
use serde::de::DeserializeOwned;
use sylvia_iot_sdk::util::err::ErrResp;
use tracker_codec::SchemaRegistry;

mod v1;

use crate::libs::{
    config::{self, Config},
    ingest::Ingestor,
    latest::LatestValues,
    store::{MemoryStore, RecordStore},
};

/// The resources used by this service.
#[derive(Clone)]
pub struct State {
    /// The scope root path for the service.
    ///
    /// For example `tracker`, the APIs are
    /// - `http://host:port/tracker/api/v1/uplink`
    /// - `http://host:port/tracker/api/v1/data/xxx`
    pub scope_path: &'static str,
    pub store: Arc<dyn RecordStore>,
    pub latest: Arc<Mutex<LatestValues>>,
    pub ingestor: Ingestor,
}

/// To create resources for the service.
pub async fn new_state(
    scope_path: &'static str,
    conf: &Config,
) -> Result<State, Box<dyn StdError>> {
    const FN_NAME: &'static str = "new_state";

    let conf = config::apply_default(conf);
    let registry = match conf.schema_file.as_ref() {
        None => SchemaRegistry::builtin(),
        Some(path) => {
            info!("[{}] load schema table {}", FN_NAME, path);
            SchemaRegistry::from_json5(fs::read_to_string(path)?.as_str())
        }
    };
    let registry = match registry {
        Err(e) => return Err(Box::new(IoError::new(ErrorKind::InvalidInput, e))),
        Ok(registry) => Arc::new(registry),
    };

    let store: Arc<dyn RecordStore> = match conf.max_records {
        None => Arc::new(MemoryStore::new(config::DEF_MAX_RECORDS)),
        Some(max) => Arc::new(MemoryStore::new(max)),
    };
    let ref_gateway = match conf.ref_gateway.as_ref() {
        None => config::DEF_REF_GATEWAY,
        Some(gateway) => gateway.as_str(),
    };
    let latest = Arc::new(Mutex::new(LatestValues::new(
        registry.devices().len(),
        ref_gateway,
    )));
    let ingestor = Ingestor::new(registry, store.clone(), latest.clone());

    Ok(State {
        scope_path,
        store,
        latest,
        ingestor,
    })
}

/// To register service URIs in the specified root path.
pub fn new_service(state: &State) -> Router {
    Router::new().nest(
        state.scope_path,
        Router::new()
            .merge(v1::uplink::new_service("/api/v1/uplink", state))
            .merge(v1::data::new_service("/api/v1/data", state)),
    )
}

/// Query string extractor that reports malformed parameters as [`ErrResp::ErrParam`].
pub struct Query<T>(pub T);

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ErrResp;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AxumQuery::<T>::from_request_parts(parts, state).await {
            Err(e) => Err(ErrResp::ErrParam(Some(e.body_text()))),
            Ok(query) => Ok(Query(query.0)),
        }
    }
}
