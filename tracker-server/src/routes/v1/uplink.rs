use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing,
};
use log::error;
use serde::{Deserialize, Serialize};
use sylvia_iot_sdk::util::{err::ErrResp, http::Json};
use tracker_codec::RawUplink;

use super::super::{Query, State as AppState};
use crate::libs::{envelope::Envelope, ingest::IngestError, latest::LatestValue};

#[derive(Deserialize)]
struct GetLatestQuery {
    dev: Option<String>,
}

#[derive(Serialize)]
struct PostUplinkRes {
    data: PostUplinkResData,
}

#[derive(Serialize)]
struct PostUplinkResData {
    #[serde(rename = "devEui")]
    dev_eui: String,
    #[serde(rename = "deviceClass")]
    device_class: String,
    #[serde(rename = "schemaVersion")]
    schema_version: String,
}

#[derive(Serialize)]
struct GetLatestRes {
    data: Option<LatestValue>,
}

pub fn new_service(scope_path: &str, state: &AppState) -> Router {
    Router::new().nest(
        scope_path,
        Router::new()
            .route("/", routing::post(post_uplink))
            .route("/latest", routing::get(get_latest))
            .with_state(state.clone()),
    )
}

/// `POST /{base}/api/v1/uplink`
///
/// Receives one ThingPark `DevEUI_uplink` message.
async fn post_uplink(
    State(state): State<AppState>,
    Json(body): Json<Envelope>,
) -> impl IntoResponse {
    const FN_NAME: &'static str = "post_uplink";

    let record = match state.ingestor.ingest(RawUplink::from(body)).await {
        Err(IngestError::Decode(e)) => return Err(ErrResp::ErrParam(Some(e.to_string()))),
        Err(IngestError::Store(e)) => {
            error!("[{}] save record error: {}", FN_NAME, e);
            return Err(ErrResp::ErrIntMsg(Some(format!("save record error: {}", e))));
        }
        Ok(record) => record,
    };
    Ok(Json(PostUplinkRes {
        data: PostUplinkResData {
            dev_eui: record.dev_eui,
            device_class: record.reading.device_class,
            schema_version: record.reading.schema_version,
        },
    }))
}

/// `GET /{base}/api/v1/uplink/latest?dev={devEui}`
async fn get_latest(
    State(state): State<AppState>,
    Query(query): Query<GetLatestQuery>,
) -> impl IntoResponse {
    let data = match query.dev.as_ref() {
        None => None,
        Some(dev) => match state.latest.lock() {
            Err(e) => return Err(ErrResp::ErrIntMsg(Some(e.to_string()))),
            Ok(mutex) => (*mutex).get(dev.as_str()).map(|x| x.clone()),
        },
    };
    Ok(Json(GetLatestRes { data }))
}
