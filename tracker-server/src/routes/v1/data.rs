use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sylvia_iot_sdk::util::{err::ErrResp, http::Json};
use tracker_codec::UplinkRecord;

use super::super::{Query, State as AppState};
use crate::libs::{
    TIME_FORMAT,
    store::{RecordQuery, StoreStats},
};

#[derive(Deserialize)]
struct GetDataQuery {
    device: Option<String>,
    track: Option<i64>,
    start: Option<String>,
    end: Option<String>,
    hdop: Option<f64>,
    sf: Option<u8>,
    txpow: Option<i64>,
}

#[derive(Serialize)]
struct GetDataRes {
    data: Vec<UplinkRecord>,
}

#[derive(Serialize)]
struct GetStatsRes {
    data: StoreStats,
}

pub fn new_service(scope_path: &str, state: &AppState) -> Router {
    Router::new().nest(
        scope_path,
        Router::new()
            .route("/", routing::get(get_data))
            .route("/stats", routing::get(get_stats))
            .with_state(state.clone()),
    )
}

/// `GET /{base}/api/v1/data`
///
/// Query parameters, all optional:
/// - `device`: device EUI
/// - `track`: track ID
/// - `start`, `end`: exclusive UTC time bounds as `%Y-%m-%d_%H:%M:%S`
/// - `hdop`: exclusive HDOP upper bound
/// - `sf`: spreading factor
/// - `txpow`: TX power
async fn get_data(
    State(state): State<AppState>,
    Query(query): Query<GetDataQuery>,
) -> Result<Json<GetDataRes>, ErrResp> {
    const FN_NAME: &'static str = "get_data";

    let query = RecordQuery {
        dev_eui: query.device,
        track: query.track,
        start: match query.start.as_ref() {
            None => None,
            Some(v) => Some(parse_time("start", v.as_str())?),
        },
        end: match query.end.as_ref() {
            None => None,
            Some(v) => Some(parse_time("end", v.as_str())?),
        },
        max_hdop: query.hdop,
        sp_fact: query.sf,
        tx_power: query.txpow,
    };
    match state.store.query(&query).await {
        Err(e) => {
            error!("[{}] query error: {}", FN_NAME, e);
            Err(ErrResp::ErrIntMsg(Some(format!("query error: {}", e))))
        }
        Ok(data) => Ok(Json(GetDataRes { data })),
    }
}

/// `GET /{base}/api/v1/data/stats`
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    const FN_NAME: &'static str = "get_stats";

    match state.store.stats().await {
        Err(e) => {
            error!("[{}] stats error: {}", FN_NAME, e);
            Err(ErrResp::ErrIntMsg(Some(format!("stats error: {}", e))))
        }
        Ok(data) => Ok(Json(GetStatsRes { data })),
    }
}

fn parse_time(name: &str, value: &str) -> Result<DateTime<Utc>, ErrResp> {
    match NaiveDateTime::parse_from_str(value, TIME_FORMAT) {
        Err(e) => Err(ErrResp::ErrParam(Some(format!(
            "`{}` is not in {} format: {}",
            name, TIME_FORMAT, e
        )))),
        Ok(t) => Ok(t.and_utc()),
    }
}
