//! JSON status handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::super::types::StatusState;
use crate::config::SERVICE_NAME;
use crate::geoip::StatusReply;

/// Aggregated health: 200 when every probe is healthy, 503 otherwise
pub async fn status_handler(State(state): State<StatusState>) -> Response {
    let probe = state.manager.status();
    let reply = StatusReply::from_probes(SERVICE_NAME, vec![(*probe).clone()]);

    let code = if probe.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(reply)).into_response()
}
