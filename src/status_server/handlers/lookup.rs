//! IP lookup handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::super::types::{ErrorResponse, StatusState};
use crate::error_handling::LookupError;

/// Combined city and ASN record
pub async fn lookup_handler(State(state): State<StatusState>, Path(ip): Path<String>) -> Response {
    respond(state.manager.lookup(&ip))
}

pub async fn city_handler(State(state): State<StatusState>, Path(ip): Path<String>) -> Response {
    respond(state.manager.lookup_city(&ip))
}

pub async fn asn_handler(State(state): State<StatusState>, Path(ip): Path<String>) -> Response {
    respond(state.manager.lookup_asn(&ip))
}

fn respond<T: Serialize>(result: Result<T, LookupError>) -> Response {
    match result {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => {
            let code = match &e {
                LookupError::InvalidIp(_) => StatusCode::BAD_REQUEST,
                LookupError::NotFound { .. } => StatusCode::NOT_FOUND,
                LookupError::NotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
                LookupError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            log::debug!("Lookup failed ({}): {}", code, e);
            (code, Json(ErrorResponse { error: e.to_string() })).into_response()
        }
    }
}
