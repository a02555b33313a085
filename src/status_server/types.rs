//! Status server data structures.

use std::sync::Arc;

use serde::Serialize;

use crate::geoip::GeoManager;

/// Shared state for the status server
#[derive(Clone)]
pub struct StatusState {
    pub manager: Arc<GeoManager>,
}

/// JSON body for failed requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
