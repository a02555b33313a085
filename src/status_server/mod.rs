//! HTTP status server in front of the GeoIP manager.
//!
//! Endpoints:
//! - `/status` - cached health probe, 503 when unhealthy
//! - `/lookup/{ip}` - combined city and ASN record
//! - `/city/{ip}` and `/asn/{ip}` - single-database lookups

mod handlers;
mod types;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use handlers::{asn_handler, city_handler, lookup_handler, status_handler};
pub use types::{ErrorResponse, StatusState};

/// Routes served by the status server
pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/lookup/{ip}", get(lookup_handler))
        .route("/city/{ip}", get(city_handler))
        .route("/asn/{ip}", get(asn_handler))
        .with_state(state)
}

/// Binds `127.0.0.1:<port>` and serves until `shutdown` is cancelled
pub async fn start_status_server(
    port: u16,
    state: StatusState,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind status server to port {}: {}", port, e))?;

    log::info!("Status server listening on http://127.0.0.1:{}/", port);
    log::info!("  - Status: http://127.0.0.1:{}/status", port);
    log::info!("  - Lookup: http://127.0.0.1:{}/lookup/<ip>", port);

    serve(listener, state, shutdown).await
}

/// Serves on an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: StatusState,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("Status server error: {}", e))?;

    Ok(())
}
