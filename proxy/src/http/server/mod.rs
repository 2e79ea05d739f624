//! The HTTP server: router, middleware and the serve loop.

use core::net::SocketAddr;

use eyre::WrapErr as _;
use tokio::net;

use crate::app::{AppState, shutdown_signal};

#[macro_export]
macro_rules! cfg_if_expr {
    (
        #[cfg($condition: meta)]
        $true_block: expr,
        #[cfg(not)]
        $false_block: expr,
    ) => {{
        #[cfg($condition)]
        let _return = $true_block;
        #[cfg(not($condition))]
        let _return = $false_block;
        _return
    }};
}

pub mod middleware;
pub mod router;

/// Serve the query API on `addr` until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub(crate) async fn start_server(app_state: AppState, addr: SocketAddr) -> eyre::Result<()> {
    let app = router::create_app(app_state);

    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err(format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("HTTP server failed")?;
    tracing::info!("Received shutdown, shutting down");
    Ok(())
}
