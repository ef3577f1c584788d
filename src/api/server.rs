//! HTTP server lifecycle.

use std::net::SocketAddr;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

/// Bind `addr` and serve the API until Ctrl-C.
pub async fn serve(addr: SocketAddr, ctx: ApiContext) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "Intake API listening");

    axum::serve(listener, api_router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Intake API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
