//! Listener setup.

use crate::error::ServerResult;
use axum::Router;
use std::future::Future;
use tracing::info;

/// Serve `app` on `bind` until `shutdown` resolves.
pub async fn serve<F>(bind: &str, app: Router, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Server ready and accepting connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
