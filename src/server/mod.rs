//! HTTP surface of the engine service

mod router;
mod state;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use router::build_router;
pub use state::ServeState;

/// Serve `state` on `addr` until `shutdown` resolves.
pub async fn serve<F>(state: ServeState, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind plan server on {}", addr))?;
    let local = listener.local_addr().unwrap_or(addr);
    info!(addr = %local, "Plan server listening");

    let service = state.service().clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested; interrupting active run");
            service.shutdown();
        })
        .await
        .context("plan server exited unexpectedly")?;
    Ok(())
}
