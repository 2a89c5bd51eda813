use std::{io, net::SocketAddr};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

/// Liveness surface: a single unauthenticated route answering `OK`.
pub fn router() -> Router {
    Router::new().route("/", get(health))
}

async fn health() -> &'static str {
    "OK"
}

pub async fn serve(port: u16) -> io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener).await
}

pub async fn serve_on(listener: TcpListener) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "health endpoint listening");
    }
    axum::serve(listener, router()).await
}
