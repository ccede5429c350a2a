mod handlers;
mod state;

pub use state::{SharedNowPlaying, ServerState};

use crate::error::{Error, Result};
use axum::{routing::get, Router};
use std::net::{IpAddr, SocketAddr};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const PAGE_TEMPLATE: &str = include_str!("../../assets/index.html");
const POLL_INTERVAL_PLACEHOLDER: &str = "{{POLL_INTERVAL_MS}}";

/// The static page with its poll interval filled in.
pub fn render_page(poll_interval_ms: u64) -> String {
    PAGE_TEMPLATE.replace(POLL_INTERVAL_PLACEHOLDER, &poll_interval_ms.to_string())
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/now_playing", get(handlers::now_playing))
        .route("/login", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(host: &str, port: u16, state: ServerState) -> Result<()> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| Error::config(format!("invalid host address: {}", host)))?;
    let addr = SocketAddr::new(ip, port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving live lyrics at http://{}", addr);

    axum::serve(listener, make_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, shutting down"),
        Err(err) => {
            warn!(error = %err, "Cannot listen for Ctrl+C, running until killed");
            std::future::pending::<()>().await
        }
    }
}
