//! Local HTTP server: embedded frontend, JSON API and event stream.

mod assets;
mod dialogs;
mod error;
mod handlers;

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::session::Session;

pub use assets::Assets;
pub use error::ApiError;

/// Build the application router over `session`.
pub fn router(session: Session) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/assets/{*path}", get(handlers::asset))
        .route("/config.yaml", get(handlers::config_yaml))
        .route("/api/config", get(handlers::config_json))
        .route("/api/tabs", get(handlers::list_tabs).post(handlers::create_tab))
        .route("/api/open-path", post(handlers::open_path))
        .route(
            "/api/tabs/{id}",
            get(handlers::get_tab)
                .put(handlers::update_tab)
                .delete(handlers::close_tab),
        )
        .route("/api/tabs/{id}/activate", post(handlers::activate_tab))
        .route("/api/tabs/{id}/save", post(handlers::save_tab))
        .route("/api/tabs/{id}/save-as", post(handlers::save_tab_as))
        .route("/api/tabs/{id}/export", post(handlers::export_tab))
        .route("/api/dialogs", get(dialogs::availability))
        .route("/api/dialogs/open", post(dialogs::pick_open))
        .route("/api/dialogs/save", post(dialogs::pick_save))
        .route("/events", get(handlers::events))
        .layer(TraceLayer::new_for_http())
        .with_state(session)
}

/// A bound listener and the URL it answers on.
pub struct Bound {
    pub listener: TcpListener,
    pub url: String,
}

/// Bind to loopback. Port 0 picks a free port.
pub async fn bind(port: u16) -> io::Result<Bound> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
    let addr = listener.local_addr()?;
    Ok(Bound {
        listener,
        url: format!("http://{addr}"),
    })
}

/// Serve until the task is dropped or the listener fails.
pub async fn serve(listener: TcpListener, session: Session) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "server listening");
    }
    axum::serve(listener, router(session)).await
}
