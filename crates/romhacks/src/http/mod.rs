//! HTTP server.
//!
//! One axum router serves the public pages, the public JSON API and the admin
//! JSON API. Handlers share an [`AppState`] and report failures as
//! [`Error`](crate::error::Error), which renders itself as a JSON error body.

pub mod admin;
pub mod api;
pub mod auth;
pub mod client_ip;
mod error;
pub mod form;
pub mod pages;
pub mod rate_limit;
pub mod render;
pub mod state;

pub use state::AppState;

use std::net::SocketAddr;

use axum::routing::{get, patch, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::Result;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let admin: Router<AppState> = Router::new()
        .route("/submissions", get(admin::list_submissions))
        .route("/submissions/counts", get(admin::submission_counts))
        .route("/submission/{id}", get(admin::get_submission))
        .route("/submission/{id}/approve", post(admin::approve_submission))
        .route("/submission/{id}/reject", post(admin::reject_submission))
        .route("/feedback", get(admin::list_feedback))
        .route(
            "/feedback/{id}",
            post(admin::update_feedback).delete(admin::delete_feedback),
        )
        .route("/entry", post(admin::create_entry))
        .route(
            "/entry/{id}",
            patch(admin::update_entry).delete(admin::delete_entry),
        )
        .route(
            "/entry/{id}/instructions/{platform}",
            put(admin::set_instructions),
        )
        .route("/archive", post(admin::archive))
        .route("/stats", get(admin::stats));

    let mut app = Router::new()
        .route("/", get(pages::index))
        .route("/romhacks", get(pages::romhacks))
        .route("/ports", get(pages::ports))
        .route("/game/{id}", get(pages::detail))
        .route("/api/entries", get(api::list_entries))
        .route("/api/entries/{id}", get(api::get_entry))
        .route("/api/track-download/{id}", post(api::track_download))
        .route("/api/submit", post(api::submit))
        .route("/api/feedback", post(api::feedback))
        .route("/api/popular", get(api::popular_months))
        .route("/api/popular/{month}", get(api::popular_month))
        .route("/healthz", get(api::health))
        .route("/admin/login", post(auth::login))
        .route("/admin/logout", post(auth::logout))
        .nest("/api/admin", admin);

    if let Some(dir) = &state.config.server.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve the application on `addr` until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
