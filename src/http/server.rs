//! HTTP Server
//!
//! Router construction and the serve loop.

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::users::UserStore;

use super::handlers::{self, AppState};

/// Build the service router over `store`
///
/// ```text
/// GET  /backup               whole-store snapshot download
/// POST /users                add a user (JSON)
/// GET  /users/search         exact lookup by ?email= or ?phone=
/// GET  /users/fuzzysearch    email prefix lookup by ?email=
/// GET  /users/:id            fetch a user
/// ```
pub fn router(store: Arc<UserStore>, config: &Config) -> Router {
    Router::new()
        .route("/backup", get(handlers::backup))
        .route("/users", post(handlers::add_user))
        .route("/users/search", get(handlers::search))
        .route("/users/fuzzysearch", get(handlers::fuzzy_search))
        .route("/users/:id", get(handlers::get_user))
        .layer(DefaultBodyLimit::max(config.max_request_bytes))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

/// Bind `config.listen_addr` and serve until `shutdown` resolves
pub async fn serve<F>(config: &Config, store: Arc<UserStore>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&config.listen_addr).await?;
    serve_on(listener, config, store, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve_on<F>(
    listener: TcpListener,
    config: &Config,
    store: Arc<UserStore>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Starting usercollect server at address: {}", listener.local_addr()?);

    axum::serve(listener, router(store, config))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
