pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use auth::{Authenticator, Owner};
pub use config::{LogFormat, ServerConfig};
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db: tally_storage::DbPool,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(db: tally_storage::DbPool, auth: Authenticator) -> Self {
        Self {
            db,
            auth: Arc::new(auth),
        }
    }
}

pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/transactions",
            get(routes::list_transactions)
                .post(routes::import_transactions)
                .patch(routes::update_transaction)
                .delete(routes::delete_transaction),
        )
        .route("/api/transactions/summary", get(routes::spending_summary))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
