pub mod emails;
pub mod health;
pub mod upload;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Résumé ingestion side-channel
        .route("/api/upload", post(upload::handle_upload))
        .route("/api/analyse", post(upload::handle_analyse))
        // Email lifecycle API
        .route("/api/emails", post(emails::handle_compose))
        .route("/api/emails/generate", post(emails::handle_generate))
        .route("/api/emails/improve", post(emails::handle_improve))
        .route(
            "/api/emails/improve/stream",
            post(emails::handle_improve_stream),
        )
        .route("/api/emails/edit", post(emails::handle_edit))
        .route(
            "/api/emails/pending",
            get(emails::handle_pending).post(emails::handle_submit),
        )
        .route(
            "/api/emails/pending/refresh",
            post(emails::handle_refresh),
        )
        .route("/api/emails/approve", post(emails::handle_approve))
        .route("/api/emails/send", post(emails::handle_send))
        .route("/api/emails/sent", get(emails::handle_sent))
        .route("/api/emails/:id/thread", get(emails::handle_thread))
        .with_state(state)
}
