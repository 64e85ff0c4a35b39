//! Server-side code for the pest-control call desk
//!
//! This module contains all backend functionality:
//! - Database access (PostgreSQL via sqlx)
//! - Retell voice-agent webhooks (signature checks, payload parsing)
//! - Ticket, call record and customer lifecycle
//! - Call summary emails

pub mod config;
pub mod customers;
pub mod db;
pub mod email;
pub mod error;
pub mod lifecycle;
pub mod notifications;
pub mod phone;
pub mod rate_limit;
pub mod retell;
pub mod store;
pub mod webhooks;

#[cfg(test)]
mod lifecycle_tests;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use lifecycle::CallLifecycle;
use notifications::SummaryMailer;
use rate_limit::{InMemoryRateLimiter, RateLimiter};
use store::PgCallStore;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: CallLifecycle,
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Unset rejects every webhook with a configuration error.
    pub webhook_secret: Option<String>,
    pub rate_limit: u32,
    pub rate_window: Duration,
}

/// Create the Axum router with all API routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(health_check))

        // Retell webhooks
        .route("/webhooks/retell-inbound-ticket", post(webhooks::handle_retell_webhook))
        .route("/api/webhooks/retell-inbound-ticket", post(webhooks::handle_retell_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Run the server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    // Initialize database
    let pool = db::init_pool(&config.database_url).await?;

    // Run migrations (non-fatal if already applied)
    if let Err(e) = db::run_migrations(&pool).await {
        tracing::warn!("Migration warning (may be already applied): {}", e);
    }

    // Email is optional; without SMTP settings summaries are skipped
    let mailer: Option<Arc<dyn SummaryMailer>> = match email::EmailService::from_env() {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            tracing::warn!("Email service not configured: {}. Call summary emails will be disabled.", e);
            None
        }
    };

    if config.webhook_secret.is_none() {
        tracing::warn!("RETELL_WEBHOOK_SECRET not set, webhooks will be rejected");
    }

    let state = AppState {
        lifecycle: CallLifecycle::new(Arc::new(PgCallStore::new(pool)), mailer),
        rate_limiter: Arc::new(InMemoryRateLimiter::new()),
        webhook_secret: config.webhook_secret.clone(),
        rate_limit: config.rate_limit,
        rate_window: config.rate_window,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Server running on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
