//! Tandem Web Server
//!
//! Axum-based REST API for the Tandem shared expense tracker.
//!
//! Every authenticated route takes the acting user as a `user_id` query
//! parameter; the deployment fronts this API with its own identity layer.
//! Partner-scoped reads (`include_partner=true`) expand to the linked
//! partner's expenses when one exists.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tandem_core::ai::{AIBackend, AIClient};
use tandem_core::db::Database;
use tandem_core::extract::Extractor;
use tandem_core::Config;

mod handlers;

/// Maximum pagination limit for expense listings
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub ai: AIClient,
    /// Compiled email extraction rules, shared across sync runs
    pub extractor: Extractor,
    /// HTTP client for OAuth token exchange
    pub http_client: reqwest::Client,
}

/// Create the application router
pub fn create_router(db: Database, config: Config, ai: AIClient) -> Router {
    let frontend_url = config.frontend_url.clone();

    let state = Arc::new(AppState {
        db,
        config,
        ai,
        extractor: Extractor::new(),
        http_client: reqwest::Client::new(),
    });

    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Auth and profile
        .route("/auth/register", post(handlers::register))
        .route("/auth/me", get(handlers::get_me))
        .route("/auth/google/login", get(handlers::google_login))
        .route("/auth/google/callback", get(handlers::google_callback))
        // Expenses
        .route(
            "/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route("/expenses/stats", get(handlers::expense_stats))
        .route(
            "/expenses/:id",
            get(handlers::get_expense)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        // Categories
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/:id",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        // Gmail import
        .route("/gmail/status", get(handlers::gmail_status))
        .route("/gmail/sync", post(handlers::gmail_sync))
        .route("/gmail/disconnect", post(handlers::gmail_disconnect))
        // Analysis
        .route("/analysis", post(handlers::run_analysis))
        .route("/analysis/comparison", get(handlers::partner_comparison))
        .route("/analysis/categorize", post(handlers::categorize_expense))
        // Partners
        .route("/partners/me", get(handlers::get_partner))
        .route("/partners/invite", post(handlers::create_invite))
        .route("/partners/invites", get(handlers::list_invites))
        .route("/partners/invites/:id/accept", post(handlers::accept_invite))
        .route(
            "/partners/invites/:id/decline",
            post(handlers::decline_invite),
        )
        .route("/partners/link", delete(handlers::unlink_partner));

    // Frontend origin plus localhost dev servers
    let origins: Vec<HeaderValue> = [
        frontend_url.as_str(),
        "http://localhost:5173",
        "http://localhost:3000",
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(db: Database, config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let ai = AIClient::from_config(&config);
    if ai.health_check().await {
        info!("AI backend connected: {}", ai.model());
    } else {
        warn!(
            "AI backend not responding ({}); analysis will use numeric fallbacks",
            ai.model()
        );
    }

    let app = create_router(db, config, ai);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<tandem_core::Error> for AppError {
    fn from(err: tandem_core::Error) -> Self {
        use tandem_core::Error;
        match err {
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::Forbidden(msg) => Self::forbidden(&msg),
            Error::Conflict(msg) => Self::conflict(&msg),
            Error::InvalidData(msg) => Self::bad_request(&msg),
            // Gmail failures keep their text so a failed sync is actionable
            Error::Mail(msg) => Self::internal(&format!("Gmail error: {}", msg)),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(other.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests;
