//! # Stagegate HTTP API Module
//!
//! This module implements the HTTP policy decision API using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - History store status
//! - `GET /mapping` - Active mapping table
//! - `POST /access/evaluate` - Evaluate one file access request
//! - `POST /access/stages` - Assignable file stages for assignments + action
//! - `POST /rounds` - Record a review round
//! - `POST /rounds/latest` - Latest review round for submission + stage
//! - `POST /decisions` - Record an editorial decision
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `STAGEGATE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `STAGEGATE_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `STAGEGATE_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env};
pub use middleware::{
    DEFAULT_RATE_LIMIT, RATE_LIMIT_ENV, create_rate_limiter, get_rate_limit_from_env,
};
pub use handlers::{
    evaluate_handler, health_handler, latest_round_handler, mapping_handler,
    record_decision_handler, record_round_handler, stages_handler, status_handler,
};
pub use types::{
    DecisionRequest, DecisionResponse, EvaluateRequest, EvaluateResponse, HealthResponse,
    LatestRoundRequest, RoundJson, RoundRequest, RoundResponse, StagesRequest, StagesResponse,
    StatusResponse, parse_assignments,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use stagegate_core::{HistoryStore, MappingTable, StageGateError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable holding the allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "STAGEGATE_CORS_ORIGINS";

/// Maximum request body size (64 KB).
const MAX_BODY_SIZE: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// Evaluations take the history read lock, recordings the write lock. The
/// mapping table is immutable for the lifetime of the server.
#[derive(Clone)]
pub struct AppState {
    pub history: Arc<RwLock<HistoryStore>>,
    pub mapping: Arc<MappingTable>,
}

impl AppState {
    #[must_use]
    pub fn new(history: HistoryStore, mapping: MappingTable) -> Self {
        Self {
            history: Arc::new(RwLock::new(history)),
            mapping: Arc::new(mapping),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `STAGEGATE_CORS_ORIGINS`.
///
/// - `*`: allows all origins (development only)
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var(CORS_ORIGINS_ENV).ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins ({}=*). This is insecure for production!",
                CORS_ORIGINS_ENV
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", s);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in {}, defaulting to localhost only",
                    CORS_ORIGINS_ENV
                );
                build_localhost_cors()
            } else {
                cors_for(allowed_origins)
            }
        }
        None => {
            tracing::info!(
                "CORS: No {} set, defaulting to localhost only",
                CORS_ORIGINS_ENV
            );
            build_localhost_cors()
        }
    }
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();
    cors_for(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - if enabled
/// 4. Authentication - if an API key is configured
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set {} to enable authentication.",
            API_KEY_ENV
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/mapping", get(handlers::mapping_handler))
        .route("/access/evaluate", post(handlers::evaluate_handler))
        .route("/access/stages", post(handlers::stages_handler))
        .route("/rounds", post(handlers::record_round_handler))
        .route("/rounds/latest", post(handlers::latest_round_handler))
        .route("/decisions", post(handlers::record_decision_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(
    addr: &str,
    history: HistoryStore,
    mapping: MappingTable,
) -> Result<(), StageGateError> {
    let router = create_router(AppState::new(history, mapping));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StageGateError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Stagegate HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| StageGateError::IoError(format!("Server error: {}", e)))
}
