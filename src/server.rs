//!
//! GraviTime gateway HTTP server
//! -----------------------------
//! Axum-based HTTP surface of the gateway.
//!
//! Responsibilities:
//! - Login/logout endpoints brokering credentials to the Odoo upstream.
//! - Bearer-token session verification with TTL refresh on every hit.
//! - The authenticated APK download with no-store caching and an audit log.
//! - Health endpoint and a JSON 404 fallback.
//! - Background sweep of expired sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::identity::SessionManager;
use crate::odoo::OdooClient;

/// Shared server state injected into all handlers.
///
/// The session manager exclusively owns the session table for the process
/// lifetime; nothing else reads or mutates it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub sessions: Arc<SessionManager>,
    pub odoo: OdooClient,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let odoo = OdooClient::from_config(&config)?;
        let sessions = Arc::new(SessionManager::new(config.session_timeout_secs));
        Ok(Self {
            config: Arc::new(config),
            sessions,
            odoo,
        })
    }
}

/// Start the gateway bound to the configured port.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "GraviTime gateway starting: port={}, env={}, odoo_host={}, odoo_db={}, session_ttl_secs={}",
        config.port, config.env, config.odoo_host, config.odoo_db, config.session_timeout_secs
    );
    let port = config.port;
    let state = AppState::new(config)?;
    spawn_session_sweeper(&state);

    let app = build_router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Mount all routes. Split out from `run` so tests can drive the router
/// directly without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/verify", get(verify))
        .route("/api/download/apk", get(download_apk))
        .route("/api/health", get(health))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Periodically drop expired sessions so abandoned tokens don't accumulate.
/// Lazy expiry-on-read still covers correctness; this only bounds memory.
fn spawn_session_sweeper(state: &AppState) {
    let interval_sec = state.config.sweep_interval_secs;
    if interval_sec <= 0 {
        info!("session sweeper disabled");
        return;
    }
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        use std::time::Duration;
        loop {
            let removed = sessions.sweep();
            if removed > 0 {
                tracing::debug!(removed = removed, "session_sweep");
            }
            tokio::time::sleep(Duration::from_secs(interval_sec as u64)).await;
        }
    });
}

/// Extract the bearer token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Standard `{ "error": ... }` envelope with the taxonomy's status mapping.
fn error_envelope(err: &GatewayError) -> (StatusCode, Json<Value>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": err.to_string() })))
}

/// Stable 500 envelope; internal detail is echoed only in development mode.
fn server_fault(state: &AppState, summary: &str, err: &GatewayError) -> Json<Value> {
    let mut body = json!({ "error": summary });
    if state.config.dev_mode() {
        body["message"] = json!(err.to_string());
    }
    Json(body)
}

#[derive(Debug, Deserialize, Default)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// POST /api/auth/login — authenticate against Odoo and mint a session.
///
/// The payload extractor is taken as a `Result` so a malformed or
/// wrongly-typed body still answers with the JSON error envelope instead
/// of axum's plain-text rejection.
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_envelope(&GatewayError::InvalidRequest(rejection.body_text()));
        }
    };

    // reject before any upstream call is made
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return error_envelope(&GatewayError::InvalidRequest(
            "Email and password are required".to_string(),
        ));
    }

    let outcome = state
        .odoo
        .authenticate(&payload.email, &payload.password)
        .await
        .and_then(|profile| state.sessions.issue(profile));
    match outcome {
        Ok(session) => {
            info!(
                target: "auth",
                "login ok user={} uid={}",
                session.record.profile.email, session.record.profile.uid
            );
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "token": session.token,
                    "userData": session.record.profile,
                })),
            )
        }
        Err(err @ GatewayError::AuthenticationFailed(_)) => {
            info!(target: "auth", "login rejected user={}", payload.email);
            error_envelope(&err)
        }
        Err(err) => {
            error!("login error: {err}");
            let status = StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                server_fault(&state, "Server error during authentication", &err),
            )
        }
    }
}

/// POST /api/auth/logout — drop the session if the token maps to one.
/// Always succeeds; logging out an absent or foreign token is not an error.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.logout(&token);
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    )
}

/// GET /api/auth/verify — validate the bearer token and extend its TTL.
async fn verify(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "valid": false, "error": "No token provided" })),
        );
    };
    match state.sessions.verify(&token) {
        Some(record) => (
            StatusCode::OK,
            Json(json!({ "valid": true, "userData": record.profile })),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "valid": false, "error": "Invalid or expired token" })),
        ),
    }
}

/// GET /api/download/apk — stream the gated APK to an authenticated session.
/// The response is marked non-cacheable: access is checked per request, not
/// per cached copy.
async fn download_apk(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return error_envelope(&GatewayError::Unauthorized(
            "Unauthorized: No authentication token provided".to_string(),
        ))
        .into_response();
    };
    let Some(record) = state.sessions.verify(&token) else {
        return error_envelope(&GatewayError::Unauthorized(
            "Unauthorized: Invalid or expired token".to_string(),
        ))
        .into_response();
    };

    let file = match tokio::fs::File::open(&state.config.apk_path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return error_envelope(&GatewayError::NotFound("APK file not found".to_string()))
                .into_response();
        }
        Err(e) => {
            error!("apk open failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                server_fault(
                    &state,
                    "Server error during file download",
                    &GatewayError::Internal(e.to_string()),
                ),
            )
                .into_response();
        }
    };

    // Audit trail: which principal pulled the build.
    info!(
        target: "audit",
        "APK downloaded by user {} (UID: {})",
        record.profile.email, record.profile.uid
    );

    let response_headers = [
        (
            header::CONTENT_TYPE,
            "application/vnd.android.package-archive".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", state.config.apk_filename),
        ),
        (
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate".to_string(),
        ),
        (header::PRAGMA, "no-cache".to_string()),
        (header::EXPIRES, "0".to_string()),
    ];
    (response_headers, Body::from_stream(ReaderStream::new(file))).into_response()
}

/// GET /api/health
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found", "path": uri.path() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parses_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_token_rejects_malformed_headers() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }
}
