//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use emr_core::ports::PortError;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::web::auth::{session_cookie, session_id_from_headers};
use crate::web::state::AppState;

/// Middleware that validates the auth session cookie and extracts the patient id.
///
/// If valid, inserts the patient id into request extensions for handlers to use,
/// pushes the session expiry forward and re-issues the cookie, so the session
/// lives as long as it keeps being used. If invalid or missing, returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Parse session ID from cookie
    let auth_session_id = session_id_from_headers(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    // 2. Validate auth session in database, get patient_id
    let patient_id = state
        .sessions
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => StatusCode::UNAUTHORIZED,
            PortError::Unavailable(detail) => {
                warn!("Session store unavailable: {}", detail);
                StatusCode::SERVICE_UNAVAILABLE
            }
            other => {
                error!("Failed to validate auth session: {:?}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    // 3. Slide the expiry forward
    let ttl = state.session_ttl();
    if let Err(e) = state
        .sessions
        .refresh_auth_session(&auth_session_id, Utc::now() + ttl)
        .await
    {
        warn!("Failed to refresh auth session for patient {}: {:?}", patient_id, e);
    }

    // 4. Insert patient_id into request extensions and continue to the handler
    req.extensions_mut().insert(patient_id);
    let mut response = next.run(req).await;

    let cookie = session_cookie(&auth_session_id, ttl, state.config.cookie_secure);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(response)
}

/// Middleware guarding the admin console with a static bearer token.
///
/// Without a configured token the console is closed to everyone.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or(StatusCode::FORBIDDEN)?;

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        warn!("Rejected admin request with a wrong token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
