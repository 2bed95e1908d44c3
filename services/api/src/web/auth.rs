//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for patient login, logout and profile lookup,
//! plus the password and cookie helpers shared with the middleware and the
//! admin handlers.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use emr_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::error::{port_failure, HandlerError};
use crate::web::protocol::PatientResponse;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

//=========================================================================================
// Password and Cookie Helpers
//=========================================================================================

pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> PortResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| PortError::Unexpected(format!("Failed to parse password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn session_cookie(session_id: &str, ttl: Duration, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        if secure { " Secure;" } else { "" },
        ttl.num_seconds()
    )
}

pub fn cleared_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::zero(), secure)
}

/// Pulls the session id out of the `Cookie` header, if there is one.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix(prefix.as_str()))
        .filter(|id| !id.is_empty())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; sets the session cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let invalid_credentials = || (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string());

    // 1. Get patient by email
    let creds = match state.patients.get_credentials_by_email(req.email.trim()).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid_credentials()),
        Err(e) => return Err(port_failure("log in", e)),
    };

    // 2. Verify password
    let valid = verify_password(&req.password, &creds.hashed_password)
        .map_err(|e| port_failure("log in", e))?;
    if !valid {
        return Err(invalid_credentials());
    }

    // 3. Create the auth session
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + state.session_ttl();
    state
        .sessions
        .create_auth_session(&auth_session_id, creds.patient_id, expires_at)
        .await
        .map_err(|e| port_failure("create session", e))?;

    let patient = state
        .patients
        .get_patient(creds.patient_id)
        .await
        .map_err(|e| port_failure("log in", e))?;
    info!("Patient {} logged in", patient.id);

    // 4. Return the profile with the session cookie
    let cookie = session_cookie(&auth_session_id, state.session_ttl(), state.config.cookie_secure);
    let response = LoginResponse {
        id: patient.id,
        first_name: patient.first_name,
        last_name: patient.last_name,
        email: patient.email,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .sessions
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = cleared_session_cookie(state.config.cookie_secure);
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /auth/me - The logged-in patient's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The current patient", body = PatientResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Patient no longer exists")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(patient_id): Extension<Uuid>,
) -> Result<Json<PatientResponse>, HandlerError> {
    let patient = state
        .patients
        .get_patient(patient_id)
        .await
        .map_err(|e| port_failure("load patient", e))?;
    Ok(Json(patient.into()))
}
