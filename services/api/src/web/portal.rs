//! services/api/src/web/portal.rs
//!
//! Patient portal handlers. Each one loads the logged-in patient's records and
//! runs them through the schedule evaluator for a window starting now.

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use emr_core::domain::{Appointment, Prescription};
use emr_core::schedule::{
    occurrences_in_window, Window, DASHBOARD_HORIZON_DAYS, LIST_HORIZON_DAYS,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{port_failure, HandlerError};
use crate::web::protocol::{
    AppointmentOccurrenceResponse, AppointmentScheduleResponse, DashboardResponse,
    RefillOccurrenceResponse, RefillScheduleResponse, WindowQuery,
};
use crate::web::state::AppState;

fn upcoming(now: DateTime<Utc>, days: u32) -> Result<Window, HandlerError> {
    Window::upcoming(now, days).map_err(|e| port_failure("build window", e.into()))
}

fn appointment_occurrences(
    appointments: &[Appointment],
    window: &Window,
    now: DateTime<Utc>,
) -> Result<Vec<AppointmentOccurrenceResponse>, HandlerError> {
    let found = occurrences_in_window(appointments, window)
        .map_err(|e| port_failure("evaluate appointments", e.into()))?;
    Ok(found
        .iter()
        .map(|o| AppointmentOccurrenceResponse::new(o, now))
        .collect())
}

fn refill_occurrences(
    prescriptions: &[Prescription],
    window: &Window,
    now: DateTime<Utc>,
) -> Result<Vec<RefillOccurrenceResponse>, HandlerError> {
    let found = occurrences_in_window(prescriptions, window)
        .map_err(|e| port_failure("evaluate prescriptions", e.into()))?;
    Ok(found
        .iter()
        .map(|o| RefillOccurrenceResponse::new(o, now))
        .collect())
}

/// Appointments and refills due in the next seven days.
#[utoipa::path(
    get,
    path = "/portal/dashboard",
    responses(
        (status = 200, description = "Upcoming appointments and refills", body = DashboardResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(patient_id): Extension<Uuid>,
) -> Result<Json<DashboardResponse>, HandlerError> {
    let now = Utc::now();
    let window = upcoming(now, DASHBOARD_HORIZON_DAYS)?;

    let appointments = state
        .appointments
        .list_appointments(patient_id)
        .await
        .map_err(|e| port_failure("load appointments", e))?;
    let prescriptions = state
        .prescriptions
        .list_prescriptions(patient_id)
        .await
        .map_err(|e| port_failure("load prescriptions", e))?;

    Ok(Json(DashboardResponse::new(
        &window,
        appointment_occurrences(&appointments, &window, now)?,
        refill_occurrences(&prescriptions, &window, now)?,
    )))
}

/// Every appointment occurrence in the next `days` days (default 90).
#[utoipa::path(
    get,
    path = "/portal/appointments",
    params(WindowQuery),
    responses(
        (status = 200, description = "Appointment occurrences, earliest first", body = AppointmentScheduleResponse),
        (status = 400, description = "Horizon out of range"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn portal_appointments_handler(
    State(state): State<Arc<AppState>>,
    Extension(patient_id): Extension<Uuid>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<AppointmentScheduleResponse>, HandlerError> {
    let now = Utc::now();
    let window = upcoming(now, query.days.unwrap_or(LIST_HORIZON_DAYS))?;

    let appointments = state
        .appointments
        .list_appointments(patient_id)
        .await
        .map_err(|e| port_failure("load appointments", e))?;

    Ok(Json(AppointmentScheduleResponse {
        window_start: window.start(),
        window_end: window.end(),
        occurrences: appointment_occurrences(&appointments, &window, now)?,
    }))
}

/// Every refill in the next `days` days (default 90).
#[utoipa::path(
    get,
    path = "/portal/prescriptions",
    params(WindowQuery),
    responses(
        (status = 200, description = "Refill occurrences, earliest first", body = RefillScheduleResponse),
        (status = 400, description = "Horizon out of range"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn portal_prescriptions_handler(
    State(state): State<Arc<AppState>>,
    Extension(patient_id): Extension<Uuid>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<RefillScheduleResponse>, HandlerError> {
    let now = Utc::now();
    let window = upcoming(now, query.days.unwrap_or(LIST_HORIZON_DAYS))?;

    let prescriptions = state
        .prescriptions
        .list_prescriptions(patient_id)
        .await
        .map_err(|e| port_failure("load prescriptions", e))?;

    Ok(Json(RefillScheduleResponse {
        window_start: window.start(),
        window_end: window.end(),
        occurrences: refill_occurrences(&prescriptions, &window, now)?,
    }))
}
