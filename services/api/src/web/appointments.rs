//! services/api/src/web/appointments.rs
//!
//! Admin console handlers for a patient's appointments.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{port_failure, HandlerError};
use crate::web::protocol::{AppointmentRequest, AppointmentResponse, DeletedResponse};
use crate::web::state::AppState;

#[utoipa::path(
    get,
    path = "/admin/patients/{id}/appointments",
    params(("id" = Uuid, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Appointments by date, earliest first", body = [AppointmentResponse]),
        (status = 404, description = "Unknown patient")
    )
)]
pub async fn list_appointments_handler(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<AppointmentResponse>>, HandlerError> {
    // Unknown patients are a 404, not an empty list.
    state
        .patients
        .get_patient(patient_id)
        .await
        .map_err(|e| port_failure("list appointments", e))?;
    let appointments = state
        .appointments
        .list_appointments(patient_id)
        .await
        .map_err(|e| port_failure("list appointments", e))?;
    Ok(Json(appointments.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/admin/patients/{id}/appointments",
    params(("id" = Uuid, Path, description = "Patient id")),
    request_body = AppointmentRequest,
    responses(
        (status = 201, description = "Appointment created", body = AppointmentResponse),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Unknown patient")
    )
)]
pub async fn create_appointment_handler(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<AppointmentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let details = req
        .into_details()
        .map_err(|e| port_failure("create appointment", e))?;
    let appointment = state
        .appointments
        .create_appointment(patient_id, details)
        .await
        .map_err(|e| port_failure("create appointment", e))?;
    info!("Created appointment {} for patient {}", appointment.id, patient_id);
    Ok((StatusCode::CREATED, Json(AppointmentResponse::from(appointment))))
}

#[utoipa::path(
    put,
    path = "/admin/appointments/{id}",
    params(("id" = Uuid, Path, description = "Appointment id")),
    request_body = AppointmentRequest,
    responses(
        (status = 200, description = "Appointment replaced", body = AppointmentResponse),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Unknown appointment")
    )
)]
pub async fn update_appointment_handler(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<AppointmentRequest>,
) -> Result<Json<AppointmentResponse>, HandlerError> {
    let details = req
        .into_details()
        .map_err(|e| port_failure("update appointment", e))?;
    let appointment = state
        .appointments
        .update_appointment(appointment_id, details)
        .await
        .map_err(|e| port_failure("update appointment", e))?;
    Ok(Json(appointment.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/appointments/{id}",
    params(("id" = Uuid, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment deleted", body = DeletedResponse),
        (status = 404, description = "Unknown appointment")
    )
)]
pub async fn delete_appointment_handler(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, HandlerError> {
    state
        .appointments
        .delete_appointment(appointment_id)
        .await
        .map_err(|e| port_failure("delete appointment", e))?;
    info!("Deleted appointment {}", appointment_id);
    Ok(Json(DeletedResponse { success: true }))
}
