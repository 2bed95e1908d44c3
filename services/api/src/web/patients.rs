//! services/api/src/web/patients.rs
//!
//! Admin console handlers for the patient directory.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{port_failure, HandlerError};
use crate::web::auth::hash_password;
use crate::web::protocol::{
    CreatePatientRequest, PatientRecordResponse, PatientResponse, PatientSummaryResponse,
    UpdatePatientRequest,
};
use crate::web::state::AppState;

/// List every patient, ordered by last name.
#[utoipa::path(
    get,
    path = "/admin/patients",
    responses(
        (status = 200, description = "All patients with record counts", body = [PatientSummaryResponse]),
        (status = 401, description = "Missing or wrong admin token")
    )
)]
pub async fn list_patients_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PatientSummaryResponse>>, HandlerError> {
    let patients = state
        .patients
        .list_patients()
        .await
        .map_err(|e| port_failure("list patients", e))?;
    Ok(Json(patients.into_iter().map(Into::into).collect()))
}

/// Register a new patient.
#[utoipa::path(
    post,
    path = "/admin/patients",
    request_body = CreatePatientRequest,
    responses(
        (status = 201, description = "Patient created", body = PatientResponse),
        (status = 400, description = "Invalid field"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_patient_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePatientRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let new_patient = req
        .into_new_patient(hash_password)
        .map_err(|e| port_failure("create patient", e))?;
    let patient = state
        .patients
        .create_patient(new_patient)
        .await
        .map_err(|e| port_failure("create patient", e))?;
    info!("Created patient {}", patient.id);
    Ok((StatusCode::CREATED, Json(PatientResponse::from(patient))))
}

/// A patient with all appointments and prescriptions, each sorted by date.
#[utoipa::path(
    get,
    path = "/admin/patients/{id}",
    params(("id" = Uuid, Path, description = "Patient id")),
    responses(
        (status = 200, description = "The patient's full record", body = PatientRecordResponse),
        (status = 404, description = "Unknown patient")
    )
)]
pub async fn get_patient_handler(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<PatientRecordResponse>, HandlerError> {
    let record = state
        .patients
        .get_patient_record(patient_id)
        .await
        .map_err(|e| port_failure("load patient", e))?;
    Ok(Json(record.into()))
}

/// Change some of a patient's details. The password is replaced only when given.
#[utoipa::path(
    put,
    path = "/admin/patients/{id}",
    params(("id" = Uuid, Path, description = "Patient id")),
    request_body = UpdatePatientRequest,
    responses(
        (status = 200, description = "Patient updated", body = PatientResponse),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Unknown patient"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_patient_handler(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<PatientResponse>, HandlerError> {
    let changes = req
        .into_changes(hash_password)
        .map_err(|e| port_failure("update patient", e))?;
    let patient = state
        .patients
        .update_patient(patient_id, changes)
        .await
        .map_err(|e| port_failure("update patient", e))?;
    Ok(Json(patient.into()))
}
