//! services/api/src/web/prescriptions.rs
//!
//! Admin console handlers for a patient's prescriptions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{port_failure, HandlerError};
use crate::web::protocol::{DeletedResponse, PrescriptionRequest, PrescriptionResponse};
use crate::web::state::AppState;

#[utoipa::path(
    get,
    path = "/admin/patients/{id}/prescriptions",
    params(("id" = Uuid, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Prescriptions by refill date, earliest first", body = [PrescriptionResponse]),
        (status = 404, description = "Unknown patient")
    )
)]
pub async fn list_prescriptions_handler(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<PrescriptionResponse>>, HandlerError> {
    // Unknown patients are a 404, not an empty list.
    state
        .patients
        .get_patient(patient_id)
        .await
        .map_err(|e| port_failure("list prescriptions", e))?;
    let prescriptions = state
        .prescriptions
        .list_prescriptions(patient_id)
        .await
        .map_err(|e| port_failure("list prescriptions", e))?;
    Ok(Json(prescriptions.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/admin/patients/{id}/prescriptions",
    params(("id" = Uuid, Path, description = "Patient id")),
    request_body = PrescriptionRequest,
    responses(
        (status = 201, description = "Prescription created", body = PrescriptionResponse),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Unknown patient")
    )
)]
pub async fn create_prescription_handler(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<PrescriptionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let details = req
        .into_details()
        .map_err(|e| port_failure("create prescription", e))?;
    let prescription = state
        .prescriptions
        .create_prescription(patient_id, details)
        .await
        .map_err(|e| port_failure("create prescription", e))?;
    info!("Created prescription {} for patient {}", prescription.id, patient_id);
    Ok((StatusCode::CREATED, Json(PrescriptionResponse::from(prescription))))
}

#[utoipa::path(
    put,
    path = "/admin/prescriptions/{id}",
    params(("id" = Uuid, Path, description = "Prescription id")),
    request_body = PrescriptionRequest,
    responses(
        (status = 200, description = "Prescription replaced", body = PrescriptionResponse),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Unknown prescription")
    )
)]
pub async fn update_prescription_handler(
    State(state): State<Arc<AppState>>,
    Path(prescription_id): Path<Uuid>,
    Json(req): Json<PrescriptionRequest>,
) -> Result<Json<PrescriptionResponse>, HandlerError> {
    let details = req
        .into_details()
        .map_err(|e| port_failure("update prescription", e))?;
    let prescription = state
        .prescriptions
        .update_prescription(prescription_id, details)
        .await
        .map_err(|e| port_failure("update prescription", e))?;
    Ok(Json(prescription.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/prescriptions/{id}",
    params(("id" = Uuid, Path, description = "Prescription id")),
    responses(
        (status = 200, description = "Prescription deleted", body = DeletedResponse),
        (status = 404, description = "Unknown prescription")
    )
)]
pub async fn delete_prescription_handler(
    State(state): State<Arc<AppState>>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, HandlerError> {
    state
        .prescriptions
        .delete_prescription(prescription_id)
        .await
        .map_err(|e| port_failure("delete prescription", e))?;
    info!("Deleted prescription {}", prescription_id);
    Ok(Json(DeletedResponse { success: true }))
}
