//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. The handlers it lists
//! live in the sibling modules.

use crate::web::{
    appointments, auth, patients, portal, prescriptions,
    protocol::{
        AppointmentOccurrenceResponse, AppointmentRequest, AppointmentResponse,
        AppointmentScheduleResponse, CreatePatientRequest, DashboardResponse, DeletedResponse,
        PatientRecordResponse, PatientResponse, PatientSummaryResponse, PrescriptionRequest,
        PrescriptionResponse, RefillOccurrenceResponse, RefillScheduleResponse,
        UpdatePatientRequest,
    },
};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        portal::dashboard_handler,
        portal::portal_appointments_handler,
        portal::portal_prescriptions_handler,
        patients::list_patients_handler,
        patients::create_patient_handler,
        patients::get_patient_handler,
        patients::update_patient_handler,
        appointments::list_appointments_handler,
        appointments::create_appointment_handler,
        appointments::update_appointment_handler,
        appointments::delete_appointment_handler,
        prescriptions::list_prescriptions_handler,
        prescriptions::create_prescription_handler,
        prescriptions::update_prescription_handler,
        prescriptions::delete_prescription_handler,
    ),
    components(
        schemas(
            auth::LoginRequest,
            auth::LoginResponse,
            CreatePatientRequest,
            UpdatePatientRequest,
            AppointmentRequest,
            PrescriptionRequest,
            PatientResponse,
            PatientSummaryResponse,
            PatientRecordResponse,
            AppointmentResponse,
            PrescriptionResponse,
            AppointmentOccurrenceResponse,
            RefillOccurrenceResponse,
            DashboardResponse,
            AppointmentScheduleResponse,
            RefillScheduleResponse,
            DeletedResponse,
        )
    ),
    tags(
        (name = "EMR API", description = "Admin console and patient portal endpoints.")
    )
)]
pub struct ApiDoc;
