//! crates/emr_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Appointment, AppointmentDetails, NewPatient, Patient, PatientChanges, PatientCredentials,
    PatientRecord, PatientSummary, Prescription, PrescriptionDetails,
};
use crate::schedule::ScheduleError;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The backing service is temporarily unreachable; the caller may retry.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<ScheduleError> for PortError {
    fn from(err: ScheduleError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// All patients ordered by last name, with how many records each owns.
    async fn list_patients(&self) -> PortResult<Vec<PatientSummary>>;

    async fn get_patient(&self, patient_id: Uuid) -> PortResult<Patient>;

    /// The patient plus appointments (date ascending) and prescriptions
    /// (refill date ascending).
    async fn get_patient_record(&self, patient_id: Uuid) -> PortResult<PatientRecord>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<PatientCredentials>;

    /// Fails with `Conflict` when the email is already registered.
    async fn create_patient(&self, patient: NewPatient) -> PortResult<Patient>;

    async fn update_patient(&self, patient_id: Uuid, changes: PatientChanges)
        -> PortResult<Patient>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Ordered by `date_time` ascending.
    async fn list_appointments(&self, patient_id: Uuid) -> PortResult<Vec<Appointment>>;

    /// Fails with `NotFound` when the patient does not exist.
    async fn create_appointment(
        &self,
        patient_id: Uuid,
        details: AppointmentDetails,
    ) -> PortResult<Appointment>;

    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        details: AppointmentDetails,
    ) -> PortResult<Appointment>;

    async fn delete_appointment(&self, appointment_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait PrescriptionStore: Send + Sync {
    /// Ordered by `refill_date` ascending.
    async fn list_prescriptions(&self, patient_id: Uuid) -> PortResult<Vec<Prescription>>;

    async fn create_prescription(
        &self,
        patient_id: Uuid,
        details: PrescriptionDetails,
    ) -> PortResult<Prescription>;

    async fn update_prescription(
        &self,
        prescription_id: Uuid,
        details: PrescriptionDetails,
    ) -> PortResult<Prescription>;

    async fn delete_prescription(&self, prescription_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session and discards any that have already expired.
    async fn create_auth_session(
        &self,
        session_id: &str,
        patient_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning patient, or `Unauthorized` for unknown or expired sessions.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn refresh_auth_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
