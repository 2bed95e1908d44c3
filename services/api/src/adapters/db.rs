//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the storage ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use emr_core::domain::{
    Appointment, AppointmentDetails, NewPatient, Patient, PatientChanges, PatientCredentials,
    PatientRecord, PatientSummary, Prescription, PrescriptionDetails, RefillSchedule,
    RepeatSchedule,
};
use emr_core::ports::{
    AppointmentStore, PatientDirectory, PortError, PortResult, PrescriptionStore, SessionStore,
};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Sorts driver errors into transient and unexpected failures.
fn storage_error(err: sqlx::Error) -> PortError {
    match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => PortError::Unavailable(err.to_string()),
        _ => PortError::Unexpected(err.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PATIENT_COLUMNS: &str =
    "id, first_name, last_name, email, date_of_birth, phone, address, created_at";
const APPOINTMENT_COLUMNS: &str = "id, patient_id, provider_name, date_time, repeat_schedule, end_date";
const PRESCRIPTION_COLUMNS: &str =
    "id, patient_id, medication_name, dosage, quantity, refill_date, refill_schedule";

#[derive(FromRow)]
struct PatientRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    date_of_birth: NaiveDate,
    phone: String,
    address: String,
    created_at: DateTime<Utc>,
}
impl PatientRow {
    fn to_domain(self) -> Patient {
        Patient {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            date_of_birth: self.date_of_birth,
            phone: self.phone,
            address: self.address,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PatientSummaryRow {
    #[sqlx(flatten)]
    patient: PatientRow,
    appointment_count: i64,
    prescription_count: i64,
}

#[derive(FromRow)]
struct CredentialsRow {
    id: Uuid,
    email: String,
    password_hash: String,
}

#[derive(FromRow)]
struct AppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    provider_name: String,
    date_time: DateTime<Utc>,
    repeat_schedule: Option<String>,
    end_date: Option<DateTime<Utc>>,
}
impl AppointmentRow {
    /// Stored schedule text that no longer parses is a data-integrity error.
    fn to_domain(self) -> PortResult<Appointment> {
        let repeat_schedule = self
            .repeat_schedule
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<RepeatSchedule>)
            .transpose()
            .map_err(|e| PortError::Validation(format!("Appointment {}: {}", self.id, e)))?;
        Ok(Appointment {
            id: self.id,
            patient_id: self.patient_id,
            provider_name: self.provider_name,
            date_time: self.date_time,
            repeat_schedule,
            end_date: self.end_date,
        })
    }
}

#[derive(FromRow)]
struct PrescriptionRow {
    id: Uuid,
    patient_id: Uuid,
    medication_name: String,
    dosage: String,
    quantity: i32,
    refill_date: DateTime<Utc>,
    refill_schedule: String,
}
impl PrescriptionRow {
    fn to_domain(self) -> PortResult<Prescription> {
        let refill_schedule = self
            .refill_schedule
            .parse::<RefillSchedule>()
            .map_err(|e| PortError::Validation(format!("Prescription {}: {}", self.id, e)))?;
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            PortError::Validation(format!(
                "Prescription {}: stored quantity {} is negative",
                self.id, self.quantity
            ))
        })?;
        Ok(Prescription {
            id: self.id,
            patient_id: self.patient_id,
            medication_name: self.medication_name,
            dosage: self.dosage,
            quantity,
            refill_date: self.refill_date,
            refill_schedule,
        })
    }
}

fn quantity_column(quantity: u32) -> PortResult<i32> {
    i32::try_from(quantity)
        .map_err(|_| PortError::Validation(format!("Quantity {} is too large", quantity)))
}

//=========================================================================================
// `PatientDirectory` Implementation
//=========================================================================================

#[async_trait]
impl PatientDirectory for DbAdapter {
    async fn list_patients(&self) -> PortResult<Vec<PatientSummary>> {
        let sql = format!(
            "SELECT {PATIENT_COLUMNS}, \
                (SELECT COUNT(*) FROM appointments a WHERE a.patient_id = p.id) AS appointment_count, \
                (SELECT COUNT(*) FROM prescriptions r WHERE r.patient_id = p.id) AS prescription_count \
             FROM patients p ORDER BY last_name ASC, first_name ASC"
        );
        let records = sqlx::query_as::<_, PatientSummaryRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(records
            .into_iter()
            .map(|r| PatientSummary {
                patient: r.patient.to_domain(),
                appointment_count: r.appointment_count,
                prescription_count: r.prescription_count,
            })
            .collect())
    }

    async fn get_patient(&self, patient_id: Uuid) -> PortResult<Patient> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1");
        let record = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))?;
        Ok(record.to_domain())
    }

    async fn get_patient_record(&self, patient_id: Uuid) -> PortResult<PatientRecord> {
        let patient = self.get_patient(patient_id).await?;
        let appointments = self.list_appointments(patient_id).await?;
        let prescriptions = self.list_prescriptions(patient_id).await?;
        Ok(PatientRecord {
            patient,
            appointments,
            prescriptions,
        })
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<PatientCredentials> {
        let record = sqlx::query_as::<_, CredentialsRow>(
            "SELECT id, email, password_hash FROM patients WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| PortError::NotFound("No patient with that email".to_string()))?;

        Ok(PatientCredentials {
            patient_id: record.id,
            email: record.email,
            hashed_password: record.password_hash,
        })
    }

    async fn create_patient(&self, patient: NewPatient) -> PortResult<Patient> {
        let sql = format!(
            "INSERT INTO patients (first_name, last_name, email, password_hash, date_of_birth, phone, address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PATIENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(&patient.first_name)
            .bind(&patient.last_name)
            .bind(&patient.email)
            .bind(&patient.hashed_password)
            .bind(patient.date_of_birth)
            .bind(&patient.phone)
            .bind(&patient.address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict(format!("Email {} is already registered", patient.email))
                } else {
                    storage_error(e)
                }
            })?;
        Ok(record.to_domain())
    }

    async fn update_patient(
        &self,
        patient_id: Uuid,
        changes: PatientChanges,
    ) -> PortResult<Patient> {
        let sql = format!(
            "UPDATE patients SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                email = COALESCE($4, email), \
                password_hash = COALESCE($5, password_hash), \
                date_of_birth = COALESCE($6, date_of_birth), \
                phone = COALESCE($7, phone), \
                address = COALESCE($8, address) \
             WHERE id = $1 RETURNING {PATIENT_COLUMNS}"
        );
        let email = changes.email.clone();
        let record = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(patient_id)
            .bind(changes.first_name)
            .bind(changes.last_name)
            .bind(changes.email)
            .bind(changes.hashed_password)
            .bind(changes.date_of_birth)
            .bind(changes.phone)
            .bind(changes.address)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict(format!(
                        "Email {} is already registered",
                        email.unwrap_or_default()
                    ))
                } else {
                    storage_error(e)
                }
            })?
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `AppointmentStore` Implementation
//=========================================================================================

#[async_trait]
impl AppointmentStore for DbAdapter {
    async fn list_appointments(&self, patient_id: Uuid) -> PortResult<Vec<Appointment>> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE patient_id = $1 \
             ORDER BY date_time ASC, id ASC"
        );
        let records = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_appointment(
        &self,
        patient_id: Uuid,
        details: AppointmentDetails,
    ) -> PortResult<Appointment> {
        let sql = format!(
            "INSERT INTO appointments (patient_id, provider_name, date_time, repeat_schedule, end_date) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {APPOINTMENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(patient_id)
            .bind(&details.provider_name)
            .bind(details.date_time)
            .bind(details.repeat_schedule.map(|s| s.as_str()))
            .bind(details.end_date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PortError::NotFound(format!("Patient {} not found", patient_id))
                } else {
                    storage_error(e)
                }
            })?;
        record.to_domain()
    }

    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        details: AppointmentDetails,
    ) -> PortResult<Appointment> {
        let sql = format!(
            "UPDATE appointments SET provider_name = $2, date_time = $3, repeat_schedule = $4, end_date = $5 \
             WHERE id = $1 RETURNING {APPOINTMENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .bind(&details.provider_name)
            .bind(details.date_time)
            .bind(details.repeat_schedule.map(|s| s.as_str()))
            .bind(details.end_date)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| {
                PortError::NotFound(format!("Appointment {} not found", appointment_id))
            })?;
        record.to_domain()
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(appointment_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Appointment {} not found",
                appointment_id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `PrescriptionStore` Implementation
//=========================================================================================

#[async_trait]
impl PrescriptionStore for DbAdapter {
    async fn list_prescriptions(&self, patient_id: Uuid) -> PortResult<Vec<Prescription>> {
        let sql = format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE patient_id = $1 \
             ORDER BY refill_date ASC, id ASC"
        );
        let records = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_prescription(
        &self,
        patient_id: Uuid,
        details: PrescriptionDetails,
    ) -> PortResult<Prescription> {
        let sql = format!(
            "INSERT INTO prescriptions (patient_id, medication_name, dosage, quantity, refill_date, refill_schedule) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PRESCRIPTION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(patient_id)
            .bind(&details.medication_name)
            .bind(&details.dosage)
            .bind(quantity_column(details.quantity)?)
            .bind(details.refill_date)
            .bind(details.refill_schedule.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PortError::NotFound(format!("Patient {} not found", patient_id))
                } else {
                    storage_error(e)
                }
            })?;
        record.to_domain()
    }

    async fn update_prescription(
        &self,
        prescription_id: Uuid,
        details: PrescriptionDetails,
    ) -> PortResult<Prescription> {
        let sql = format!(
            "UPDATE prescriptions SET medication_name = $2, dosage = $3, quantity = $4, \
                refill_date = $5, refill_schedule = $6 \
             WHERE id = $1 RETURNING {PRESCRIPTION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(prescription_id)
            .bind(&details.medication_name)
            .bind(&details.dosage)
            .bind(quantity_column(details.quantity)?)
            .bind(details.refill_date)
            .bind(details.refill_schedule.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| {
                PortError::NotFound(format!("Prescription {} not found", prescription_id))
            })?;
        record.to_domain()
    }

    async fn delete_prescription(&self, prescription_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM prescriptions WHERE id = $1")
            .bind(prescription_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Prescription {} not found",
                prescription_id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `SessionStore` Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for DbAdapter {
    async fn create_auth_session(
        &self,
        session_id: &str,
        patient_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let pruned = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(storage_error)?
            .rows_affected();
        if pruned > 0 {
            debug!("Pruned {} expired auth sessions", pruned);
        }

        sqlx::query("INSERT INTO auth_sessions (id, patient_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(patient_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let patient_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT patient_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        patient_id.ok_or(PortError::Unauthorized)
    }

    async fn refresh_auth_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE auth_sessions SET expires_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
