//! services/api/src/web/protocol.rs
//!
//! Defines the JSON request and response bodies of the HTTP API.
//!
//! Requests arrive with dates and schedules as plain strings and are validated
//! here, at the boundary, before anything reaches a store or the schedule
//! evaluator. Every validation failure is a `PortError::Validation` with a
//! message that names the offending field.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use emr_core::domain::{
    Appointment, AppointmentDetails, NewPatient, Patient, PatientChanges, PatientRecord,
    PatientSummary, Prescription, PrescriptionDetails, RefillSchedule, RepeatSchedule,
};
use emr_core::ports::{PortError, PortResult};
use emr_core::schedule::{days_until, Occurrence, Window};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Failed to compile email regex")
});

//=========================================================================================
// Field Validation Helpers
//=========================================================================================

fn invalid(field: &str, reason: impl std::fmt::Display) -> PortError {
    PortError::Validation(format!("{}: {}", field, reason))
}

fn required_text(field: &str, value: &str) -> PortResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn email(value: &str) -> PortResult<String> {
    let trimmed = value.trim();
    if trimmed.len() > 254 || !EMAIL_REGEX.is_match(trimmed) {
        return Err(invalid("email", "is not a valid email address"));
    }
    Ok(trimmed.to_lowercase())
}

fn password(value: &str) -> PortResult<&str> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(value)
}

fn date(field: &str, value: &str) -> PortResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(field, format!("'{}' is not a YYYY-MM-DD date", value)))
}

/// What a bare `YYYY-MM-DD` means where an instant is expected.
#[derive(Clone, Copy)]
enum DateOnly {
    Reject,
    StartOfDay,
    EndOfDay,
}

/// Accepts RFC 3339, or the zone-less `YYYY-MM-DDTHH:MM[:SS]` that an HTML
/// datetime-local input produces (read as UTC).
fn instant(field: &str, value: &str, date_only: DateOnly) -> PortResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    let day = match date_only {
        DateOnly::Reject => None,
        DateOnly::StartOfDay => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        DateOnly::EndOfDay => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(23, 59, 59)),
    };
    day.map(|naive| naive.and_utc())
        .ok_or_else(|| invalid(field, format!("'{}' is not a valid date-time", value)))
}

/// Treats `None`, `""` and whitespace alike.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl CreatePatientRequest {
    /// Validates every field, then hashes the password.
    pub fn into_new_patient<H>(self, hash: H) -> PortResult<NewPatient>
    where
        H: FnOnce(&str) -> PortResult<String>,
    {
        let first_name = required_text("first_name", &self.first_name)?;
        let last_name = required_text("last_name", &self.last_name)?;
        let email = email(&self.email)?;
        let date_of_birth = date("date_of_birth", &self.date_of_birth)?;
        let hashed_password = hash(password(&self.password)?)?;
        Ok(NewPatient {
            first_name,
            last_name,
            email,
            hashed_password,
            date_of_birth,
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        })
    }
}

/// Absent fields are left unchanged. A blank password is treated as absent.
#[derive(Deserialize, ToSchema, Default)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl UpdatePatientRequest {
    pub fn into_changes<H>(self, hash: H) -> PortResult<PatientChanges>
    where
        H: FnOnce(&str) -> PortResult<String>,
    {
        let first_name = self
            .first_name
            .as_deref()
            .map(|v| required_text("first_name", v))
            .transpose()?;
        let last_name = self
            .last_name
            .as_deref()
            .map(|v| required_text("last_name", v))
            .transpose()?;
        let email = self.email.as_deref().map(email).transpose()?;
        let date_of_birth = self
            .date_of_birth
            .as_deref()
            .map(|v| date("date_of_birth", v))
            .transpose()?;
        // Blank means "keep the current password"; anything else is hashed as sent.
        let hashed_password = match self.password.as_deref() {
            Some(raw) if non_blank(Some(raw)).is_some() => Some(hash(password(raw)?)?),
            _ => None,
        };
        Ok(PatientChanges {
            first_name,
            last_name,
            email,
            hashed_password,
            date_of_birth,
            phone: self.phone.map(|v| v.trim().to_string()),
            address: self.address.map(|v| v.trim().to_string()),
        })
    }
}

/// Body of both appointment create and update; an update replaces every field.
#[derive(Deserialize, ToSchema)]
pub struct AppointmentRequest {
    pub provider_name: String,
    /// RFC 3339, or `YYYY-MM-DDTHH:MM` read as UTC.
    pub date_time: String,
    /// `daily`, `weekly`, `monthly`, or empty for a one-off visit.
    pub repeat_schedule: Option<String>,
    /// Last day of the series (inclusive). Only valid with a repeat schedule.
    pub end_date: Option<String>,
}

impl AppointmentRequest {
    pub fn into_details(self) -> PortResult<AppointmentDetails> {
        let provider_name = required_text("provider_name", &self.provider_name)?;
        let date_time = instant("date_time", &self.date_time, DateOnly::Reject)?;
        let repeat_schedule = non_blank(self.repeat_schedule.as_deref())
            .map(|s| s.parse::<RepeatSchedule>())
            .transpose()
            .map_err(|e| invalid("repeat_schedule", e))?;
        let end_date = non_blank(self.end_date.as_deref())
            .map(|s| instant("end_date", s, DateOnly::EndOfDay))
            .transpose()?;

        if let Some(end) = end_date {
            if repeat_schedule.is_none() {
                return Err(invalid("end_date", "requires a repeat_schedule"));
            }
            if end < date_time {
                return Err(invalid("end_date", "must not be before date_time"));
            }
        }

        Ok(AppointmentDetails {
            provider_name,
            date_time,
            repeat_schedule,
            end_date,
        })
    }
}

/// Body of both prescription create and update; an update replaces every field.
#[derive(Deserialize, ToSchema)]
pub struct PrescriptionRequest {
    pub medication_name: String,
    pub dosage: String,
    pub quantity: i64,
    /// RFC 3339 or `YYYY-MM-DD`.
    pub refill_date: String,
    /// `weekly`, `monthly` or `quarterly`.
    pub refill_schedule: String,
}

impl PrescriptionRequest {
    pub fn into_details(self) -> PortResult<PrescriptionDetails> {
        let medication_name = required_text("medication_name", &self.medication_name)?;
        let dosage = required_text("dosage", &self.dosage)?;
        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| (1..=i32::MAX as u32).contains(q))
            .ok_or_else(|| invalid("quantity", "must be a positive whole number"))?;
        let refill_date = instant("refill_date", &self.refill_date, DateOnly::StartOfDay)?;
        let refill_schedule = non_blank(Some(self.refill_schedule.as_str()))
            .ok_or_else(|| invalid("refill_schedule", "is required"))?
            .parse::<RefillSchedule>()
            .map_err(|e| invalid("refill_schedule", e))?;
        Ok(PrescriptionDetails {
            medication_name,
            dosage,
            quantity,
            refill_date,
            refill_schedule,
        })
    }
}

/// `?days=N` on the portal list views.
#[derive(Deserialize, IntoParams)]
pub struct WindowQuery {
    /// How many days ahead to look. Defaults to 90, at most 366.
    pub days: Option<u32>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, ToSchema, Debug)]
pub struct PatientResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    pub address: String,
}

impl From<Patient> for PatientResponse {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            date_of_birth: p.date_of_birth,
            phone: p.phone,
            address: p.address,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PatientSummaryResponse {
    #[serde(flatten)]
    pub patient: PatientResponse,
    pub appointment_count: i64,
    pub prescription_count: i64,
}

impl From<PatientSummary> for PatientSummaryResponse {
    fn from(s: PatientSummary) -> Self {
        Self {
            patient: s.patient.into(),
            appointment_count: s.appointment_count,
            prescription_count: s.prescription_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_name: String,
    pub date_time: DateTime<Utc>,
    pub repeat_schedule: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            patient_id: a.patient_id,
            provider_name: a.provider_name,
            date_time: a.date_time,
            repeat_schedule: a.repeat_schedule.map(|s| s.to_string()),
            end_date: a.end_date,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PrescriptionResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    pub quantity: u32,
    pub refill_date: DateTime<Utc>,
    pub refill_schedule: String,
}

impl From<Prescription> for PrescriptionResponse {
    fn from(p: Prescription) -> Self {
        Self {
            id: p.id,
            patient_id: p.patient_id,
            medication_name: p.medication_name,
            dosage: p.dosage,
            quantity: p.quantity,
            refill_date: p.refill_date,
            refill_schedule: p.refill_schedule.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PatientRecordResponse {
    pub patient: PatientResponse,
    pub appointments: Vec<AppointmentResponse>,
    pub prescriptions: Vec<PrescriptionResponse>,
}

impl From<PatientRecord> for PatientRecordResponse {
    fn from(r: PatientRecord) -> Self {
        Self {
            patient: r.patient.into(),
            appointments: r.appointments.into_iter().map(Into::into).collect(),
            prescriptions: r.prescriptions.into_iter().map(Into::into).collect(),
        }
    }
}

/// One concrete visit of a possibly repeating appointment.
#[derive(Serialize, ToSchema)]
pub struct AppointmentOccurrenceResponse {
    pub appointment_id: Uuid,
    pub provider_name: String,
    pub occurs_at: DateTime<Utc>,
    pub repeat_schedule: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    pub days_away: i64,
}

impl AppointmentOccurrenceResponse {
    pub fn new(occurrence: &Occurrence<'_, Appointment>, now: DateTime<Utc>) -> Self {
        let a = occurrence.record;
        Self {
            appointment_id: a.id,
            provider_name: a.provider_name.clone(),
            occurs_at: occurrence.at,
            repeat_schedule: a.repeat_schedule.map(|s| s.to_string()),
            end_date: a.end_date,
            days_away: days_until(now, occurrence.at),
        }
    }
}

/// One concrete refill of a prescription.
#[derive(Serialize, ToSchema)]
pub struct RefillOccurrenceResponse {
    pub prescription_id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    pub quantity: u32,
    pub refill_on: DateTime<Utc>,
    pub refill_schedule: String,
    pub days_away: i64,
}

impl RefillOccurrenceResponse {
    pub fn new(occurrence: &Occurrence<'_, Prescription>, now: DateTime<Utc>) -> Self {
        let p = occurrence.record;
        Self {
            prescription_id: p.id,
            medication_name: p.medication_name.clone(),
            dosage: p.dosage.clone(),
            quantity: p.quantity,
            refill_on: occurrence.at,
            refill_schedule: p.refill_schedule.to_string(),
            days_away: days_until(now, occurrence.at),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub appointments: Vec<AppointmentOccurrenceResponse>,
    pub refills: Vec<RefillOccurrenceResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct AppointmentScheduleResponse {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub occurrences: Vec<AppointmentOccurrenceResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct RefillScheduleResponse {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub occurrences: Vec<RefillOccurrenceResponse>,
}

impl DashboardResponse {
    pub fn new(
        window: &Window,
        appointments: Vec<AppointmentOccurrenceResponse>,
        refills: Vec<RefillOccurrenceResponse>,
    ) -> Self {
        Self {
            window_start: window.start(),
            window_end: window.end(),
            appointments,
            refills,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DeletedResponse {
    pub success: bool,
}
