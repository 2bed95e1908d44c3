//! crates/emr_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::schedule::Recurrence;

//=========================================================================================
// Schedules
//=========================================================================================

/// Raised when a stored or submitted schedule name is not one we know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseScheduleError {
    kind: &'static str,
    value: String,
}

/// How often an appointment repeats after its first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatSchedule {
    Daily,
    Weekly,
    Monthly,
}

impl RepeatSchedule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn recurrence(self) -> Recurrence {
        match self {
            Self::Daily => Recurrence::Daily,
            Self::Weekly => Recurrence::Weekly,
            Self::Monthly => Recurrence::Monthly,
        }
    }
}

impl FromStr for RepeatSchedule {
    type Err = ParseScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(ParseScheduleError {
                kind: "repeat schedule",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RepeatSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a prescription is refilled. Every prescription has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefillSchedule {
    Weekly,
    Monthly,
    Quarterly,
}

impl RefillSchedule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    pub fn recurrence(self) -> Recurrence {
        match self {
            Self::Weekly => Recurrence::Weekly,
            Self::Monthly => Recurrence::Monthly,
            Self::Quarterly => Recurrence::Quarterly,
        }
    }
}

impl FromStr for RefillSchedule {
    type Err = ParseScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            _ => Err(ParseScheduleError {
                kind: "refill schedule",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RefillSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Patients
//=========================================================================================

/// A patient's identity and contact details. Never carries the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct PatientCredentials {
    pub patient_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// A row of the admin patient list.
#[derive(Debug, Clone)]
pub struct PatientSummary {
    pub patient: Patient,
    pub appointment_count: i64,
    pub prescription_count: i64,
}

/// A patient together with everything they own, each list sorted by date.
#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub patient: Patient,
    pub appointments: Vec<Appointment>,
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hashed_password: String,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    pub address: String,
}

/// A partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct PatientChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

//=========================================================================================
// Appointments and Prescriptions
//=========================================================================================

/// A scheduled visit. The stored `date_time` is the first occurrence only;
/// repeats are implied by `repeat_schedule` and bounded by `end_date`.
#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_name: String,
    pub date_time: DateTime<Utc>,
    pub repeat_schedule: Option<RepeatSchedule>,
    pub end_date: Option<DateTime<Utc>>,
}

/// The editable fields of an appointment, used for both create and update.
#[derive(Debug, Clone)]
pub struct AppointmentDetails {
    pub provider_name: String,
    pub date_time: DateTime<Utc>,
    pub repeat_schedule: Option<RepeatSchedule>,
    pub end_date: Option<DateTime<Utc>>,
}

/// A medication on a refill cycle. `refill_date` is the next refill.
#[derive(Debug, Clone, PartialEq)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    pub quantity: u32,
    pub refill_date: DateTime<Utc>,
    pub refill_schedule: RefillSchedule,
}

#[derive(Debug, Clone)]
pub struct PrescriptionDetails {
    pub medication_name: String,
    pub dosage: String,
    pub quantity: u32,
    pub refill_date: DateTime<Utc>,
    pub refill_schedule: RefillSchedule,
}

//=========================================================================================
// Authentication
//=========================================================================================

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub patient_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
