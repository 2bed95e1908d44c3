//! services/api/src/adapters/memory.rs
//!
//! An in-memory implementation of every storage port, used to drive the web
//! layer in tests without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emr_core::domain::{
    Appointment, AppointmentDetails, AuthSession, NewPatient, Patient, PatientChanges,
    PatientCredentials, PatientRecord, PatientSummary, Prescription, PrescriptionDetails,
};
use emr_core::ports::{
    AppointmentStore, PatientDirectory, PortError, PortResult, PrescriptionStore, SessionStore,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    patients: HashMap<Uuid, (Patient, String)>,
    appointments: HashMap<Uuid, Appointment>,
    prescriptions: HashMap<Uuid, Prescription>,
    sessions: HashMap<String, AuthSession>,
}

impl Tables {
    fn appointments_of(&self, patient_id: Uuid) -> Vec<Appointment> {
        let mut found: Vec<_> = self
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date_time.cmp(&b.date_time).then(a.id.cmp(&b.id)));
        found
    }

    fn prescriptions_of(&self, patient_id: Uuid) -> Vec<Prescription> {
        let mut found: Vec<_> = self
            .prescriptions
            .values()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.refill_date.cmp(&b.refill_date).then(a.id.cmp(&b.id)));
        found
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.patients
            .values()
            .any(|(p, _)| p.email.eq_ignore_ascii_case(email) && Some(p.id) != except)
    }

    fn require_patient(&self, patient_id: Uuid) -> PortResult<()> {
        if self.patients.contains_key(&patient_id) {
            Ok(())
        } else {
            Err(PortError::NotFound(format!("Patient {} not found", patient_id)))
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session directly, bypassing login.
    pub async fn insert_session(&self, session: AuthSession) {
        self.tables
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session);
    }

    pub async fn session_expiry(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.tables
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.expires_at)
    }
}

#[async_trait]
impl PatientDirectory for MemoryStore {
    async fn list_patients(&self) -> PortResult<Vec<PatientSummary>> {
        let tables = self.tables.read().await;
        let mut summaries: Vec<_> = tables
            .patients
            .values()
            .map(|(patient, _)| PatientSummary {
                patient: patient.clone(),
                appointment_count: tables.appointments_of(patient.id).len() as i64,
                prescription_count: tables.prescriptions_of(patient.id).len() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| {
            (&a.patient.last_name, &a.patient.first_name)
                .cmp(&(&b.patient.last_name, &b.patient.first_name))
        });
        Ok(summaries)
    }

    async fn get_patient(&self, patient_id: Uuid) -> PortResult<Patient> {
        self.tables
            .read()
            .await
            .patients
            .get(&patient_id)
            .map(|(p, _)| p.clone())
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))
    }

    async fn get_patient_record(&self, patient_id: Uuid) -> PortResult<PatientRecord> {
        let tables = self.tables.read().await;
        let (patient, _) = tables
            .patients
            .get(&patient_id)
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))?;
        Ok(PatientRecord {
            patient: patient.clone(),
            appointments: tables.appointments_of(patient_id),
            prescriptions: tables.prescriptions_of(patient_id),
        })
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<PatientCredentials> {
        self.tables
            .read()
            .await
            .patients
            .values()
            .find(|(p, _)| p.email.eq_ignore_ascii_case(email))
            .map(|(p, hash)| PatientCredentials {
                patient_id: p.id,
                email: p.email.clone(),
                hashed_password: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound("No patient with that email".to_string()))
    }

    async fn create_patient(&self, new: NewPatient) -> PortResult<Patient> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&new.email, None) {
            return Err(PortError::Conflict(format!(
                "Email {} is already registered",
                new.email
            )));
        }
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            date_of_birth: new.date_of_birth,
            phone: new.phone,
            address: new.address,
            created_at: Utc::now(),
        };
        tables
            .patients
            .insert(patient.id, (patient.clone(), new.hashed_password));
        Ok(patient)
    }

    async fn update_patient(
        &self,
        patient_id: Uuid,
        changes: PatientChanges,
    ) -> PortResult<Patient> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email {
            if tables.email_taken(email, Some(patient_id)) {
                return Err(PortError::Conflict(format!(
                    "Email {} is already registered",
                    email
                )));
            }
        }
        let (patient, hash) = tables
            .patients
            .get_mut(&patient_id)
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))?;

        if let Some(v) = changes.first_name {
            patient.first_name = v;
        }
        if let Some(v) = changes.last_name {
            patient.last_name = v;
        }
        if let Some(v) = changes.email {
            patient.email = v;
        }
        if let Some(v) = changes.hashed_password {
            *hash = v;
        }
        if let Some(v) = changes.date_of_birth {
            patient.date_of_birth = v;
        }
        if let Some(v) = changes.phone {
            patient.phone = v;
        }
        if let Some(v) = changes.address {
            patient.address = v;
        }
        Ok(patient.clone())
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn list_appointments(&self, patient_id: Uuid) -> PortResult<Vec<Appointment>> {
        Ok(self.tables.read().await.appointments_of(patient_id))
    }

    async fn create_appointment(
        &self,
        patient_id: Uuid,
        details: AppointmentDetails,
    ) -> PortResult<Appointment> {
        let mut tables = self.tables.write().await;
        tables.require_patient(patient_id)?;
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            provider_name: details.provider_name,
            date_time: details.date_time,
            repeat_schedule: details.repeat_schedule,
            end_date: details.end_date,
        };
        tables
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        details: AppointmentDetails,
    ) -> PortResult<Appointment> {
        let mut tables = self.tables.write().await;
        let appointment = tables.appointments.get_mut(&appointment_id).ok_or_else(|| {
            PortError::NotFound(format!("Appointment {} not found", appointment_id))
        })?;
        appointment.provider_name = details.provider_name;
        appointment.date_time = details.date_time;
        appointment.repeat_schedule = details.repeat_schedule;
        appointment.end_date = details.end_date;
        Ok(appointment.clone())
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> PortResult<()> {
        self.tables
            .write()
            .await
            .appointments
            .remove(&appointment_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Appointment {} not found", appointment_id)))
    }
}

#[async_trait]
impl PrescriptionStore for MemoryStore {
    async fn list_prescriptions(&self, patient_id: Uuid) -> PortResult<Vec<Prescription>> {
        Ok(self.tables.read().await.prescriptions_of(patient_id))
    }

    async fn create_prescription(
        &self,
        patient_id: Uuid,
        details: PrescriptionDetails,
    ) -> PortResult<Prescription> {
        let mut tables = self.tables.write().await;
        tables.require_patient(patient_id)?;
        let prescription = Prescription {
            id: Uuid::new_v4(),
            patient_id,
            medication_name: details.medication_name,
            dosage: details.dosage,
            quantity: details.quantity,
            refill_date: details.refill_date,
            refill_schedule: details.refill_schedule,
        };
        tables
            .prescriptions
            .insert(prescription.id, prescription.clone());
        Ok(prescription)
    }

    async fn update_prescription(
        &self,
        prescription_id: Uuid,
        details: PrescriptionDetails,
    ) -> PortResult<Prescription> {
        let mut tables = self.tables.write().await;
        let prescription = tables.prescriptions.get_mut(&prescription_id).ok_or_else(|| {
            PortError::NotFound(format!("Prescription {} not found", prescription_id))
        })?;
        prescription.medication_name = details.medication_name;
        prescription.dosage = details.dosage;
        prescription.quantity = details.quantity;
        prescription.refill_date = details.refill_date;
        prescription.refill_schedule = details.refill_schedule;
        Ok(prescription.clone())
    }

    async fn delete_prescription(&self, prescription_id: Uuid) -> PortResult<()> {
        self.tables
            .write()
            .await
            .prescriptions
            .remove(&prescription_id)
            .map(|_| ())
            .ok_or_else(|| {
                PortError::NotFound(format!("Prescription {} not found", prescription_id))
            })
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_auth_session(
        &self,
        session_id: &str,
        patient_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let now = Utc::now();
        self.tables
            .write()
            .await
            .sessions
            .retain(|_, s| s.expires_at > now);
        self.insert_session(AuthSession {
            id: session_id.to_string(),
            patient_id,
            expires_at,
        })
        .await;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.tables
            .read()
            .await
            .sessions
            .get(session_id)
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.patient_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn refresh_auth_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        if let Some(session) = self.tables.write().await.sessions.get_mut(session_id) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.write().await.sessions.remove(session_id);
        Ok(())
    }
}
