//! services/api/src/bin/seed.rs
//!
//! Loads two demo patients with a few appointments and prescriptions dated
//! relative to now. Patients whose email is already registered are skipped.

use chrono::{Duration, NaiveDate, Utc};
use emr_api::{adapters::DbAdapter, config::Config, error::ApiError, web::auth::hash_password};
use emr_core::domain::{
    AppointmentDetails, NewPatient, PrescriptionDetails, RefillSchedule, RepeatSchedule,
};
use emr_core::ports::{AppointmentStore, PatientDirectory, PortError, PrescriptionStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_PASSWORD: &str = "password123";

struct DemoPatient {
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    date_of_birth: (i32, u32, u32),
    phone: &'static str,
    address: &'static str,
    /// (provider, days from now, repeat)
    appointments: &'static [(&'static str, i64, Option<RepeatSchedule>)],
    /// (medication, dosage, quantity, days from now)
    prescriptions: &'static [(&'static str, &'static str, u32, i64)],
}

const DEMO_PATIENTS: [DemoPatient; 2] = [
    DemoPatient {
        first_name: "John",
        last_name: "Doe",
        email: "john.doe@example.com",
        date_of_birth: (1985, 5, 15),
        phone: "555-0101",
        address: "123 Main St, Anytown, USA",
        appointments: &[
            ("Dr. Sarah Johnson", 2, Some(RepeatSchedule::Monthly)),
            ("Dr. Michael Chen", 15, None),
        ],
        prescriptions: &[("Lisinopril", "10mg", 30, 3), ("Metformin", "500mg", 60, 20)],
    },
    DemoPatient {
        first_name: "Jane",
        last_name: "Smith",
        email: "jane.smith@example.com",
        date_of_birth: (1990, 8, 22),
        phone: "555-0102",
        address: "456 Oak Ave, Somewhere, USA",
        appointments: &[("Dr. Emily Brown", 5, Some(RepeatSchedule::Weekly))],
        prescriptions: &[("Atorvastatin", "20mg", 30, 4)],
    },
];

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    let db = DbAdapter::new(db_pool);
    db.run_migrations().await?;

    let hashed_password = hash_password(DEMO_PASSWORD)?;
    let now = Utc::now();

    for demo in &DEMO_PATIENTS {
        let (year, month, day) = demo.date_of_birth;
        let date_of_birth = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| ApiError::Internal(format!("bad birth date for {}", demo.email)))?;

        let patient = match db
            .create_patient(NewPatient {
                first_name: demo.first_name.to_string(),
                last_name: demo.last_name.to_string(),
                email: demo.email.to_string(),
                hashed_password: hashed_password.clone(),
                date_of_birth,
                phone: demo.phone.to_string(),
                address: demo.address.to_string(),
            })
            .await
        {
            Ok(patient) => patient,
            Err(PortError::Conflict(_)) => {
                warn!("{} already exists, skipping", demo.email);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        for (provider, days, repeat) in demo.appointments {
            db.create_appointment(
                patient.id,
                AppointmentDetails {
                    provider_name: provider.to_string(),
                    date_time: now + Duration::days(*days),
                    repeat_schedule: *repeat,
                    end_date: None,
                },
            )
            .await?;
        }

        for (medication, dosage, quantity, days) in demo.prescriptions {
            db.create_prescription(
                patient.id,
                PrescriptionDetails {
                    medication_name: medication.to_string(),
                    dosage: dosage.to_string(),
                    quantity: *quantity,
                    refill_date: now + Duration::days(*days),
                    refill_schedule: RefillSchedule::Monthly,
                },
            )
            .await?;
        }

        info!(
            "Seeded {} {} with {} appointments and {} prescriptions",
            patient.first_name,
            patient.last_name,
            demo.appointments.len(),
            demo.prescriptions.len()
        );
    }

    info!("Database seeded. Demo password: {}", DEMO_PASSWORD);
    Ok(())
}
