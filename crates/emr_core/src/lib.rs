pub mod domain;
pub mod ports;
pub mod schedule;

pub use domain::{
    Appointment, AppointmentDetails, AuthSession, NewPatient, ParseScheduleError, Patient,
    PatientChanges, PatientCredentials, PatientRecord, PatientSummary, Prescription,
    PrescriptionDetails, RefillSchedule, RepeatSchedule,
};
pub use ports::{
    AppointmentStore, PatientDirectory, PortError, PortResult, PrescriptionStore, SessionStore,
};
pub use schedule::{
    days_until, occurrences_in_window, Occurrence, Occurrences, Recurrence, ScheduleError,
    Scheduled, Window,
};
