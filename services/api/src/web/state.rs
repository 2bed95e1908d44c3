//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use emr_core::ports::{AppointmentStore, PatientDirectory, PrescriptionStore, SessionStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub patients: Arc<dyn PatientDirectory>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub prescriptions: Arc<dyn PrescriptionStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires every port to one adapter that implements them all.
    pub fn with_store<S>(store: Arc<S>, config: Arc<Config>) -> Self
    where
        S: PatientDirectory + AppointmentStore + PrescriptionStore + SessionStore + 'static,
    {
        Self {
            patients: store.clone(),
            appointments: store.clone(),
            prescriptions: store.clone(),
            sessions: store,
            config,
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.config.session_ttl_days)
    }
}
