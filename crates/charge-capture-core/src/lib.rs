//! Charge Capture Core Library
//!
//! Local-first daily charge capture for clinicians: a catalog of care
//! locations and billable procedure codes, per-location patient lists with
//! pending ("today's") codes, and an end-of-day report archived to history.
//!
//! # Architecture
//!
//! ```text
//!   Catalog (locations, codes)        Patients by location
//!            │   rename/remove cascade        │
//!            └──────────────┬─────────────────┘
//!                           ▼
//!                 Session (single writer)
//!                           │  toggle pending codes
//!                           ▼
//!                 End-of-day report (build)
//!                           │
//!                   commit: pending → committed
//!                           │
//!             ┌─────────────┴─────────────┐
//!             ▼                           ▼
//!      History archive               KeyValueStore
//!     (newest first)              (SQLite / in-memory)
//!             │
//!      CSV / JSON backup
//! ```
//!
//! # Core Principle
//!
//! **Catalog and patient state never disagree.** Renaming or removing a code
//! rewrites every patient that references it in the same call; a failed
//! validation changes nothing and is reported as [`Outcome::Rejected`].
//!
//! # Modules
//!
//! - [`session`]: Session service with catalog, patient and report operations
//! - [`models`]: Domain types (Location, ProcedureCode, Patient, Report, User)
//! - [`history`]: Append-only report archive
//! - [`store`]: Key-value persistence gateway (SQLite, in-memory)
//! - [`export`]: History CSV and JSON backup
//! - [`config`]: Key prefix and seed data

pub mod config;
pub mod export;
pub mod history;
pub mod models;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::SessionConfig;
pub use history::{History, HistoryRow};
pub use models::{Location, Patient, ProcedureCode, Report, ReportPatient, User, UserRole};
pub use session::{Outcome, Rejection, Session, SessionError, SessionResult};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ChargeCaptureError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StoreError> for ChargeCaptureError {
    fn from(e: StoreError) -> Self {
        ChargeCaptureError::DatabaseError(e.to_string())
    }
}

impl From<SessionError> for ChargeCaptureError {
    fn from(e: SessionError) -> Self {
        ChargeCaptureError::DatabaseError(e.to_string())
    }
}

impl From<Rejection> for ChargeCaptureError {
    fn from(e: Rejection) -> Self {
        ChargeCaptureError::Rejected(e.to_string())
    }
}

impl From<serde_json::Error> for ChargeCaptureError {
    fn from(e: serde_json::Error) -> Self {
        ChargeCaptureError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ChargeCaptureError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ChargeCaptureError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn applied<T>(outcome: Outcome<T>) -> Result<T, ChargeCaptureError> {
    Ok(outcome.into_result()?)
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a session store at the given path.
#[uniffi::export]
pub fn open_session(path: String) -> Result<Arc<ChargeCaptureCore>, ChargeCaptureError> {
    let store = SqliteStore::open(&path)?;
    let session = Session::load(store, today())?;
    Ok(Arc::new(ChargeCaptureCore {
        session: Arc::new(Mutex::new(session)),
    }))
}

/// Create an in-memory session (for testing).
#[uniffi::export]
pub fn open_session_in_memory() -> Result<Arc<ChargeCaptureCore>, ChargeCaptureError> {
    let store = SqliteStore::open_in_memory()?;
    let session = Session::load(store, today())?;
    Ok(Arc::new(ChargeCaptureCore {
        session: Arc::new(Mutex::new(session)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe session wrapper for FFI. The mutex serializes every call.
#[derive(uniffi::Object)]
pub struct ChargeCaptureCore {
    session: Arc<Mutex<Session<SqliteStore>>>,
}

#[uniffi::export]
impl ChargeCaptureCore {
    // =========================================================================
    // Location Operations
    // =========================================================================

    /// List locations in catalog order.
    pub fn list_locations(&self) -> Result<Vec<FfiLocation>, ChargeCaptureError> {
        let session = self.session.lock()?;
        Ok(session.locations().iter().cloned().map(Into::into).collect())
    }

    /// Add a location.
    pub fn add_location(&self, id: String, name: String) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.add_location(&id, &name)?)
    }

    /// Rename a location (id and/or name).
    pub fn rename_location(
        &self,
        old_id: String,
        new_id: String,
        new_name: String,
    ) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.rename_location(&old_id, &new_id, &new_name)?)
    }

    /// Remove a location and its patients.
    pub fn remove_location(&self, id: String) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.remove_location(&id)?)
    }

    /// Change the working location.
    pub fn select_location(&self, id: String) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.select_location(&id)?)
    }

    /// Get the working location id.
    pub fn selected_location(&self) -> Result<String, ChargeCaptureError> {
        let session = self.session.lock()?;
        Ok(session.selected_location().to_string())
    }

    // =========================================================================
    // Procedure Code Operations
    // =========================================================================

    /// List procedure codes in catalog order.
    pub fn list_codes(&self) -> Result<Vec<FfiProcedureCode>, ChargeCaptureError> {
        let session = self.session.lock()?;
        Ok(session.codes().iter().cloned().map(Into::into).collect())
    }

    /// Add a procedure code.
    pub fn add_code(&self, code: String, description: String) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.add_code(&code, &description)?)
    }

    /// Update a procedure code, rewriting it on every patient.
    pub fn rename_code(
        &self,
        old_code: String,
        new_code: String,
        description: String,
    ) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.rename_code(&old_code, &new_code, &description)?)
    }

    /// Remove a procedure code from the catalog and every patient.
    pub fn remove_code(&self, code: String) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.remove_code(&code)?)
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    /// Set the user stamped on reports.
    pub fn set_user(&self, name: String, role: String) -> Result<(), ChargeCaptureError> {
        let role = UserRole::parse(&role)
            .ok_or_else(|| ChargeCaptureError::InvalidInput(format!("Unknown role: {}", role)))?;
        let mut session = self.session.lock()?;
        applied(session.set_user(&name, role)?)
    }

    /// Get the current user.
    pub fn current_user(&self) -> Result<FfiUser, ChargeCaptureError> {
        let session = self.session.lock()?;
        Ok(session.user().clone().into())
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// List a location's patients.
    pub fn list_patients(&self, location_id: String) -> Result<Vec<FfiPatient>, ChargeCaptureError> {
        let session = self.session.lock()?;
        let patients = session
            .patients(&location_id)
            .ok_or_else(|| Rejection::UnknownLocation(location_id.clone()))?;
        Ok(patients.iter().cloned().map(Into::into).collect())
    }

    /// Add a patient; returns the new id.
    pub fn add_patient(
        &self,
        location_id: String,
        name: String,
        mrn: String,
    ) -> Result<u64, ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.add_patient(&location_id, &name, &mrn)?)
    }

    /// Remove a patient.
    pub fn remove_patient(&self, location_id: String, patient_id: u64) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.remove_patient(&location_id, patient_id)?)
    }

    /// Toggle a pending code; returns whether it is now selected.
    pub fn toggle_todays_code(
        &self,
        location_id: String,
        patient_id: u64,
        code: String,
    ) -> Result<bool, ChargeCaptureError> {
        let mut session = self.session.lock()?;
        applied(session.toggle_todays_code(&location_id, patient_id, &code)?)
    }

    /// Roll the session over if the date changed while the host was running.
    /// Returns how many patients lost uncommitted codes.
    pub fn rollover_if_new_day(&self) -> Result<u32, ChargeCaptureError> {
        let mut session = self.session.lock()?;
        let rollover = session.rollover_if_new_day(today())?;
        Ok(rollover
            .map(|r| u32::try_from(r.discarded.len()).unwrap_or(u32::MAX))
            .unwrap_or(0))
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    /// Preview today's report for the selected location without sending it.
    pub fn preview_report(&self) -> Result<FfiReport, ChargeCaptureError> {
        let session = self.session.lock()?;
        let report = session.build_report(
            session.selected_location(),
            session.current_date(),
            &session.user().name,
        )?;
        Ok(report.into())
    }

    /// Send today's report for the selected location and complete the day.
    pub fn close_out_day(&self) -> Result<FfiReport, ChargeCaptureError> {
        let mut session = self.session.lock()?;
        let report = applied(session.close_out_day()?)?;
        Ok(report.into())
    }

    /// Get archived reports, newest first.
    pub fn list_history(&self) -> Result<Vec<FfiReport>, ChargeCaptureError> {
        let session = self.session.lock()?;
        Ok(session.history().iter().cloned().map(Into::into).collect())
    }

    /// Delete all archived reports.
    pub fn clear_history(&self) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        Ok(session.clear_history()?)
    }

    /// Delete all stored data and restore defaults.
    pub fn reset_all(&self) -> Result<(), ChargeCaptureError> {
        let mut session = self.session.lock()?;
        Ok(session.reset_all()?)
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export history as CSV.
    pub fn export_history_csv(&self) -> Result<String, ChargeCaptureError> {
        let session = self.session.lock()?;
        Ok(export::history_to_csv(session.history()))
    }

    /// Export everything as a JSON backup.
    pub fn export_backup_json(&self) -> Result<String, ChargeCaptureError> {
        let session = self.session.lock()?;
        Ok(export::Backup::capture(&*session).to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe location.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLocation {
    pub id: String,
    pub name: String,
}

impl From<Location> for FfiLocation {
    fn from(location: Location) -> Self {
        Self {
            id: location.id,
            name: location.name,
        }
    }
}

/// FFI-safe procedure code.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProcedureCode {
    pub code: String,
    pub description: String,
}

impl From<ProcedureCode> for FfiProcedureCode {
    fn from(code: ProcedureCode) -> Self {
        Self {
            code: code.code,
            description: code.description,
        }
    }
}

/// FFI-safe user.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUser {
    pub name: String,
    pub role: String,
}

impl From<User> for FfiUser {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            role: user.role.as_str().to_string(),
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: u64,
    pub name: String,
    pub mrn: String,
    pub codes: Vec<String>,
    pub todays_codes: Vec<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            mrn: patient.mrn,
            codes: patient.codes,
            todays_codes: patient.todays_codes,
        }
    }
}

/// FFI-safe report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReport {
    pub date: String,
    pub location_id: String,
    pub location_name: String,
    pub user: String,
    pub patients: Vec<FfiReportPatient>,
    pub total_codes: u32,
    pub sent: bool,
}

impl From<Report> for FfiReport {
    fn from(report: Report) -> Self {
        Self {
            date: report.date.to_string(),
            location_id: report.location_id,
            location_name: report.location_name,
            user: report.user,
            patients: report.patients.into_iter().map(Into::into).collect(),
            total_codes: report.total_codes as u32,
            sent: report.sent,
        }
    }
}

/// FFI-safe report line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReportPatient {
    pub name: String,
    pub mrn: String,
    pub codes: Vec<String>,
}

impl From<ReportPatient> for FfiReportPatient {
    fn from(patient: ReportPatient) -> Self {
        Self {
            name: patient.name,
            mrn: patient.mrn,
            codes: patient.codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_day_flow() {
        let core = open_session_in_memory().unwrap();

        let id = core
            .add_patient("main".into(), "Jo".into(), "M1".into())
            .unwrap();
        assert!(core.toggle_todays_code("main".into(), id, "99213".into()).unwrap());

        let preview = core.preview_report().unwrap();
        assert_eq!(preview.total_codes, 1);
        assert!(!preview.sent);

        let sent = core.close_out_day().unwrap();
        assert!(sent.sent);
        assert_eq!(core.list_history().unwrap().len(), 1);

        let patients = core.list_patients("main".into()).unwrap();
        assert_eq!(patients[0].codes, vec!["99213"]);
        assert!(patients[0].todays_codes.is_empty());
    }

    #[test]
    fn test_ffi_rejection_is_error() {
        let core = open_session_in_memory().unwrap();
        core.remove_location("satellite".into()).unwrap();

        let err = core.remove_location("main".into()).unwrap_err();
        assert!(matches!(err, ChargeCaptureError::Rejected(_)));

        let err = core.set_user("Dr. X".into(), "admin".into()).unwrap_err();
        assert!(matches!(err, ChargeCaptureError::InvalidInput(_)));
    }

    #[test]
    fn test_ffi_rollover_counts_patients() {
        let core = open_session_in_memory().unwrap();
        assert_eq!(core.rollover_if_new_day().unwrap(), 0);

        let yesterday = today().pred_opt().unwrap();
        core.session.lock().unwrap().rollover_if_new_day(yesterday).unwrap();
        let id = core
            .add_patient("main".into(), "Jo".into(), "M1".into())
            .unwrap();
        core.toggle_todays_code("main".into(), id, "99213".into()).unwrap();

        assert_eq!(core.rollover_if_new_day().unwrap(), 1);
        assert!(core.list_patients("main".into()).unwrap()[0].todays_codes.is_empty());
    }

    #[test]
    fn test_ffi_exports() {
        let core = open_session_in_memory().unwrap();

        let csv = core.export_history_csv().unwrap();
        assert_eq!(csv, "Date,Hospital,Patient Name,MRN,Codes");

        let json = core.export_backup_json().unwrap();
        assert!(json.contains("standardCodes"));
    }
}
