//! Full JSON backup of catalog, patients, history and user.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::history::History;
use crate::models::{Location, Patient, ProcedureCode, User};
use crate::session::Session;
use crate::store::KeyValueStore;

/// Snapshot of everything the session stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub hospitals: Vec<Location>,
    pub standard_codes: Vec<ProcedureCode>,
    pub historical_data: History,
    pub todays_patients: BTreeMap<String, Vec<Patient>>,
    pub current_user: User,
    /// Export timestamp (RFC 3339)
    pub export_date: String,
}

impl Backup {
    /// Capture the current session state.
    pub fn capture<S: KeyValueStore>(session: &Session<S>) -> Self {
        Self {
            hospitals: session.locations().to_vec(),
            standard_codes: session.codes().to_vec(),
            historical_data: session.history().clone(),
            todays_patients: session.patients_by_location().clone(),
            current_user: session.user().clone(),
            export_date: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// File name for a backup made on `date`.
    pub fn filename(date: chrono::NaiveDate) -> String {
        format!("charge-capture-backup-{date}.json")
    }
}
