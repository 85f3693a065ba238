//! End-of-day report models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// End-of-day report snapshot for one location.
///
/// Serialized with the storage names used by the history key and the JSON
/// backup (`hospital`, `hospitalName`, `emailSent`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Session date the report covers
    pub date: NaiveDate,
    /// Source location id
    #[serde(rename = "hospital")]
    pub location_id: String,
    /// Source location name at build time
    #[serde(rename = "hospitalName", default)]
    pub location_name: String,
    /// Acting user's display name
    pub user: String,
    /// Patients with at least one code
    pub patients: Vec<ReportPatient>,
    /// Sum of per-patient code counts
    pub total_codes: usize,
    /// Whether the report has been committed and sent
    #[serde(rename = "emailSent", default)]
    pub sent: bool,
}

/// A single patient line in a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportPatient {
    pub name: String,
    pub mrn: String,
    pub codes: Vec<String>,
}

impl Report {
    /// Number of patients seen.
    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    /// Whether the report has nothing to bill.
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}
