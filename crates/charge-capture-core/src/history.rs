//! Append-only archive of committed end-of-day reports.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::Report;

/// Past reports, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    reports: VecDeque<Report>,
}

/// One flattened history row: a patient within a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub date: String,
    pub location_name: String,
    pub patient_name: String,
    pub mrn: String,
    /// Codes joined with ", "
    pub codes: String,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive a report as the newest entry.
    pub fn append(&mut self, report: Report) {
        self.reports.push_front(report);
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Newest report, if any.
    pub fn latest(&self) -> Option<&Report> {
        self.reports.front()
    }

    /// Reports from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    /// Flatten into one row per patient per report.
    pub fn export_rows(&self) -> Vec<HistoryRow> {
        self.reports
            .iter()
            .flat_map(|report| {
                report.patients.iter().map(move |patient| HistoryRow {
                    date: report.date.to_string(),
                    location_name: report.location_name.clone(),
                    patient_name: patient.name.clone(),
                    mrn: patient.mrn.clone(),
                    codes: patient.codes.join(", "),
                })
            })
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.reports.clear();
    }
}

impl From<Vec<Report>> for History {
    /// Build from a stored sequence that is already newest first.
    fn from(reports: Vec<Report>) -> Self {
        Self {
            reports: reports.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportPatient;
    use chrono::NaiveDate;

    fn make_report(day: u32, patients: &[(&str, &[&str])]) -> Report {
        let patients: Vec<ReportPatient> = patients
            .iter()
            .map(|(name, codes)| ReportPatient {
                name: name.to_string(),
                mrn: format!("MRN-{name}"),
                codes: codes.iter().map(|c| c.to_string()).collect(),
            })
            .collect();
        let total_codes = patients.iter().map(|p| p.codes.len()).sum();

        Report {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            location_id: "main".into(),
            location_name: "Main Hospital".into(),
            user: "Dr. Smith".into(),
            patients,
            total_codes,
            sent: true,
        }
    }

    #[test]
    fn test_append_is_newest_first() {
        let mut history = History::new();
        history.append(make_report(1, &[("Jo", &["99213"])]));
        history.append(make_report(2, &[("Al", &["99214"])]));

        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().date.to_string(), "2025-01-02");
        let dates: Vec<_> = history.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2025-01-02", "2025-01-01"]);
    }

    #[test]
    fn test_export_rows_flattens() {
        let mut history = History::new();
        history.append(make_report(1, &[("Jo", &["99213", "99214"]), ("Al", &["99212"])]));
        history.append(make_report(2, &[("Sam", &["99215"])]));

        let rows = history.export_rows();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].patient_name, "Sam");
        assert_eq!(rows[1].codes, "99213, 99214");
        assert_eq!(rows[2].mrn, "MRN-Al");
        assert_eq!(rows[2].location_name, "Main Hospital");
    }

    #[test]
    fn test_serializes_as_sequence() {
        let mut history = History::new();
        history.append(make_report(1, &[("Jo", &["99213"])]));

        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());

        let back: History = serde_json::from_value(json).unwrap();
        assert_eq!(back, history);
    }
}
