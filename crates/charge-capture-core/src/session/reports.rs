//! End-of-day reports, history archive and bulk resets.

use chrono::NaiveDate;

use super::{seed_locations, Outcome, Rejection, Session, SessionResult};
use crate::history::History;
use crate::models::{Report, ReportPatient};
use crate::store::KeyValueStore;

impl<S: KeyValueStore> Session<S> {
    /// Build an unsent report of a location's pending codes.
    ///
    /// Only patients with at least one pending code are included. Does not
    /// modify the session.
    pub fn build_report(
        &self,
        location_id: &str,
        date: NaiveDate,
        user: &str,
    ) -> Result<Report, Rejection> {
        let location = self
            .location(location_id)
            .ok_or_else(|| Rejection::UnknownLocation(location_id.to_string()))?;
        let patients: Vec<ReportPatient> = self
            .patients(location_id)
            .unwrap_or_default()
            .iter()
            .filter(|p| p.has_pending_codes())
            .map(|p| ReportPatient {
                name: p.name.clone(),
                mrn: p.mrn.clone(),
                codes: p.todays_codes.clone(),
            })
            .collect();
        let total_codes = patients.iter().map(|p| p.codes.len()).sum();

        Ok(Report {
            date,
            location_id: location.id.clone(),
            location_name: location.name.clone(),
            user: user.to_string(),
            patients,
            total_codes,
            sent: false,
        })
    }

    /// Archive a report as sent and commit the location's pending codes.
    ///
    /// Every patient of the report's location has its pending codes appended
    /// to its committed codes, then cleared. Returns the archived report.
    pub fn commit_report(&mut self, report: Report) -> SessionResult<Outcome<Report>> {
        let result = self.apply_commit(report);
        self.settle(result, |s| {
            s.persist_history()?;
            s.persist_patients()
        })
    }

    fn apply_commit(&mut self, mut report: Report) -> Result<Report, Rejection> {
        let patients = self
            .patients
            .get_mut(&report.location_id)
            .ok_or_else(|| Rejection::UnknownLocation(report.location_id.clone()))?;

        for patient in patients.iter_mut() {
            patient.commit_pending();
        }

        report.sent = true;
        self.history.append(report.clone());

        tracing::info!(
            location_id = %report.location_id,
            date = %report.date,
            patients = report.patient_count(),
            total_codes = report.total_codes,
            "End-of-day report committed"
        );
        Ok(report)
    }

    /// Build and commit the report for the selected location, the session
    /// date and the current user.
    pub fn close_out_day(&mut self) -> SessionResult<Outcome<Report>> {
        let built = self.build_report(
            &self.selected_location,
            self.current_date,
            &self.user.name,
        );
        match built {
            Ok(report) => self.commit_report(report),
            Err(rejection) => Ok(Outcome::Rejected(rejection)),
        }
    }

    /// Delete every archived report. Catalog and patients are kept.
    pub fn clear_history(&mut self) -> SessionResult<()> {
        let cleared = self.history.len();
        self.history.clear();
        self.persist_history()?;
        tracing::info!(cleared, "History cleared");
        Ok(())
    }

    /// Remove every persistence key and restore default state.
    ///
    /// The session date is kept; all patients and history are lost.
    pub fn reset_all(&mut self) -> SessionResult<()> {
        for key in self.keys.all() {
            self.store.remove(key)?;
        }

        self.locations = seed_locations(&self.config);
        self.codes = self.config.default_codes.clone();
        self.user = self.config.default_user.clone();
        self.selected_location = self.config.default_location.clone();
        self.history = History::new();
        self.patients.clear();
        self.ensure_patient_lists();
        self.ensure_selection();

        tracing::info!("All data reset to defaults");
        Ok(())
    }
}
