//! Patient lists, pending-code toggling and day rollover.

use chrono::NaiveDate;
use serde::Serialize;

use super::{required, Outcome, Rejection, Session, SessionResult};
use crate::models::Patient;
use crate::store::KeyValueStore;

/// What a day rollover discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rollover {
    /// Session date before the rollover
    pub previous_date: NaiveDate,
    /// Session date after the rollover
    pub date: NaiveDate,
    /// Pending codes that were never committed, per patient
    pub discarded: Vec<DiscardedCodes>,
}

/// Pending codes dropped from one patient by a rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardedCodes {
    pub location_id: String,
    pub patient_id: u64,
    pub codes: Vec<String>,
}

/// Per-location activity for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    /// Patients on the list
    pub patients: usize,
    /// Patients with at least one pending code
    pub patients_seen: usize,
    /// Total pending codes
    pub pending_codes: usize,
}

/// Counts across the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub locations: usize,
    pub codes: usize,
    pub history_days: usize,
    pub patients: usize,
}

impl<S: KeyValueStore> Session<S> {
    /// Start a new day if `today` differs from the session date.
    ///
    /// Every pending code is dropped; committed codes are kept. Returns
    /// `None` when the session is already on `today`.
    pub fn rollover_if_new_day(&mut self, today: NaiveDate) -> SessionResult<Option<Rollover>> {
        if self.current_date == today {
            return Ok(None);
        }

        let rollover = Rollover {
            previous_date: self.current_date,
            date: today,
            discarded: self.discard_all_pending(),
        };
        self.current_date = today;
        self.persist_patients()?;

        if rollover.discarded.is_empty() {
            tracing::info!(from = %rollover.previous_date, to = %today, "Started new session day");
        } else {
            tracing::warn!(
                from = %rollover.previous_date,
                to = %today,
                patients = rollover.discarded.len(),
                "Discarded uncommitted codes from previous session day"
            );
        }
        Ok(Some(rollover))
    }

    /// Drop every pending code, reporting what was dropped per patient.
    pub(super) fn discard_all_pending(&mut self) -> Vec<DiscardedCodes> {
        let mut discarded = Vec::new();
        for (location_id, patients) in self.patients.iter_mut() {
            for patient in patients.iter_mut() {
                let codes = patient.discard_pending();
                if !codes.is_empty() {
                    discarded.push(DiscardedCodes {
                        location_id: location_id.clone(),
                        patient_id: patient.id,
                        codes,
                    });
                }
            }
        }
        discarded
    }

    /// Add a patient to a location. Returns the new patient id.
    pub fn add_patient(
        &mut self,
        location_id: &str,
        name: &str,
        mrn: &str,
    ) -> SessionResult<Outcome<u64>> {
        let result = self.apply_add_patient(location_id, name, mrn);
        self.settle(result, |s| s.persist_patients())
    }

    fn apply_add_patient(
        &mut self,
        location_id: &str,
        name: &str,
        mrn: &str,
    ) -> Result<u64, Rejection> {
        let name = required(name, "patient name")?;
        let mrn = required(mrn, "MRN")?;
        let id = self.next_patient_id();
        let list = self
            .patients
            .get_mut(location_id)
            .ok_or_else(|| Rejection::UnknownLocation(location_id.to_string()))?;

        list.push(Patient::new(id, name, mrn));
        tracing::debug!(location_id, patient_id = id, "Patient added");
        Ok(id)
    }

    /// Next free patient id: one past the highest id in any location.
    pub fn next_patient_id(&self) -> u64 {
        self.patients
            .values()
            .flatten()
            .map(|p| p.id)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Remove a patient from a location. Removing an absent patient is a
    /// successful no-op.
    pub fn remove_patient(&mut self, location_id: &str, patient_id: u64) -> SessionResult<Outcome> {
        let result = match self.patients.get_mut(location_id) {
            Some(list) => {
                list.retain(|p| p.id != patient_id);
                tracing::debug!(location_id, patient_id, "Patient removed");
                Ok(())
            }
            None => Err(Rejection::UnknownLocation(location_id.to_string())),
        };
        self.settle(result, |s| s.persist_patients())
    }

    /// Select or deselect a code for a patient today.
    ///
    /// Returns `true` when the code is now selected. Toggling the same code
    /// twice restores the original pending list.
    pub fn toggle_todays_code(
        &mut self,
        location_id: &str,
        patient_id: u64,
        code: &str,
    ) -> SessionResult<Outcome<bool>> {
        let result = self.apply_toggle(location_id, patient_id, code);
        self.settle(result, |s| s.persist_patients())
    }

    fn apply_toggle(
        &mut self,
        location_id: &str,
        patient_id: u64,
        code: &str,
    ) -> Result<bool, Rejection> {
        if self.code(code).is_none() {
            return Err(Rejection::UnknownCode(code.to_string()));
        }
        let patient = self
            .patients
            .get_mut(location_id)
            .ok_or_else(|| Rejection::UnknownLocation(location_id.to_string()))?
            .iter_mut()
            .find(|p| p.id == patient_id)
            .ok_or(Rejection::UnknownPatient(patient_id))?;

        let selected = patient.toggle_pending(code);
        tracing::debug!(location_id, patient_id, code, selected, "Toggled pending code");
        Ok(selected)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Patients of a location, in insertion order.
    pub fn patients(&self, location_id: &str) -> Option<&[Patient]> {
        self.patients.get(location_id).map(Vec::as_slice)
    }

    pub fn patient(&self, location_id: &str, patient_id: u64) -> Option<&Patient> {
        self.patients(location_id)?
            .iter()
            .find(|p| p.id == patient_id)
    }

    /// Activity summary for a location's current session.
    pub fn day_summary(&self, location_id: &str) -> Option<DaySummary> {
        let patients = self.patients(location_id)?;
        Some(DaySummary {
            patients: patients.len(),
            patients_seen: patients.iter().filter(|p| p.has_pending_codes()).count(),
            pending_codes: patients.iter().map(|p| p.todays_codes.len()).sum(),
        })
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            locations: self.locations.len(),
            codes: self.codes.len(),
            history_days: self.history.len(),
            patients: self.patients.values().map(Vec::len).sum(),
        }
    }
}
