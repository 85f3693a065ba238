//! Catalog operations: locations, procedure codes, user and selection.

use super::{required, Outcome, Rejection, Session, SessionResult};
use crate::models::{Location, ProcedureCode, User, UserRole};
use crate::store::KeyValueStore;

impl<S: KeyValueStore> Session<S> {
    // =========================================================================
    // Locations
    // =========================================================================

    /// Add a location with an empty patient list.
    pub fn add_location(&mut self, id: &str, name: &str) -> SessionResult<Outcome> {
        let result = self.apply_add_location(id, name);
        self.settle(result, |s| {
            s.persist_locations()?;
            s.persist_patients()
        })
    }

    fn apply_add_location(&mut self, id: &str, name: &str) -> Result<(), Rejection> {
        let id = required(id, "location id")?;
        let name = required(name, "location name")?;
        if self.location(id).is_some() {
            return Err(Rejection::DuplicateLocation(id.to_string()));
        }

        self.locations.push(Location::new(id, name));
        self.patients.insert(id.to_string(), Vec::new());
        tracing::info!(location_id = id, "Location added");
        Ok(())
    }

    /// Rename a location, moving its patient list when the id changes.
    ///
    /// The selection follows a renamed id. A new id that belongs to a
    /// different location is rejected.
    pub fn rename_location(
        &mut self,
        old_id: &str,
        new_id: &str,
        new_name: &str,
    ) -> SessionResult<Outcome> {
        let result = self.apply_rename_location(old_id, new_id, new_name);
        self.settle(result, |s| {
            s.persist_locations()?;
            s.persist_patients()?;
            s.persist_selected_location()
        })
    }

    fn apply_rename_location(
        &mut self,
        old_id: &str,
        new_id: &str,
        new_name: &str,
    ) -> Result<(), Rejection> {
        let new_id = required(new_id, "location id")?;
        let new_name = required(new_name, "location name")?;
        let index = self
            .locations
            .iter()
            .position(|l| l.id == old_id)
            .ok_or_else(|| Rejection::UnknownLocation(old_id.to_string()))?;
        if new_id != old_id && self.location(new_id).is_some() {
            return Err(Rejection::DuplicateLocation(new_id.to_string()));
        }

        self.locations[index] = Location::new(new_id, new_name);

        if new_id != old_id {
            let list = self.patients.remove(old_id).unwrap_or_default();
            self.patients.insert(new_id.to_string(), list);
            if self.selected_location == old_id {
                self.selected_location = new_id.to_string();
            }
        }

        tracing::info!(old_id, new_id, "Location renamed");
        Ok(())
    }

    /// Remove a location and its patient list. The last location stays.
    ///
    /// If the removed location was selected, the selection moves to the
    /// first remaining location in catalog order.
    pub fn remove_location(&mut self, id: &str) -> SessionResult<Outcome> {
        let result = self.apply_remove_location(id);
        self.settle(result, |s| {
            s.persist_locations()?;
            s.persist_patients()?;
            s.persist_selected_location()
        })
    }

    fn apply_remove_location(&mut self, id: &str) -> Result<(), Rejection> {
        let index = self
            .locations
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| Rejection::UnknownLocation(id.to_string()))?;
        if self.locations.len() <= 1 {
            return Err(Rejection::LastLocation);
        }

        self.locations.remove(index);
        let dropped = self.patients.remove(id).map(|list| list.len()).unwrap_or(0);
        self.ensure_selection();

        tracing::info!(location_id = id, dropped_patients = dropped, "Location removed");
        Ok(())
    }

    /// Make `id` the working location.
    pub fn select_location(&mut self, id: &str) -> SessionResult<Outcome> {
        let result = if self.location(id).is_some() {
            self.selected_location = id.to_string();
            Ok(())
        } else {
            Err(Rejection::UnknownLocation(id.to_string()))
        };
        self.settle(result, |s| s.persist_selected_location())
    }

    // =========================================================================
    // Procedure codes
    // =========================================================================

    /// Add a procedure code to the catalog.
    pub fn add_code(&mut self, code: &str, description: &str) -> SessionResult<Outcome> {
        let result = self.apply_add_code(code, description);
        self.settle(result, |s| s.persist_codes())
    }

    fn apply_add_code(&mut self, code: &str, description: &str) -> Result<(), Rejection> {
        let code = required(code, "code")?;
        let description = required(description, "code description")?;
        if self.code(code).is_some() {
            return Err(Rejection::DuplicateCode(code.to_string()));
        }

        self.codes.push(ProcedureCode::new(code, description));
        tracing::info!(code, "Procedure code added");
        Ok(())
    }

    /// Update a catalog code. A changed code is rewritten in every
    /// patient's committed and pending codes across all locations.
    pub fn rename_code(
        &mut self,
        old_code: &str,
        new_code: &str,
        description: &str,
    ) -> SessionResult<Outcome> {
        let result = self.apply_rename_code(old_code, new_code, description);
        self.settle(result, |s| {
            s.persist_codes()?;
            s.persist_patients()
        })
    }

    fn apply_rename_code(
        &mut self,
        old_code: &str,
        new_code: &str,
        description: &str,
    ) -> Result<(), Rejection> {
        let new_code = required(new_code, "code")?;
        let description = required(description, "code description")?;
        let index = self
            .codes
            .iter()
            .position(|c| c.code == old_code)
            .ok_or_else(|| Rejection::UnknownCode(old_code.to_string()))?;
        if new_code != old_code && self.code(new_code).is_some() {
            return Err(Rejection::DuplicateCode(new_code.to_string()));
        }

        self.codes[index] = ProcedureCode::new(new_code, description);

        if new_code != old_code {
            let mut touched = 0usize;
            for patient in self.patients.values_mut().flatten() {
                let had = patient
                    .codes
                    .iter()
                    .chain(&patient.todays_codes)
                    .any(|c| c == old_code);
                if had {
                    patient.rename_code(old_code, new_code);
                    touched += 1;
                }
            }
            tracing::info!(old_code, new_code, patients = touched, "Procedure code renamed");
        }
        Ok(())
    }

    /// Remove a code from the catalog and from every patient.
    pub fn remove_code(&mut self, code: &str) -> SessionResult<Outcome> {
        let result = self.apply_remove_code(code);
        self.settle(result, |s| {
            s.persist_codes()?;
            s.persist_patients()
        })
    }

    fn apply_remove_code(&mut self, code: &str) -> Result<(), Rejection> {
        let index = self
            .codes
            .iter()
            .position(|c| c.code == code)
            .ok_or_else(|| Rejection::UnknownCode(code.to_string()))?;

        self.codes.remove(index);
        for patient in self.patients.values_mut().flatten() {
            patient.strip_code(code);
        }

        tracing::info!(code, "Procedure code removed");
        Ok(())
    }

    // =========================================================================
    // User
    // =========================================================================

    /// Set the user stamped on reports.
    pub fn set_user(&mut self, name: &str, role: UserRole) -> SessionResult<Outcome> {
        let result = required(name, "user name").map(|name| {
            self.user = User::new(name, role);
        });
        self.settle(result, |s| s.persist_user())
    }
}
