//! Patient models.

use serde::{Deserialize, Serialize};

/// A patient on a location's list.
///
/// `codes` holds everything committed by past end-of-day reports and only
/// grows (apart from catalog cascades). `todays_codes` holds the pending
/// selection for the current session and never contains duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Globally unique id across all locations
    pub id: u64,
    /// Patient name
    pub name: String,
    /// Medical record number (free-form)
    pub mrn: String,
    /// Committed codes from previous reports
    #[serde(default)]
    pub codes: Vec<String>,
    /// Pending codes for the current session
    #[serde(default)]
    pub todays_codes: Vec<String>,
}

impl Patient {
    /// Create a patient with no codes.
    pub fn new(id: u64, name: impl Into<String>, mrn: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            mrn: mrn.into(),
            codes: Vec::new(),
            todays_codes: Vec::new(),
        }
    }

    /// Check whether a code is pending for today.
    pub fn has_pending(&self, code: &str) -> bool {
        self.todays_codes.iter().any(|c| c == code)
    }

    /// Whether any code is pending.
    pub fn has_pending_codes(&self) -> bool {
        !self.todays_codes.is_empty()
    }

    /// Toggle a pending code. Returns `true` if the code is now selected.
    pub fn toggle_pending(&mut self, code: &str) -> bool {
        if self.has_pending(code) {
            self.todays_codes.retain(|c| c != code);
            false
        } else {
            self.todays_codes.push(code.to_string());
            true
        }
    }

    /// Rewrite `old` to `new` in both committed and pending codes.
    ///
    /// Pending codes keep set semantics: if `new` is already pending the
    /// renamed entry is dropped instead of duplicated.
    pub fn rename_code(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }

        for code in self.codes.iter_mut().filter(|c| c.as_str() == old) {
            *code = new.to_string();
        }

        let already_pending = self.has_pending(new);
        if already_pending {
            self.todays_codes.retain(|c| c != old);
        } else {
            for code in self.todays_codes.iter_mut().filter(|c| c.as_str() == old) {
                *code = new.to_string();
            }
        }
    }

    /// Remove a code from both committed and pending codes.
    pub fn strip_code(&mut self, code: &str) {
        self.codes.retain(|c| c != code);
        self.todays_codes.retain(|c| c != code);
    }

    /// Append pending codes to the committed list and clear them.
    pub fn commit_pending(&mut self) {
        let pending = std::mem::take(&mut self.todays_codes);
        self.codes.extend(pending);
    }

    /// Drop pending codes without committing. Returns what was dropped.
    pub fn discard_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.todays_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new(1, "Jo", "M1");
        assert_eq!(patient.name, "Jo");
        assert!(patient.codes.is_empty());
        assert!(!patient.has_pending_codes());
    }

    #[test]
    fn test_toggle_twice_restores() {
        let mut patient = Patient::new(1, "Jo", "M1");
        patient.todays_codes = vec!["99212".into()];

        assert!(patient.toggle_pending("99213"));
        assert_eq!(patient.todays_codes, vec!["99212", "99213"]);
        assert!(!patient.toggle_pending("99213"));
        assert_eq!(patient.todays_codes, vec!["99212"]);
    }

    #[test]
    fn test_rename_does_not_duplicate_pending() {
        let mut patient = Patient::new(1, "Jo", "M1");
        patient.codes = vec!["A".into(), "B".into(), "A".into()];
        patient.todays_codes = vec!["A".into(), "B".into()];

        patient.rename_code("A", "B");

        assert_eq!(patient.codes, vec!["B", "B", "B"]);
        assert_eq!(patient.todays_codes, vec!["B"]);
    }

    #[test]
    fn test_commit_appends_in_order() {
        let mut patient = Patient::new(1, "Jo", "M1");
        patient.codes = vec!["99212".into()];
        patient.todays_codes = vec!["99213".into(), "99212".into()];

        patient.commit_pending();

        assert_eq!(patient.codes, vec!["99212", "99213", "99212"]);
        assert!(patient.todays_codes.is_empty());
    }

    #[test]
    fn test_json_uses_camel_case() {
        let mut patient = Patient::new(7, "Jo", "M1");
        patient.todays_codes = vec!["99213".into()];

        let json = serde_json::to_value(&patient).unwrap();
        assert_eq!(json["todaysCodes"][0], "99213");
        assert_eq!(json["id"], 7);
    }
}
