//! Catalog models: care locations and billable procedure codes.

use serde::{Deserialize, Serialize};

/// A care location (hospital, clinic) that owns a patient list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    /// Slug-like unique identifier (e.g., "main")
    pub id: String,
    /// Display name
    pub name: String,
}

impl Location {
    /// Create a new location.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A billable procedure code (e.g., a CPT code).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcedureCode {
    /// Unique code
    pub code: String,
    /// Human-readable description
    pub description: String,
}

impl ProcedureCode {
    /// Create a new procedure code.
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Locations seeded into an empty store.
pub fn default_locations() -> Vec<Location> {
    vec![
        Location::new("main", "Main Hospital"),
        Location::new("satellite", "Satellite Clinic"),
    ]
}

/// Procedure codes seeded into an empty store.
pub fn default_codes() -> Vec<ProcedureCode> {
    vec![
        ProcedureCode::new("99212", "Office Visit - Level 2"),
        ProcedureCode::new("99213", "Office Visit - Level 3"),
        ProcedureCode::new("99214", "Office Visit - Level 4"),
        ProcedureCode::new("99215", "Office Visit - Level 5"),
        ProcedureCode::new("99221", "Initial Hospital Care - Level 1"),
        ProcedureCode::new("99222", "Initial Hospital Care - Level 2"),
        ProcedureCode::new("99223", "Initial Hospital Care - Level 3"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_unique() {
        let locations = default_locations();
        let codes = default_codes();

        let mut ids: Vec<_> = locations.iter().map(|l| l.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), locations.len());

        let mut code_ids: Vec<_> = codes.iter().map(|c| c.code.as_str()).collect();
        code_ids.sort();
        code_ids.dedup();
        assert_eq!(code_ids.len(), codes.len());
    }

    #[test]
    fn test_location_json_shape() {
        let json = serde_json::to_value(Location::new("main", "Main Hospital")).unwrap();
        assert_eq!(json["id"], "main");
        assert_eq!(json["name"], "Main Hospital");
    }
}
