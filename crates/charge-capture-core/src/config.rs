//! Session configuration and seed data.

use crate::models::{default_codes, default_locations, Location, ProcedureCode, User};
use crate::store::StoreKeys;

/// Default prefix for persistence keys.
pub const DEFAULT_KEY_PREFIX: &str = "charge-capture";

/// Settings used when loading a session from a store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prefix for every persistence key
    pub key_prefix: String,
    /// Locations used when the store has none
    pub default_locations: Vec<Location>,
    /// Procedure codes used when the store has none
    pub default_codes: Vec<ProcedureCode>,
    /// User used when the store has none
    pub default_user: User,
    /// Selected location used when the store has none
    pub default_location: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_locations: default_locations(),
            default_codes: default_codes(),
            default_user: User::default(),
            default_location: "main".to_string(),
        }
    }
}

impl SessionConfig {
    /// Use a different key prefix (e.g., one per clinician profile).
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Replace the seed locations. An empty list keeps the current seed.
    pub fn with_default_locations(mut self, locations: Vec<Location>) -> Self {
        let Some(first) = locations.first() else {
            return self;
        };
        self.default_location = first.id.clone();
        self.default_locations = locations;
        self
    }

    /// Replace the seed procedure codes.
    pub fn with_default_codes(mut self, codes: Vec<ProcedureCode>) -> Self {
        self.default_codes = codes;
        self
    }

    /// Replace the default user.
    pub fn with_default_user(mut self, user: User) -> Self {
        self.default_user = user;
        self
    }

    /// Persistence keys for this configuration.
    pub fn keys(&self) -> StoreKeys {
        StoreKeys::with_prefix(&self.key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys() {
        let config = SessionConfig::default();
        assert_eq!(config.keys().history, "charge-capture-history");
        assert_eq!(config.default_location, "main");
    }

    #[test]
    fn test_custom_locations_move_default_selection() {
        let config = SessionConfig::default()
            .with_default_locations(vec![Location::new("east", "East Wing")]);
        assert_eq!(config.default_location, "east");
    }
}
