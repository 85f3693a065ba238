//! Session service: catalog, patient lists, reports and history.
//!
//! A [`Session`] owns all charge-capture state and a [`KeyValueStore`] it
//! mirrors into. Every mutator validates, applies the change in memory, then
//! writes the touched keys. Validation failures come back as
//! [`Outcome::Rejected`] and leave state untouched; storage failures come
//! back as [`SessionError`] with the in-memory change still applied.
//!
//! Mutators take `&mut self`, so a cascade (e.g. a code rename rewriting
//! every patient) is never observable half-done.

mod catalog;
mod patients;
mod reports;

pub use patients::{DaySummary, DiscardedCodes, Rollover, SessionStats};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::SessionConfig;
use crate::history::History;
use crate::models::{default_locations, Location, Patient, ProcedureCode, User};
use crate::store::{KeyValueStore, StoreError, StoreKeys};

/// Why a mutation was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("Location already exists: {0}")]
    DuplicateLocation(String),

    #[error("Procedure code already exists: {0}")]
    DuplicateCode(String),

    #[error("Cannot remove the last remaining location")]
    LastLocation,

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("Unknown procedure code: {0}")]
    UnknownCode(String),

    #[error("Unknown patient: {0}")]
    UnknownPatient(u64),
}

/// Result of a mutation that passed or failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T = ()> {
    Applied(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    /// The applied value, discarding a rejection.
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }

    /// Convert into a plain `Result`.
    pub fn into_result(self) -> Result<T, Rejection> {
        match self {
            Outcome::Applied(value) => Ok(value),
            Outcome::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Session errors. Only storage can fail; validation uses [`Outcome`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Store(StoreError::Json(e))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Charge-capture session state backed by a key-value store.
pub struct Session<S: KeyValueStore> {
    store: S,
    config: SessionConfig,
    keys: StoreKeys,
    locations: Vec<Location>,
    codes: Vec<ProcedureCode>,
    patients: BTreeMap<String, Vec<Patient>>,
    current_date: NaiveDate,
    selected_location: String,
    user: User,
    history: History,
}

impl<S: KeyValueStore> Session<S> {
    /// Load the session from `store` with default configuration.
    ///
    /// `today` anchors the rollover check: pending codes from any other
    /// stored session date are discarded.
    pub fn load(store: S, today: NaiveDate) -> SessionResult<Self> {
        Self::load_with_config(store, today, SessionConfig::default())
    }

    /// Load the session from `store`.
    pub fn load_with_config(
        store: S,
        today: NaiveDate,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let keys = config.keys();

        let mut locations: Vec<Location> =
            read_or_else(&store, &keys.locations, || seed_locations(&config))?;
        if locations.is_empty() {
            tracing::warn!("Stored location list is empty, restoring defaults");
            locations = seed_locations(&config);
        }
        let codes = read_or_else(&store, &keys.codes, || config.default_codes.clone())?;
        let patients = read_or_else(&store, &keys.patients, BTreeMap::new)?;
        let user = read_or_else(&store, &keys.user, || config.default_user.clone())?;
        let selected_location =
            read_or_else(&store, &keys.selected_location, || config.default_location.clone())?;
        let history = read_or_else(&store, &keys.history, History::new)?;
        let last_session_date: Option<NaiveDate> =
            read_or_else(&store, &keys.last_session_date, || None)?;

        let mut session = Self {
            store,
            config,
            keys,
            locations,
            codes,
            patients,
            current_date: last_session_date.unwrap_or(today),
            selected_location,
            user,
            history,
        };

        session.ensure_patient_lists();
        session.ensure_selection();

        // Without a stored date the pending codes belong to an unknown day
        if last_session_date.is_some() {
            session.rollover_if_new_day(today)?;
        } else {
            let discarded = session.discard_all_pending();
            if !discarded.is_empty() {
                tracing::warn!(
                    patients = discarded.len(),
                    "Discarded pending codes with no stored session date"
                );
            }
        }
        session.persist_all()?;

        tracing::info!(
            date = %session.current_date,
            locations = session.locations.len(),
            codes = session.codes.len(),
            history = session.history.len(),
            "Session loaded"
        );
        Ok(session)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    pub fn codes(&self) -> &[ProcedureCode] {
        &self.codes
    }

    pub fn code(&self, code: &str) -> Option<&ProcedureCode> {
        self.codes.iter().find(|c| c.code == code)
    }

    pub fn selected_location(&self) -> &str {
        &self.selected_location
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Patient lists keyed by location id.
    pub fn patients_by_location(&self) -> &BTreeMap<String, Vec<Patient>> {
        &self.patients
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the session, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Give every location a patient list and drop lists with no location.
    fn ensure_patient_lists(&mut self) {
        for location in &self.locations {
            self.patients.entry(location.id.clone()).or_default();
        }
        let locations = &self.locations;
        let before = self.patients.len();
        self.patients
            .retain(|id, _| locations.iter().any(|l| &l.id == id));
        if self.patients.len() != before {
            tracing::warn!(
                dropped = before - self.patients.len(),
                "Dropped patient lists for unknown locations"
            );
        }
    }

    /// Point the selection at the first location when it names none.
    fn ensure_selection(&mut self) {
        if self.location(&self.selected_location).is_some() {
            return;
        }
        if let Some(first) = self.locations.first() {
            self.selected_location = first.id.clone();
        }
    }

    /// Turn a validated in-memory change into an outcome, persisting on
    /// success.
    fn settle<T>(
        &mut self,
        result: Result<T, Rejection>,
        persist: impl FnOnce(&mut Self) -> SessionResult<()>,
    ) -> SessionResult<Outcome<T>> {
        match result {
            Ok(value) => {
                persist(self)?;
                Ok(Outcome::Applied(value))
            }
            Err(rejection) => {
                tracing::debug!(%rejection, "Mutation rejected");
                Ok(Outcome::Rejected(rejection))
            }
        }
    }

    fn persist_locations(&mut self) -> SessionResult<()> {
        let value = serde_json::to_value(&self.locations)?;
        self.store.set(&self.keys.locations, value)?;
        Ok(())
    }

    fn persist_codes(&mut self) -> SessionResult<()> {
        let value = serde_json::to_value(&self.codes)?;
        self.store.set(&self.keys.codes, value)?;
        Ok(())
    }

    /// Patients and the session date are always written together.
    fn persist_patients(&mut self) -> SessionResult<()> {
        let patients = serde_json::to_value(&self.patients)?;
        let date = serde_json::to_value(self.current_date)?;
        self.store.set_many(vec![
            (self.keys.patients.as_str(), patients),
            (self.keys.last_session_date.as_str(), date),
        ])?;
        tracing::debug!(date = %self.current_date, "Persisted patient lists");
        Ok(())
    }

    fn persist_selected_location(&mut self) -> SessionResult<()> {
        self.store.set(
            &self.keys.selected_location,
            Value::String(self.selected_location.clone()),
        )?;
        Ok(())
    }

    fn persist_user(&mut self) -> SessionResult<()> {
        let value = serde_json::to_value(&self.user)?;
        self.store.set(&self.keys.user, value)?;
        Ok(())
    }

    fn persist_history(&mut self) -> SessionResult<()> {
        let value = serde_json::to_value(&self.history)?;
        self.store.set(&self.keys.history, value)?;
        Ok(())
    }

    fn persist_all(&mut self) -> SessionResult<()> {
        self.persist_user()?;
        self.persist_selected_location()?;
        self.persist_patients()?;
        self.persist_history()?;
        self.persist_locations()?;
        self.persist_codes()
    }
}

/// Read and decode a stored value, falling back when it is absent or does
/// not match the expected shape.
fn read_or_else<S, T>(store: &S, key: &str, default: impl FnOnce() -> T) -> SessionResult<T>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    let value = match store.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(default()),
        Err(StoreError::Json(e)) => {
            tracing::warn!(key, error = %e, "Ignoring unparsable stored value");
            return Ok(default());
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_value(value) {
        Ok(decoded) => Ok(decoded),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring corrupt stored value");
            Ok(default())
        }
    }
}

/// Seed locations from `config`, never empty.
fn seed_locations(config: &SessionConfig) -> Vec<Location> {
    if config.default_locations.is_empty() {
        default_locations()
    } else {
        config.default_locations.clone()
    }
}

/// Trim a required text field, rejecting blanks.
fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, Rejection> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Rejection::EmptyField(field))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore, StoreResult};
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_load_empty_store_uses_defaults() {
        let session = Session::load(MemoryStore::new(), day(1)).unwrap();

        assert_eq!(session.locations().len(), 2);
        assert_eq!(session.codes().len(), 7);
        assert_eq!(session.selected_location(), "main");
        assert_eq!(session.user().name, "Dr. Smith");
        assert!(session.history().is_empty());
        assert_eq!(session.current_date(), day(1));

        // Every location has a patient list
        for location in session.locations() {
            assert!(session.patients_by_location().contains_key(&location.id));
        }
    }

    #[test]
    fn test_load_writes_every_key() {
        let session = Session::load(MemoryStore::new(), day(1)).unwrap();
        let keys = session.config().keys();
        let store = session.into_store();

        for key in keys.all() {
            assert!(store.contains_key(key), "missing {key}");
        }
        assert_eq!(store.get(&keys.last_session_date).unwrap(), Some(json!("2025-01-01")));
    }

    #[test]
    fn test_corrupt_value_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store.set("charge-capture-codes", json!({"not": "a list"})).unwrap();

        let session = Session::load(store, day(1)).unwrap();
        assert_eq!(session.codes().len(), 7);
    }

    #[test]
    fn test_stale_selection_falls_back_to_first_location() {
        let mut store = MemoryStore::new();
        store
            .set("charge-capture-selected-hospital", json!("gone"))
            .unwrap();

        let session = Session::load(store, day(1)).unwrap();
        assert_eq!(session.selected_location(), "main");
    }

    #[test]
    fn test_custom_prefix_isolates_keys() {
        let config = SessionConfig::default().with_key_prefix("profile-2");
        let session = Session::load_with_config(MemoryStore::new(), day(1), config).unwrap();
        let store = session.into_store();

        assert!(store.contains_key("profile-2-history"));
        assert!(!store.contains_key("charge-capture-history"));
    }

    /// Memory store that can be told to fail writes or one read.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: bool,
        unreadable: Option<&'static str>,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> StoreResult<Option<Value>> {
            if self.unreadable == Some(key) {
                let err = serde_json::from_str::<Value>("{").unwrap_err();
                return Err(StoreError::Json(err));
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
            if self.fail_writes {
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> StoreResult<()> {
            self.inner.remove(key)
        }
    }

    fn stored_patients(pending: &[&str]) -> Value {
        json!({
            "main": [{"id": 1, "name": "Jo", "mrn": "M1", "codes": ["99212"], "todaysCodes": pending}]
        })
    }

    #[test]
    fn test_missing_session_date_discards_pending() {
        let mut store = MemoryStore::new();
        store
            .set("charge-capture-todays-patients", stored_patients(&["99213"]))
            .unwrap();

        let session = Session::load(store, day(2)).unwrap();

        let patient = session.patient("main", 1).unwrap();
        assert!(patient.todays_codes.is_empty());
        assert_eq!(patient.codes, vec!["99212"]);
        assert_eq!(session.current_date(), day(2));
    }

    #[test]
    fn test_corrupt_session_date_discards_pending() {
        let mut store = MemoryStore::new();
        store
            .set("charge-capture-todays-patients", stored_patients(&["99213"]))
            .unwrap();
        store
            .set("charge-capture-last-session-date", json!("Wed Jan 01 2025"))
            .unwrap();

        let session = Session::load(store, day(1)).unwrap();
        assert!(session.patient("main", 1).unwrap().todays_codes.is_empty());
    }

    #[test]
    fn test_same_day_keeps_pending() {
        let mut store = MemoryStore::new();
        store
            .set("charge-capture-todays-patients", stored_patients(&["99213"]))
            .unwrap();
        store
            .set("charge-capture-last-session-date", json!("2025-01-02"))
            .unwrap();

        let session = Session::load(store, day(2)).unwrap();
        assert_eq!(session.patient("main", 1).unwrap().todays_codes, vec!["99213"]);
    }

    #[test]
    fn test_bare_text_values_in_sqlite_load() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (key, value) in [
            ("charge-capture-last-session-date", "2025-01-01"),
            ("charge-capture-selected-hospital", "satellite"),
            ("charge-capture-codes", "{broken"),
        ] {
            store
                .conn()
                .execute(
                    "INSERT INTO kv_store (key, value) VALUES (?1, ?2)",
                    [key, value],
                )
                .unwrap();
        }

        let session = Session::load(store, day(1)).unwrap();

        assert_eq!(session.current_date(), day(1));
        assert_eq!(session.selected_location(), "satellite");
        assert_eq!(session.codes().len(), 7);
    }

    #[test]
    fn test_unparsable_read_falls_back_to_default() {
        let store = FlakyStore {
            unreadable: Some("charge-capture-user"),
            ..FlakyStore::default()
        };

        let session = Session::load(store, day(1)).unwrap();
        assert_eq!(session.user().name, "Dr. Smith");
    }

    #[test]
    fn test_empty_seed_locations_fall_back() {
        let config = SessionConfig::default().with_default_locations(vec![]);
        let session = Session::load_with_config(MemoryStore::new(), day(1), config).unwrap();

        assert_eq!(session.locations().len(), 2);
        assert_eq!(session.selected_location(), "main");

        // Clearing the public field directly is covered as well
        let mut config = SessionConfig::default();
        config.default_locations.clear();
        config.default_location = "gone".to_string();
        let mut session = Session::load_with_config(MemoryStore::new(), day(1), config).unwrap();
        assert_eq!(session.selected_location(), "main");

        session.reset_all().unwrap();
        assert_eq!(session.locations().len(), 2);
        assert_eq!(session.selected_location(), "main");
    }

    #[test]
    fn test_failed_write_keeps_mutation_applied() {
        let mut session = Session::load(FlakyStore::default(), day(1)).unwrap();
        session.add_patient("main", "Jo", "M1").unwrap();
        session.toggle_todays_code("main", 1, "99213").unwrap();

        session.store.fail_writes = true;
        let result = session.rename_code("99213", "99213-B", "Renamed");

        assert!(matches!(result, Err(SessionError::Store(_))));
        assert!(session.code("99213").is_none());
        assert_eq!(session.code("99213-B").unwrap().description, "Renamed");
        assert_eq!(session.patient("main", 1).unwrap().todays_codes, vec!["99213-B"]);

        // The store still holds the previous catalog
        let stored = session.store().inner.get("charge-capture-codes").unwrap().unwrap();
        assert!(stored.to_string().contains("\"99213\""));
        assert!(!stored.to_string().contains("99213-B"));
    }

    #[test]
    fn test_outcome_helpers() {
        let applied: Outcome<u64> = Outcome::Applied(3);
        assert!(applied.is_applied());
        assert_eq!(applied.applied(), Some(3));

        let rejected: Outcome = Outcome::Rejected(Rejection::LastLocation);
        assert!(rejected.is_rejected());
        assert_eq!(rejected.rejection(), Some(&Rejection::LastLocation));
        assert_eq!(rejected.into_result(), Err(Rejection::LastLocation));
    }
}
