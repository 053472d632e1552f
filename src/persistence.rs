//! Versioned save slots.
//!
//! A campaign is stored as `{"version": 1, "state": {..}, "savedAt": ..}`
//! under a fixed key. Anything that fails the version or structure checks is
//! discarded and the player lands back in setup.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    catalog::Catalog,
    runtime::{RuntimeSnapshot, PLAN_ACTIONS_PER_YEAR, SEASONS_PER_YEAR},
};

pub const SCHEMA_VERSION: u64 = 1;
pub const STATE_KEY: &str = "ecogamify_simulation_state_v1";
pub const ONBOARDING_KEY: &str = "ecogamify_simulation_onboarding_seen_v1";

const STATUSES: [&str; 4] = ["setup", "active", "victory", "collapse"];
const PHASES: [&str; 5] = ["plan", "weather", "disaster", "adapt", "evaluate"];
const RESOURCE_FIELDS: [&str; 7] = [
    "forest",
    "water",
    "energy",
    "airQuality",
    "economy",
    "happiness",
    "wildlife",
];
const SCORE_FIELDS: [&str; 3] = ["sustainability", "happiness", "resilience"];
const TILE_NUMBERS: [&str; 4] = ["health", "pollution", "energy", "biodiversity"];

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed save data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported save version {0:?}")]
    Version(Option<u64>),

    #[error("invalid save data: {0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> PersistError {
    PersistError::Invalid(message.into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<S> {
    pub version: u64,
    pub state: S,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

pub fn encode(snapshot: &RuntimeSnapshot) -> Result<String, PersistError> {
    let envelope = Envelope {
        version: SCHEMA_VERSION,
        state: snapshot,
        saved_at: Some(Utc::now()),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parses, checks and normalizes a stored campaign.
pub fn decode(text: &str) -> Result<RuntimeSnapshot, PersistError> {
    let envelope: Envelope<Value> = serde_json::from_str(text)?;
    if envelope.version != SCHEMA_VERSION {
        return Err(PersistError::Version(Some(envelope.version)));
    }
    let mut state = envelope.state;
    validate_state(&state)?;
    normalize_counters(&mut state);
    let snapshot: RuntimeSnapshot = serde_json::from_value(state)?;
    Ok(snapshot.sanitized())
}

/// Structural checks on the raw state object before it is trusted.
pub fn validate_state(state: &Value) -> Result<(), PersistError> {
    let object = state
        .as_object()
        .ok_or_else(|| invalid("state is not an object"))?;

    let status = object.get("status").and_then(Value::as_str);
    if !status.is_some_and(|status| STATUSES.contains(&status)) {
        return Err(invalid("unknown status"));
    }
    let phase = object.get("phase").and_then(Value::as_str);
    if !phase.is_some_and(|phase| PHASES.contains(&phase)) {
        return Err(invalid("unknown phase"));
    }
    for field in ["year", "co2ppm", "planActionsRemaining", "seasonIndex"] {
        if !object.get(field).is_some_and(Value::is_number) {
            return Err(invalid(format!("{field} must be numeric")));
        }
    }

    let tiles = object
        .get("tiles")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("tiles must be an array"))?;
    for tile in tiles {
        let well_formed = tile.get("id").is_some_and(Value::is_string)
            && tile.get("type").is_some_and(Value::is_string)
            && TILE_NUMBERS
                .iter()
                .all(|field| tile.get(field).is_some_and(Value::is_number));
        if !well_formed {
            return Err(invalid("tile is missing required fields"));
        }
    }

    require_numbers(object.get("resources"), &RESOURCE_FIELDS, "resources")?;
    require_numbers(object.get("scoreboard"), &SCORE_FIELDS, "scoreboard")?;

    if !object.get("log").is_some_and(Value::is_array) {
        return Err(invalid("log must be an array"));
    }
    Ok(())
}

fn require_numbers(value: Option<&Value>, fields: &[&str], name: &str) -> Result<(), PersistError> {
    let object = value
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(format!("{name} must be an object")))?;
    match fields
        .iter()
        .find(|field| !object.get(**field).is_some_and(Value::is_number))
    {
        Some(field) => Err(invalid(format!("{name}.{field} must be numeric"))),
        None => Ok(()),
    }
}

/// Pulls the integer counters into range so fractional or negative values
/// from storage still decode.
fn normalize_counters(state: &mut Value) {
    let Some(object) = state.as_object_mut() else {
        return;
    };
    let bounded = [
        ("seasonIndex", (SEASONS_PER_YEAR - 1) as f64),
        ("planActionsRemaining", f64::from(PLAN_ACTIONS_PER_YEAR)),
        ("year", f64::from(u32::MAX)),
    ];
    for (field, max) in bounded {
        if let Some(number) = object.get(field).and_then(Value::as_f64) {
            let clamped = if number.is_finite() {
                number.floor().clamp(0.0, max)
            } else {
                0.0
            };
            object.insert(field.to_string(), Value::from(clamped as u64));
        }
    }
}

/// Key/value storage for serialized state.
pub trait SnapshotStore: Send {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistError>;
}

/// One JSON file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        let path = self.path(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        self.entries.remove(key);
        Ok(())
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        (**self).write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        (**self).remove(key)
    }
}

/// The campaign slot and the onboarding flag on top of a store.
pub struct SaveSlot<S> {
    store: S,
}

impl<S: SnapshotStore> SaveSlot<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The stored campaign, or a fresh setup snapshot when nothing usable is
    /// stored.
    pub fn load_or_fresh(&self, catalog: &Catalog) -> RuntimeSnapshot {
        match self.store.read(STATE_KEY) {
            Ok(Some(text)) => match decode(&text) {
                Ok(snapshot) => {
                    debug!(status = ?snapshot.status, year = snapshot.year, "campaign restored");
                    snapshot
                }
                Err(err) => {
                    warn!(error = %err, "discarding stored campaign");
                    RuntimeSnapshot::fresh(catalog)
                }
            },
            Ok(None) => RuntimeSnapshot::fresh(catalog),
            Err(err) => {
                warn!(error = %err, "campaign storage unreadable");
                RuntimeSnapshot::fresh(catalog)
            }
        }
    }

    pub fn save(&mut self, snapshot: &RuntimeSnapshot) -> Result<(), PersistError> {
        let text = encode(snapshot)?;
        self.store.write(STATE_KEY, &text)
    }

    pub fn clear(&mut self) -> Result<(), PersistError> {
        self.store.remove(STATE_KEY)
    }

    pub fn onboarding_seen(&self) -> bool {
        matches!(self.store.read(ONBOARDING_KEY), Ok(Some(value)) if value.trim() == "true")
    }

    pub fn mark_onboarding_seen(&mut self) -> Result<(), PersistError> {
        self.store.write(ONBOARDING_KEY, "true")
    }
}
