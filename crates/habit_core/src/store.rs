//! Persistence seam for habits.
//!
//! The service keeps the authoritative state in memory and writes through to a
//! [`HabitStore`] after every change.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::model::{Habit, HabitId};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed habit store {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait HabitStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<Habit>>;

    /// Insert or replace the habit with the same id.
    fn save(&self, habit: &Habit) -> Result<()>;

    /// Remove the habit and its completions. Unknown ids are not an error.
    fn delete(&self, id: HabitId) -> Result<()>;
}

const STORE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    habits: Vec<Habit>,
}

/// Every habit in one pretty-printed JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(&self) -> Result<StoreDocument> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(StoreDocument {
                    version: STORE_VERSION,
                    habits: Vec::new(),
                })
            }
            Err(err) => return Err(self.io_error(err)),
        };
        if raw.trim().is_empty() {
            return Ok(StoreDocument {
                version: STORE_VERSION,
                habits: Vec::new(),
            });
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Write to a sibling temp file, then rename over the store.
    fn write_document(&self, document: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }
        let payload = serde_json::to_string_pretty(document).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, payload).map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_error(err))?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Vec<Habit>)) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        apply(&mut document.habits);
        document.version = STORE_VERSION;
        self.write_document(&document)
    }
}

impl HabitStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<Habit>> {
        let document = self.read_document()?;
        tracing::debug!(
            path = %self.path.display(),
            count = document.habits.len(),
            "habit store loaded"
        );
        Ok(document.habits)
    }

    fn save(&self, habit: &Habit) -> Result<()> {
        self.update(|habits| {
            match habits.iter_mut().find(|existing| existing.id == habit.id) {
                Some(existing) => *existing = habit.clone(),
                None => habits.push(habit.clone()),
            }
        })
    }

    fn delete(&self, id: HabitId) -> Result<()> {
        self.update(|habits| habits.retain(|habit| habit.id != id))
    }
}

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    habits: RwLock<HashMap<HabitId, Habit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_habits(habits: impl IntoIterator<Item = Habit>) -> Self {
        Self {
            habits: RwLock::new(habits.into_iter().map(|habit| (habit.id, habit)).collect()),
        }
    }

    pub fn get(&self, id: HabitId) -> Option<Habit> {
        self.habits.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.habits.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HabitStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Habit>> {
        Ok(self.habits.read().values().cloned().collect())
    }

    fn save(&self, habit: &Habit) -> Result<()> {
        self.habits.write().insert(habit.id, habit.clone());
        Ok(())
    }

    fn delete(&self, id: HabitId) -> Result<()> {
        self.habits.write().remove(&id);
        Ok(())
    }
}

impl<S: HabitStore + ?Sized> HabitStore for std::sync::Arc<S> {
    fn load_all(&self) -> Result<Vec<Habit>> {
        (**self).load_all()
    }

    fn save(&self, habit: &Habit) -> Result<()> {
        (**self).save(habit)
    }

    fn delete(&self, id: HabitId) -> Result<()> {
        (**self).delete(id)
    }
}
