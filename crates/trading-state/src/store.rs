//! Ticket-keyed store of managed trade records.
//!
//! The whole mapping lives in one pretty-printed JSON document keyed by the
//! ticket as a string. Every operation reloads the document under the store
//! lock, so several handles on the same file see each other's writes.
//!
//! A document that does not parse is archived and the store carries on empty.
//! The backup paths are kept until [`StateStore::take_quarantined`] collects
//! them. When the archive itself fails the store refuses to continue, so the
//! damaged file is never overwritten.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, info};
use trading_core::error::StateError;
use trading_core::types::ManagedTradeRecord;

use crate::atomic::AtomicFile;

type StateMap = BTreeMap<u64, ManagedTradeRecord>;

/// Durable mapping of ticket to [`ManagedTradeRecord`].
#[derive(Debug)]
pub struct StateStore {
    file: AtomicFile,
    lock: Mutex<()>,
    quarantined: Mutex<Vec<PathBuf>>,
}

impl StateStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let file = AtomicFile::new(path);
        file.remove_stale_temp().map_err(|source| StateError::Io {
            path: file.temp_path().display().to_string(),
            source,
        })?;

        let store = Self {
            file,
            lock: Mutex::new(()),
            quarantined: Mutex::new(Vec::new()),
        };
        let tickets = store.list_tickets()?;
        info!(
            path = %store.path().display(),
            managed = tickets.len(),
            "State store opened"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Insert or replace the record for `ticket`.
    pub fn save(&self, ticket: u64, record: ManagedTradeRecord) -> Result<(), StateError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load()?;
        map.insert(ticket, record);
        self.persist(&map)?;
        debug!(ticket, "Saved managed trade");
        Ok(())
    }

    pub fn get(&self, ticket: u64) -> Result<Option<ManagedTradeRecord>, StateError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(&ticket))
    }

    /// Remove `ticket`. Removing an absent ticket is a no-op returning `false`.
    pub fn remove(&self, ticket: u64) -> Result<bool, StateError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load()?;
        if map.remove(&ticket).is_none() {
            return Ok(false);
        }
        self.persist(&map)?;
        debug!(ticket, "Removed managed trade");
        Ok(true)
    }

    /// Apply `f` to the record for `ticket` and persist it, in one locked step.
    ///
    /// Returns `false` when the ticket is not tracked.
    pub fn update<F>(&self, ticket: u64, f: F) -> Result<bool, StateError>
    where
        F: FnOnce(&mut ManagedTradeRecord),
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load()?;
        let Some(record) = map.get_mut(&ticket) else {
            return Ok(false);
        };
        f(record);
        self.persist(&map)?;
        Ok(true)
    }

    pub fn list_tickets(&self) -> Result<BTreeSet<u64>, StateError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.into_keys().collect())
    }

    /// All records, ordered by ticket.
    pub fn records(&self) -> Result<Vec<ManagedTradeRecord>, StateError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.into_values().collect())
    }

    /// Backups made since the last call, oldest first.
    pub fn take_quarantined(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.quarantined.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Read the document. Caller holds the lock.
    fn load(&self) -> Result<StateMap, StateError> {
        let bytes = match self.file.read() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(StateMap::new()),
            Err(source) => return Err(self.io_error(source)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StateMap::new());
        }

        match serde_json::from_slice::<StateMap>(&bytes) {
            Ok(map) => Ok(map),
            Err(parse_error) => {
                let backup = self.file.quarantine().map_err(|source| {
                    error!(
                        severity = "critical",
                        path = %self.path().display(),
                        error = %parse_error,
                        archive_error = %source,
                        "State file is corrupt and could not be archived"
                    );
                    StateError::Quarantine {
                        path: self.path().display().to_string(),
                        source,
                    }
                })?;
                error!(
                    severity = "critical",
                    path = %self.path().display(),
                    backup = %backup.display(),
                    error = %parse_error,
                    "State file is corrupt; archived it and continuing with empty state"
                );
                self.quarantined
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(backup);
                Ok(StateMap::new())
            }
        }
    }

    /// Replace the document. Caller holds the lock.
    fn persist(&self, map: &StateMap) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(map)?;
        self.file.write(&json).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path().display().to_string(),
            source,
        }
    }
}
