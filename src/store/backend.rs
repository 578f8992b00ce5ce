use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, RosterError};
use crate::store::RosterSnapshot;

/// Where roster state is loaded from and saved to.
///
/// `save` is all-or-nothing: either the whole snapshot is stored or the call
/// fails with `BackingStoreUnavailable` and the previous state is kept.
pub trait RosterBackend: Send {
    fn load(&self) -> Result<Option<RosterSnapshot>>;
    fn save(&mut self, snapshot: &RosterSnapshot) -> Result<()>;
    fn describe(&self) -> String;
}

/// Keeps the last saved snapshot in memory; used by tests and offline mode.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Option<RosterSnapshot>,
}

impl MemoryBackend {
    pub fn with_snapshot(snapshot: RosterSnapshot) -> Self {
        MemoryBackend {
            snapshot: Some(snapshot),
        }
    }
}

impl RosterBackend for MemoryBackend {
    fn load(&self) -> Result<Option<RosterSnapshot>> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &RosterSnapshot) -> Result<()> {
        self.snapshot = Some(snapshot.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// A JSON file on disk. Saves go to a sibling temp file that is then renamed
/// over the original.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonFileBackend {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn unavailable(&self, action: &str, err: impl std::fmt::Display) -> RosterError {
        RosterError::BackingStoreUnavailable(format!("{action} {}: {err}", self.path.display()))
    }
}

impl RosterBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<RosterSnapshot>> {
        if !self.path.exists() {
            debug!("no roster file at {}, starting empty", self.path.display());
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.unavailable("failed to read", e))?;
        let snapshot = serde_json::from_str(&contents).map_err(|e| self.unavailable("failed to parse", e))?;
        Ok(Some(snapshot))
    }

    fn save(&mut self, snapshot: &RosterSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.unavailable("failed to create directory for", e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.unavailable("failed to write", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.unavailable("failed to replace", e))?;
        debug!("saved roster to {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
