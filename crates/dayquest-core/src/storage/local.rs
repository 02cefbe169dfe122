//! Local persistence adapter.
//!
//! Snapshots the progress record into a [`KvStore`] under a key namespaced by
//! project id. Reads and writes are best-effort: failures are logged and the
//! in-memory record stays authoritative.

use tracing::{debug, warn};

use super::kv::KvStore;
use crate::error::StorageError;
use crate::progress::ProgressState;

const KEY_PREFIX: &str = "dayquest_progress";

pub struct LocalPersistence {
    kv: Box<dyn KvStore>,
}

impl LocalPersistence {
    pub fn new(kv: Box<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// `dayquest_progress_<project>` or the bare prefix without a project.
    pub fn storage_key(project_id: Option<&str>) -> String {
        match project_id.map(str::trim).filter(|p| !p.is_empty()) {
            Some(project) => format!("{KEY_PREFIX}_{project}"),
            None => KEY_PREFIX.to_string(),
        }
    }

    /// Stored snapshot merged over the defaults; defaults win for missing or
    /// malformed fields. Falls back to the default record on any failure.
    pub fn load(&self, project_id: Option<&str>) -> ProgressState {
        match self.try_load(project_id) {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(key = %Self::storage_key(project_id), "no stored progress, using defaults");
                ProgressState::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to load progress, using defaults");
                ProgressState::default()
            }
        }
    }

    fn try_load(&self, project_id: Option<&str>) -> Result<Option<ProgressState>, StorageError> {
        let key = Self::storage_key(project_id);
        let Some(raw) = self.kv.get(&key)? else {
            return Ok(None);
        };
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                key,
                message: e.to_string(),
            })?;
        Ok(Some(ProgressState::from_value_lenient(&value)))
    }

    /// Fire-and-forget snapshot. Never fails towards the caller.
    pub fn save(&self, state: &ProgressState, project_id: Option<&str>) {
        let key = Self::storage_key(project_id);
        let result = serde_json::to_string(state)
            .map_err(|e| StorageError::Corrupt {
                key: key.clone(),
                message: e.to_string(),
            })
            .and_then(|json| self.kv.set(&key, &json));
        if let Err(e) = result {
            warn!(error = %e, %key, "failed to save progress locally");
        }
    }

    /// Drop the stored snapshot and hand back a fresh default record.
    pub fn reset(&self, project_id: Option<&str>) -> ProgressState {
        let key = Self::storage_key(project_id);
        if let Err(e) = self.kv.remove(&key) {
            warn!(error = %e, %key, "failed to clear stored progress");
        }
        ProgressState::default()
    }
}
