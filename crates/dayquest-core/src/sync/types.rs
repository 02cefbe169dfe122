//! Core types for remote synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field carrying the sync stamp inside a remote record.
pub const STAMP_FIELD: &str = "_sync";

/// User-facing save health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    /// `saved` and `error` revert to `idle` on their own.
    pub fn is_transient(self) -> bool {
        matches!(self, SaveStatus::Saved | SaveStatus::Error)
    }
}

/// How the engine keeps its own pushes from looping back as local edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoPolicy {
    /// After every inbound merge, skip outbound pushes for a fixed window.
    #[default]
    Window,
    /// Never skip local pushes; drop inbound snapshots that carry this
    /// device's stamp with a version it already pushed.
    Versioned,
}

/// Tunables for a [`SyncEngine`](super::SyncEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub echo_policy: EchoPolicy,
    pub echo_window_ms: u64,
    pub status_decay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            echo_policy: EchoPolicy::Window,
            echo_window_ms: 100,
            status_decay_ms: 3000,
        }
    }
}

/// Origin tag attached to every outbound record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStamp {
    pub device_id: String,
    /// Monotonic per engine instance.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl SyncStamp {
    /// Extract the stamp of a remote record, if it has a well-formed one.
    pub fn from_record(record: &serde_json::Value) -> Option<Self> {
        record
            .get(STAMP_FIELD)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Delivery on a subscription channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Current remote record; `None` means the group has no record yet.
    Snapshot(Option<serde_json::Value>),
    /// The subscription reported an error. It may keep delivering.
    Failed(String),
}

/// Save status plus the deadline at which a transient status decays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveHealth {
    status: SaveStatus,
    decay_at_ms: Option<u64>,
}

impl SaveHealth {
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    /// Replace the status; a new status always supersedes a pending decay.
    pub fn set(&mut self, status: SaveStatus, now_ms: u64, decay_ms: u64) {
        self.status = status;
        self.decay_at_ms = status
            .is_transient()
            .then(|| now_ms.saturating_add(decay_ms));
    }

    /// Returns the new status when a pending decay fired.
    pub fn tick(&mut self, now_ms: u64) -> Option<SaveStatus> {
        let due = self.decay_at_ms?;
        if now_ms < due {
            return None;
        }
        self.decay_at_ms = None;
        self.status = SaveStatus::Idle;
        Some(SaveStatus::Idle)
    }
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    #[error("Not connected to a group")]
    NotConnected,

    #[error("Invalid group key: {0:?}")]
    InvalidGroupKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
