//! Remote store contract and the bundled implementations.
//!
//! The transport behind a real deployment is someone else's concern; the
//! engine only needs subscribe / push / last-updated. Two stores ship here:
//! [`MemoryRemote`] shares records between engines in one process, and
//! [`DirRemote`] keeps one JSON file per group in a shared directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::types::{Inbound, SyncError};

/// Where a subscription delivers snapshots.
pub type SnapshotSink = UnboundedSender<Inbound>;

/// Every shared store implements this trait.
pub trait RemoteStore: Send + Sync {
    /// Start delivering the group's record to `sink`. The current record (or
    /// `None` for a new group) is delivered first.
    fn subscribe(&self, group_key: &str, sink: SnapshotSink) -> Result<Subscription, SyncError>;

    /// Replace the group's record.
    fn push(&self, group_key: &str, record: &serde_json::Value) -> Result<(), SyncError>;

    /// When the group's record last changed, `None` if it has none.
    fn last_updated(&self, group_key: &str) -> Result<Option<DateTime<Utc>>, SyncError>;
}

/// Handle to a live subscription. Cancelled explicitly or on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Group keys become path components and map keys; keep them tame.
pub fn validate_group_key(group_key: &str) -> Result<(), SyncError> {
    let ok = !group_key.is_empty()
        && group_key.len() <= 64
        && group_key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(SyncError::InvalidGroupKey(group_key.to_string()))
    }
}

// ── In-memory store ──────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    records: HashMap<String, (serde_json::Value, DateTime<Utc>)>,
    subscribers: HashMap<String, Vec<(u64, SnapshotSink)>>,
    next_subscriber: u64,
    fail_pushes: bool,
    fail_subscribe: bool,
}

/// Shared in-process store. Clones share the same records, so two sessions
/// holding clones behave like two devices on one group.
///
/// Like hosted realtime databases, a push is delivered to every subscriber
/// of the group, the pushing device included.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, SyncError> {
        self.inner
            .lock()
            .map_err(|_| SyncError::Remote("memory remote poisoned".into()))
    }

    /// Make subsequent pushes fail (simulates going offline).
    pub fn set_fail_pushes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_pushes = fail;
        }
    }

    /// Make subsequent subscribe calls fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_subscribe = fail;
        }
    }

    /// Current record of a group.
    pub fn record(&self, group_key: &str) -> Option<serde_json::Value> {
        let inner = self.inner.lock().ok()?;
        inner.records.get(group_key).map(|(v, _)| v.clone())
    }

    pub fn subscriber_count(&self, group_key: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.subscribers.get(group_key).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Deliver an error to every subscriber of a group.
    pub fn broadcast_error(&self, group_key: &str, message: &str) {
        if let Ok(inner) = self.inner.lock() {
            for (_, sink) in inner.subscribers.get(group_key).into_iter().flatten() {
                let _ = sink.send(Inbound::Failed(message.to_string()));
            }
        }
    }
}

impl RemoteStore for MemoryRemote {
    fn subscribe(&self, group_key: &str, sink: SnapshotSink) -> Result<Subscription, SyncError> {
        validate_group_key(group_key)?;
        let mut inner = self.lock()?;
        if inner.fail_subscribe {
            return Err(SyncError::Unreachable("subscribe refused".into()));
        }
        let current = inner.records.get(group_key).map(|(v, _)| v.clone());
        let _ = sink.send(Inbound::Snapshot(current));

        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner
            .subscribers
            .entry(group_key.to_string())
            .or_default()
            .push((id, sink));

        let shared = Arc::clone(&self.inner);
        let group = group_key.to_string();
        Ok(Subscription::new(move || {
            if let Ok(mut inner) = shared.lock() {
                if let Some(subs) = inner.subscribers.get_mut(&group) {
                    subs.retain(|(sub_id, _)| *sub_id != id);
                }
            }
        }))
    }

    fn push(&self, group_key: &str, record: &serde_json::Value) -> Result<(), SyncError> {
        validate_group_key(group_key)?;
        let mut inner = self.lock()?;
        if inner.fail_pushes {
            return Err(SyncError::Unreachable("push refused".into()));
        }
        inner
            .records
            .insert(group_key.to_string(), (record.clone(), Utc::now()));
        if let Some(subs) = inner.subscribers.get_mut(group_key) {
            subs.retain(|(_, sink)| sink.send(Inbound::Snapshot(Some(record.clone()))).is_ok());
        }
        Ok(())
    }

    fn last_updated(&self, group_key: &str) -> Result<Option<DateTime<Utc>>, SyncError> {
        let inner = self.lock()?;
        Ok(inner.records.get(group_key).map(|(_, at)| *at))
    }
}

// ── Directory store ──────────────────────────────────────────────────

/// One `<group>.json` file per group inside a shared directory.
///
/// There is no change notification: a subscription delivers the record as
/// it is at subscribe time. Hosts re-subscribe to pull again.
#[derive(Debug, Clone)]
pub struct DirRemote {
    dir: PathBuf,
}

impl DirRemote {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, group_key: &str) -> Result<PathBuf, SyncError> {
        validate_group_key(group_key)?;
        Ok(self.dir.join(format!("{group_key}.json")))
    }

    fn read_record(&self, group_key: &str) -> Result<Option<serde_json::Value>, SyncError> {
        let path = self.record_path(group_key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RemoteStore for DirRemote {
    fn subscribe(&self, group_key: &str, sink: SnapshotSink) -> Result<Subscription, SyncError> {
        let snapshot = self.read_record(group_key)?;
        debug!(group_key, found = snapshot.is_some(), "directory snapshot read");
        let _ = sink.send(Inbound::Snapshot(snapshot));
        Ok(Subscription::detached())
    }

    fn push(&self, group_key: &str, record: &serde_json::Value) -> Result<(), SyncError> {
        let path = self.record_path(group_key)?;
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename so readers never see a torn file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn last_updated(&self, group_key: &str) -> Result<Option<DateTime<Utc>>, SyncError> {
        let path = self.record_path(group_key)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
