//! Remote synchronization layer.
//!
//! Mirrors the progress record to a shared remote record keyed by a group
//! key. Inbound snapshots are merged field by field (keeping device-local
//! fields), outbound pushes are suppressed while they would only echo a
//! merge back, and save health is surfaced as a decaying [`SaveStatus`].

pub mod device_id;
mod engine;
mod remote;
mod types;

pub use device_id::{get_or_create_device_id, get_or_create_device_id_at, new_device_id, DeviceIdError};
pub use engine::SyncEngine;
pub use remote::{validate_group_key, DirRemote, MemoryRemote, RemoteStore, SnapshotSink, Subscription};
pub use types::{
    EchoPolicy, Inbound, SaveHealth, SaveStatus, SyncError, SyncSettings, SyncStamp, STAMP_FIELD,
};
