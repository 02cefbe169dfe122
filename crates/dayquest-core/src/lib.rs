//! # Dayquest Core Library
//!
//! State synchronization and transition engine for a multi-day guided
//! activity. A learner's progress (energy economy, completed steps, unlocked
//! days) lives in one record that is snapshotted locally and mirrored to a
//! shared remote record so a facilitator's device and a learner's device see
//! the same progress.
//!
//! ## Architecture
//!
//! - **Progress Store**: the canonical [`ProgressState`] and the operations
//!   that mutate it. No I/O.
//! - **Local Persistence**: key-value snapshots per project id (SQLite or
//!   in-memory).
//! - **Sync Engine**: a wall-clock state machine that merges inbound remote
//!   snapshots, suppresses echo pushes and tracks save health.
//! - **Transition Controller**: the fade-out / swap / fade-in machine that
//!   decides when a screen change becomes visible.
//! - **Energizers**: the energy gate, break-activity selection and rewards.
//!
//! Nothing here spawns threads. The host owns a [`Session`] and calls
//! [`Session::tick`] periodically, the same way a render loop would.

pub mod clock;
pub mod content;
pub mod energizer;
pub mod error;
pub mod events;
pub mod progress;
pub mod session;
pub mod storage;
pub mod sync;
pub mod transition;

pub use content::{Catalog, DayDef, DayId, EnergizerDef, EnergizerId, StepDef, StepId};
pub use energizer::{BreakOutcome, EnergizerGate, EnergySettings, EntryDecision, PendingTask};
pub use error::{CatalogError, ConfigError, CoreError, StorageError};
pub use events::Event;
pub use progress::{ProgressState, ProgressStore, MAX_ENERGY};
pub use session::{Session, SessionSettings};
pub use storage::{Config, KvStore, LocalPersistence, MemoryKv, SqliteKv};
pub use sync::{
    DirRemote, EchoPolicy, MemoryRemote, RemoteStore, SaveStatus, SyncEngine, SyncError,
    SyncSettings,
};
pub use transition::{Effect, Screen, SoundCue, TransitionController, TransitionPhase};
