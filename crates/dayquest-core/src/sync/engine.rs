//! Sync engine for one group's shared record.
//!
//! Like the transition controller, the engine is a wall-clock state machine
//! with no internal threads. The owner drives it:
//!
//! ```text
//! local change  -> on_local_change(now)   (queues a push unless suppressed)
//! every frame   -> dispatch(state, now)   (runs queued pushes)
//!               -> poll_inbound(state, now) -> Option<merged state>
//!               -> tick(now)              (status decay, echo window expiry)
//! ```
//!
//! Inbound snapshots arrive over a channel fed by the [`RemoteStore`]
//! subscription, so the store may deliver from any thread.

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, warn};

use super::remote::{validate_group_key, RemoteStore, Subscription};
use super::types::{
    EchoPolicy, Inbound, SaveHealth, SaveStatus, SyncError, SyncSettings, SyncStamp, STAMP_FIELD,
};
use crate::clock::datetime_from_ms;
use crate::events::Event;
use crate::progress::ProgressState;

pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    group_key: String,
    device_id: String,
    settings: SyncSettings,
    inbound: UnboundedReceiver<Inbound>,
    subscription: Option<Subscription>,
    health: SaveHealth,
    /// Outbound pushes are skipped while `now < suppress_until_ms`.
    suppress_until_ms: Option<u64>,
    last_pushed_version: u64,
    /// A foreign snapshot was merged after our latest push, so an echo of
    /// that push is newer than local state and must be merged, not dropped.
    foreign_after_push: bool,
    queued_pushes: usize,
    torn_down: bool,
    events: Vec<Event>,
}

impl SyncEngine {
    /// Open a subscription for `group_key`.
    ///
    /// A failing subscription is logged, not returned: the engine still
    /// pushes, and the local copy stays authoritative.
    ///
    /// # Errors
    /// Returns an error only for an invalid group key.
    pub fn connect(
        remote: Arc<dyn RemoteStore>,
        group_key: &str,
        device_id: &str,
        settings: SyncSettings,
    ) -> Result<Self, SyncError> {
        validate_group_key(group_key)?;
        let (tx, rx) = unbounded_channel();
        let subscription = match remote.subscribe(group_key, tx) {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!(group_key, error = %e, "remote subscription failed; continuing local-only");
                None
            }
        };
        info!(group_key, device_id, policy = ?settings.echo_policy, "sync engine connected");
        Ok(Self {
            remote,
            group_key: group_key.to_string(),
            device_id: device_id.to_string(),
            settings,
            inbound: rx,
            subscription,
            health: SaveHealth::default(),
            suppress_until_ms: None,
            last_pushed_version: 0,
            foreign_after_push: false,
            queued_pushes: 0,
            torn_down: false,
            events: Vec::new(),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    pub fn save_status(&self) -> SaveStatus {
        self.health.status()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some() && !self.torn_down
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Whether an outbound push issued at `now_ms` would be skipped.
    pub fn is_suppressing(&self, now_ms: u64) -> bool {
        self.settings.echo_policy == EchoPolicy::Window
            && self.suppress_until_ms.is_some_and(|until| now_ms < until)
    }

    pub fn queued_pushes(&self) -> usize {
        self.queued_pushes
    }

    pub fn last_pushed_version(&self) -> u64 {
        self.last_pushed_version
    }

    /// When the shared record last changed.
    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.remote.last_updated(&self.group_key)
    }

    /// Drain status and merge events produced since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Record a local change. Returns whether a push was queued.
    pub fn on_local_change(&mut self, now_ms: u64) -> bool {
        if self.torn_down {
            return false;
        }
        if self.is_suppressing(now_ms) {
            debug!(group_key = %self.group_key, "local change inside echo window; push skipped");
            return false;
        }
        self.queued_pushes += 1;
        self.set_status(SaveStatus::Saving, now_ms);
        true
    }

    /// Run queued pushes. Each carries `state` as it is now, not as it was
    /// when the change was recorded.
    pub fn dispatch(&mut self, state: &ProgressState, now_ms: u64) {
        if self.torn_down {
            self.queued_pushes = 0;
            return;
        }
        while self.queued_pushes > 0 {
            self.queued_pushes -= 1;
            match self.push_state(state, now_ms) {
                Ok(()) => self.set_status(SaveStatus::Saved, now_ms),
                Err(e) => {
                    warn!(group_key = %self.group_key, error = %e, "push failed");
                    self.set_status(SaveStatus::Error, now_ms);
                }
            }
        }
    }

    /// Push immediately, bypassing the echo window, and report the outcome.
    pub fn force_save(&mut self, state: &ProgressState, now_ms: u64) -> Result<(), SyncError> {
        if self.torn_down {
            return Err(SyncError::NotConnected);
        }
        let result = self.push_state(state, now_ms);
        match &result {
            Ok(()) => self.set_status(SaveStatus::Saved, now_ms),
            Err(e) => {
                warn!(group_key = %self.group_key, error = %e, "forced save failed");
                self.set_status(SaveStatus::Error, now_ms);
            }
        }
        result
    }

    /// Drain the subscription and fold every snapshot into `local`.
    ///
    /// Snapshots arrive in remote write order. An echo of our own push is
    /// dropped unless a foreign snapshot was merged after that push; then the
    /// echo is the latest remote value and is merged like any other record.
    ///
    /// Returns the merged record when at least one snapshot was applied.
    pub fn poll_inbound(&mut self, local: &ProgressState, now_ms: u64) -> Option<ProgressState> {
        if self.torn_down {
            return None;
        }
        let mut merged: Option<ProgressState> = None;
        while let Ok(inbound) = self.inbound.try_recv() {
            match inbound {
                Inbound::Snapshot(None) => {
                    debug!(group_key = %self.group_key, "group has no remote record yet");
                }
                Inbound::Snapshot(Some(record)) => {
                    let own = self.is_own_echo(&record);
                    if own && !self.foreign_after_push {
                        debug!(group_key = %self.group_key, "dropping echo of own push");
                        continue;
                    }
                    // After merging our own echo, local and remote agree again.
                    self.foreign_after_push = !own;
                    let base = merged.as_ref().unwrap_or(local);
                    merged = Some(base.merged_with_remote(&record));
                    if self.settings.echo_policy == EchoPolicy::Window {
                        self.suppress_until_ms =
                            Some(now_ms.saturating_add(self.settings.echo_window_ms));
                    }
                    self.events.push(Event::RemoteMerged {
                        group_key: self.group_key.clone(),
                        at: datetime_from_ms(now_ms),
                    });
                }
                Inbound::Failed(message) => {
                    warn!(group_key = %self.group_key, %message, "remote subscription error");
                }
            }
        }
        merged
    }

    /// Fire due timers. Safe to call after teardown.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(status) = self.health.tick(now_ms) {
            self.events.push(Event::SaveStatusChanged {
                status,
                at: datetime_from_ms(now_ms),
            });
        }
        if self.suppress_until_ms.is_some_and(|until| now_ms >= until) {
            self.suppress_until_ms = None;
        }
    }

    /// Cancel the subscription. No pushes are attempted afterwards.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(mut sub) = self.subscription.take() {
            sub.cancel();
        }
        self.queued_pushes = 0;
        self.torn_down = true;
        info!(group_key = %self.group_key, "sync engine torn down");
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn push_state(&mut self, state: &ProgressState, now_ms: u64) -> Result<(), SyncError> {
        self.last_pushed_version += 1;
        let stamp = SyncStamp {
            device_id: self.device_id.clone(),
            version: self.last_pushed_version,
            updated_at: datetime_from_ms(now_ms),
        };
        let mut record = serde_json::to_value(state)?;
        if let Some(obj) = record.as_object_mut() {
            obj.insert(STAMP_FIELD.to_string(), serde_json::to_value(&stamp)?);
        }
        self.remote.push(&self.group_key, &record)?;
        self.foreign_after_push = false;
        debug!(group_key = %self.group_key, version = stamp.version, "pushed state");
        Ok(())
    }

    fn is_own_echo(&self, record: &serde_json::Value) -> bool {
        SyncStamp::from_record(record).is_some_and(|stamp| {
            stamp.device_id == self.device_id && stamp.version <= self.last_pushed_version
        })
    }

    fn set_status(&mut self, status: SaveStatus, now_ms: u64) {
        if self.health.status() == status && !status.is_transient() {
            return;
        }
        self.health.set(status, now_ms, self.settings.status_decay_ms);
        self.events.push(Event::SaveStatusChanged {
            status,
            at: datetime_from_ms(now_ms),
        });
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
