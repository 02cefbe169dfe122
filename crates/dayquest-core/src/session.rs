//! Session: the owner of every subsystem for one learner on one device.
//!
//! A session is built explicitly with [`Session::init`] and torn down with
//! [`Session::teardown`]. Intents mutate the progress store synchronously;
//! every effective change is snapshotted locally and, while a group is
//! joined, queued for a remote push. [`Session::tick`] drives fades, pushes,
//! inbound merges and status decay.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use crate::clock::datetime_from_ms;
use crate::content::{Catalog, DayId, EnergizerId};
use crate::energizer::{BreakOutcome, EnergizerGate, EnergySettings, EntryDecision};
use crate::events::Event;
use crate::progress::{ProgressState, ProgressStore};
use crate::storage::{Config, LocalPersistence};
use crate::sync::{RemoteStore, SaveStatus, SyncEngine, SyncError, SyncSettings};
use crate::transition::{Effect, Screen, SoundCue, TransitionController, TransitionPhase};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub project_id: Option<String>,
    /// Origin tag stamped on outbound pushes.
    pub device_id: String,
    pub fade_ms: u64,
    pub sync: SyncSettings,
    pub energy: EnergySettings,
}

impl SessionSettings {
    pub fn from_config(config: &Config, device_id: impl Into<String>) -> Self {
        Self {
            project_id: config.project_id.clone(),
            device_id: device_id.into(),
            fade_ms: config.timing.fade_ms,
            sync: config.sync_settings(),
            energy: config.energy_settings(),
        }
    }
}

pub struct Session {
    settings: SessionSettings,
    store: ProgressStore,
    persistence: LocalPersistence,
    transitions: TransitionController,
    gate: EnergizerGate,
    sync: Option<SyncEngine>,
    /// Store revision last written to local persistence.
    committed_revision: u64,
    events: Vec<Event>,
}

impl Session {
    /// Load the stored record (or defaults) and open on the intro or the map.
    pub fn init(
        catalog: Arc<Catalog>,
        persistence: LocalPersistence,
        settings: SessionSettings,
    ) -> Self {
        let state = persistence.load(settings.project_id.as_deref());
        let initial = if state.intro_completed {
            Screen::Map
        } else {
            Screen::Intro
        };
        info!(project_id = ?settings.project_id, screen = ?initial, "session started");
        let store = ProgressStore::new(state, catalog);
        let committed_revision = store.revision();
        Self {
            transitions: TransitionController::new(initial, settings.fade_ms),
            gate: EnergizerGate::new(settings.energy),
            settings,
            store,
            persistence,
            sync: None,
            committed_revision,
            events: Vec::new(),
        }
    }

    /// Leave any group. The session stays usable offline afterwards.
    pub fn teardown(&mut self) {
        self.leave_group();
        info!("session torn down");
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &ProgressState {
        self.store.state()
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        self.store.catalog()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn screen(&self) -> &Screen {
        self.transitions.screen()
    }

    pub fn phase(&self) -> TransitionPhase {
        self.transitions.phase()
    }

    pub fn opacity(&self) -> f32 {
        self.transitions.opacity()
    }

    pub fn gate(&self) -> &EnergizerGate {
        &self.gate
    }

    pub fn save_status(&self) -> SaveStatus {
        self.sync
            .as_ref()
            .map(SyncEngine::save_status)
            .unwrap_or_default()
    }

    pub fn group_key(&self) -> Option<&str> {
        self.sync.as_ref().map(SyncEngine::group_key)
    }

    pub fn sync(&self) -> Option<&SyncEngine> {
        self.sync.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Group membership ─────────────────────────────────────────────

    /// Follow the shared record of `group_key`, replacing any current group.
    pub fn join_group(
        &mut self,
        remote: Arc<dyn RemoteStore>,
        group_key: &str,
    ) -> Result<(), SyncError> {
        let engine = SyncEngine::connect(
            remote,
            group_key,
            &self.settings.device_id,
            self.settings.sync,
        )?;
        self.leave_group();
        self.sync = Some(engine);
        Ok(())
    }

    pub fn leave_group(&mut self) {
        if let Some(mut engine) = self.sync.take() {
            engine.teardown();
            self.events.extend(engine.take_events());
        }
    }

    // ── Progress intents ─────────────────────────────────────────────

    pub fn complete_step(&mut self, day_id: DayId, step_id: &str, now_ms: u64) {
        let events = self.store.complete_step(step_id, day_id);
        self.apply(events, now_ms);
    }

    pub fn uncomplete_step(&mut self, step_id: &str, now_ms: u64) {
        let events = self.store.uncomplete_step(step_id);
        self.apply(events, now_ms);
    }

    pub fn reset_day(&mut self, day_id: DayId, now_ms: u64) {
        let events = self.store.reset_day(day_id);
        self.apply(events, now_ms);
    }

    pub fn mark_day_intro_seen(&mut self, day_id: DayId, now_ms: u64) {
        let events = self.store.mark_day_intro_seen(day_id);
        self.apply(events, now_ms);
    }

    pub fn complete_intro(&mut self, now_ms: u64) {
        let events = self.store.complete_intro();
        self.apply(events, now_ms);
    }

    /// Device-local: persisted, never pushed.
    pub fn set_volume(&mut self, volume: f32) {
        self.store.set_volume(volume);
        if self.store.revision() != self.committed_revision {
            self.save_local();
        }
    }

    /// Wipe this project's progress back to the default record.
    pub fn reset_all(&mut self, now_ms: u64) {
        let fresh = self.persistence.reset(self.settings.project_id.as_deref());
        self.store.replace(fresh);
        self.gate.cancel();
        self.apply(
            vec![Event::ProgressReset {
                at: datetime_from_ms(now_ms),
            }],
            now_ms,
        );
    }

    // ── Navigation & energizers ──────────────────────────────────────

    pub fn goto(&mut self, next: Screen, effect: Option<Effect>, now_ms: u64) {
        let events = self.transitions.goto(next, effect, now_ms);
        self.events.extend(events);
    }

    /// Try to open a step. Low energy diverts to energizer selection.
    pub fn enter_step(&mut self, day_id: DayId, step_id: &str, now_ms: u64) -> EntryDecision {
        let current = self.screen().clone();
        let (decision, events) =
            self.gate
                .request_entry(&mut self.store, day_id, step_id, &current, now_ms);
        self.apply(events, now_ms);
        match decision {
            EntryDecision::Enter { .. } => self.goto(
                Screen::Step {
                    day_id,
                    step_id: step_id.to_string(),
                },
                Some(Effect::Sound(SoundCue::Whoosh)),
                now_ms,
            ),
            EntryDecision::Diverted => self.goto(Screen::EnergizerSelect, None, now_ms),
            EntryDecision::Locked | EntryDecision::Unknown => {
                debug!(day_id, step_id, ?decision, "step entry refused");
            }
        }
        decision
    }

    pub fn open_free_energizer(&mut self, now_ms: u64) {
        let current = self.screen().clone();
        self.gate.open_free(&current);
        self.goto(Screen::EnergizerSelect, None, now_ms);
    }

    pub fn open_recharge(&mut self, now_ms: u64) {
        let current = self.screen().clone();
        self.gate.open_recharge(&current);
        self.goto(Screen::EnergizerSelect, None, now_ms);
    }

    pub fn offer_energizers<R: Rng + ?Sized>(&mut self, rng: &mut R, now_ms: u64) -> Vec<EnergizerId> {
        let (candidates, events) = self.gate.offer(&self.store, rng, now_ms);
        self.events.extend(events);
        candidates
    }

    /// Returns false for an unknown energizer.
    pub fn start_energizer(&mut self, energizer_id: &str, now_ms: u64) -> bool {
        let current = self.screen().clone();
        let events = self
            .gate
            .start(&mut self.store, energizer_id, &current, now_ms);
        if events.is_empty() {
            return false;
        }
        self.apply(events, now_ms);
        self.goto(
            Screen::Energizer {
                energizer_id: energizer_id.to_string(),
            },
            None,
            now_ms,
        );
        true
    }

    pub fn finish_energizer<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now_ms: u64,
    ) -> Option<BreakOutcome> {
        let outcome = self.gate.finish(&mut self.store, rng, now_ms)?;
        self.apply(outcome.events.clone(), now_ms);
        let effect = (outcome.restored > 0).then_some(Effect::Sound(SoundCue::Reward));
        self.goto(outcome.next.clone(), effect, now_ms);
        Some(outcome)
    }

    // ── Driving ──────────────────────────────────────────────────────

    /// Advance fades, run queued pushes, fold inbound snapshots and decay
    /// the save status.
    pub fn tick(&mut self, now_ms: u64) {
        let events = self.transitions.tick(now_ms);
        self.events.extend(events);

        let Some(engine) = self.sync.as_mut() else {
            return;
        };
        engine.dispatch(self.store.state(), now_ms);
        if let Some(merged) = engine.poll_inbound(self.store.state(), now_ms) {
            // Merged records are persisted but never pushed back.
            self.store.replace(merged);
            self.persistence
                .save(self.store.state(), self.settings.project_id.as_deref());
            self.committed_revision = self.store.revision();
        }
        engine.tick(now_ms);
        self.events.extend(engine.take_events());
    }

    /// Push the current record immediately.
    ///
    /// # Errors
    /// [`SyncError::NotConnected`] without a group, otherwise the push error.
    pub fn force_save(&mut self, now_ms: u64) -> Result<(), SyncError> {
        let engine = self.sync.as_mut().ok_or(SyncError::NotConnected)?;
        let result = engine.force_save(self.store.state(), now_ms);
        self.events.extend(engine.take_events());
        result
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply(&mut self, events: Vec<Event>, now_ms: u64) {
        self.events.extend(events);
        if self.store.revision() == self.committed_revision {
            return;
        }
        self.save_local();
        if let Some(engine) = self.sync.as_mut() {
            engine.on_local_change(now_ms);
            self.events.extend(engine.take_events());
        }
    }

    fn save_local(&mut self) {
        self.persistence
            .save(self.store.state(), self.settings.project_id.as_deref());
        self.committed_revision = self.store.revision();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.leave_group();
    }
}
