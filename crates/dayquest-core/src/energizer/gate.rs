//! Energy gate and break lifecycle.
//!
//! ```text
//! request_entry --energy >= threshold--> Enter (cost deducted)
//!               --energy <  threshold--> Diverted (gated break opened)
//!
//! open_free / open_recharge ----------> break opened
//! start(id)   -> energizer recorded as used
//! finish(rng) -> reward (gated only), resume pending step or return
//! ```

use rand::Rng;
use tracing::{debug, warn};

use super::reward::roll_reward;
use super::selection::pick_candidates;
use super::EnergySettings;
use crate::clock::datetime_from_ms;
use crate::content::{DayId, EnergizerId, StepId};
use crate::events::Event;
use crate::progress::ProgressStore;
use crate::transition::Screen;

/// A step the learner asked for but could not afford yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub day_id: DayId,
    pub step_id: StepId,
    pub cost: u32,
}

impl PendingTask {
    pub fn screen(&self) -> Screen {
        Screen::Step {
            day_id: self.day_id,
            step_id: self.step_id.clone(),
        }
    }
}

/// Result of asking to enter a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    /// Entered; `cost` was deducted.
    Enter { cost: u32 },
    /// Not enough energy; a gated break is now open.
    Diverted,
    /// Day not unlocked yet.
    Locked,
    /// No such step in that day.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakKind {
    /// Opened by the gate (or an explicit recharge); pays a reward.
    Gated { pending: Option<PendingTask> },
    /// Opened by choice; no energy change.
    Free,
}

#[derive(Debug, Clone)]
struct ActiveBreak {
    kind: BreakKind,
    return_to: Screen,
    energizer: Option<EnergizerId>,
}

/// What happened when a break ended.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakOutcome {
    pub restored: u32,
    pub resumed: Option<PendingTask>,
    /// Where navigation should go next.
    pub next: Screen,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone)]
pub struct EnergizerGate {
    settings: EnergySettings,
    active: Option<ActiveBreak>,
}

impl EnergizerGate {
    pub fn new(settings: EnergySettings) -> Self {
        Self {
            settings,
            active: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &EnergySettings {
        &self.settings
    }

    pub fn is_on_break(&self) -> bool {
        self.active.is_some()
    }

    pub fn break_kind(&self) -> Option<&BreakKind> {
        self.active.as_ref().map(|b| &b.kind)
    }

    pub fn pending(&self) -> Option<&PendingTask> {
        match self.active.as_ref().map(|b| &b.kind) {
            Some(BreakKind::Gated { pending }) => pending.as_ref(),
            _ => None,
        }
    }

    pub fn return_to(&self) -> Option<&Screen> {
        self.active.as_ref().map(|b| &b.return_to)
    }

    pub fn current_energizer(&self) -> Option<&EnergizerId> {
        self.active.as_ref().and_then(|b| b.energizer.as_ref())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Gate check in front of a step. On success the step cost is deducted;
    /// on a low-energy refusal a gated break is opened that remembers the
    /// step and `current`.
    pub fn request_entry(
        &mut self,
        store: &mut ProgressStore,
        day_id: DayId,
        step_id: &str,
        current: &Screen,
        now_ms: u64,
    ) -> (EntryDecision, Vec<Event>) {
        let Some(cost) = store.catalog().step(day_id, step_id).map(|s| s.cost) else {
            return (EntryDecision::Unknown, Vec::new());
        };
        if !store.is_day_unlocked(day_id) {
            debug!(day_id, step_id, "entry refused: day locked");
            return (EntryDecision::Locked, Vec::new());
        }

        let at = datetime_from_ms(now_ms);
        if !store.can_enter_step(cost, self.settings.low_threshold) {
            let energy = store.state().energy;
            debug!(day_id, step_id, energy, "entry diverted to energizer");
            self.active = Some(ActiveBreak {
                kind: BreakKind::Gated {
                    pending: Some(PendingTask {
                        day_id,
                        step_id: step_id.to_string(),
                        cost,
                    }),
                },
                return_to: current.clone(),
                energizer: None,
            });
            return (
                EntryDecision::Diverted,
                vec![Event::EntryDiverted {
                    day_id,
                    step_id: step_id.to_string(),
                    energy,
                    at,
                }],
            );
        }

        let mut events = store.spend_energy(cost);
        events.push(Event::StepEntered {
            day_id,
            step_id: step_id.to_string(),
            cost,
            at,
        });
        (EntryDecision::Enter { cost }, events)
    }

    /// Break taken by choice: no reward, returns to `current`.
    pub fn open_free(&mut self, current: &Screen) {
        self.open(BreakKind::Free, current);
    }

    /// Gated break with no pending step: pays a reward, returns to `current`.
    pub fn open_recharge(&mut self, current: &Screen) {
        self.open(BreakKind::Gated { pending: None }, current);
    }

    /// Candidates for the selection screen.
    pub fn offer<R: Rng + ?Sized>(
        &self,
        store: &ProgressStore,
        rng: &mut R,
        now_ms: u64,
    ) -> (Vec<EnergizerId>, Vec<Event>) {
        let candidates = pick_candidates(
            store.catalog(),
            &store.state().used_energizers,
            self.settings.candidates,
            rng,
        );
        let event = Event::EnergizersOffered {
            candidates: candidates.clone(),
            at: datetime_from_ms(now_ms),
        };
        (candidates, vec![event])
    }

    /// Begin an energizer. Unknown ids are ignored. Starting outside a break
    /// opens a free one that returns to `current`.
    pub fn start(
        &mut self,
        store: &mut ProgressStore,
        energizer_id: &str,
        current: &Screen,
        now_ms: u64,
    ) -> Vec<Event> {
        if store.catalog().energizer(energizer_id).is_none() {
            warn!(energizer_id, "unknown energizer");
            return Vec::new();
        }
        let active = self.active.get_or_insert_with(|| ActiveBreak {
            kind: BreakKind::Free,
            return_to: current.clone(),
            energizer: None,
        });
        active.energizer = Some(energizer_id.to_string());
        store.record_energizer_used(energizer_id);
        vec![Event::EnergizerStarted {
            energizer_id: energizer_id.to_string(),
            at: datetime_from_ms(now_ms),
        }]
    }

    /// End the current break. `None` when no break is open.
    pub fn finish<R: Rng + ?Sized>(
        &mut self,
        store: &mut ProgressStore,
        rng: &mut R,
        now_ms: u64,
    ) -> Option<BreakOutcome> {
        let active = self.active.take()?;
        let mut events = Vec::new();
        let mut restored = 0;
        let mut resumed = None;
        let mut next = active.return_to;

        if let BreakKind::Gated { pending } = active.kind {
            let reward = roll_reward(&self.settings, rng);
            let before = store.state().energy;
            events.extend(store.restore_energy(reward));
            restored = store.state().energy - before;
            if let Some(task) = pending {
                events.extend(store.spend_energy(task.cost));
                events.push(Event::StepEntered {
                    day_id: task.day_id,
                    step_id: task.step_id.clone(),
                    cost: task.cost,
                    at: datetime_from_ms(now_ms),
                });
                next = task.screen();
                resumed = Some(task);
            }
        }

        debug!(restored, resumed = resumed.is_some(), "energizer break finished");
        events.push(Event::EnergizerFinished {
            energizer_id: active.energizer,
            restored,
            at: datetime_from_ms(now_ms),
        });
        Some(BreakOutcome {
            restored,
            resumed,
            next,
            events,
        })
    }

    /// Abandon the current break without reward.
    pub fn cancel(&mut self) -> Option<Screen> {
        self.active.take().map(|b| b.return_to)
    }

    fn open(&mut self, kind: BreakKind, current: &Screen) {
        if self.active.is_some() {
            debug!("replacing open energizer break");
        }
        self.active = Some(ActiveBreak {
            kind,
            return_to: current.clone(),
            energizer: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::content::Catalog;
    use crate::progress::ProgressState;
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;

    fn store_with_energy(energy: u32) -> ProgressStore {
        ProgressStore::new(
            ProgressState {
                energy,
                ..ProgressState::default()
            },
            Arc::new(Catalog::builtin().unwrap()),
        )
    }

    fn rng() -> Mcg128Xsl64 {
        Mcg128Xsl64::seed_from_u64(2024)
    }

    #[test]
    fn enough_energy_enters_and_deducts() {
        let mut store = store_with_energy(50);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        let (decision, events) = gate.request_entry(&mut store, 1, "d1-explore", &Screen::Map, 0);
        assert_eq!(decision, EntryDecision::Enter { cost: 15 });
        assert_eq!(store.state().energy, 35);
        assert!(!gate.is_on_break());
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::StepEntered { cost: 15, .. })));
    }

    #[test]
    fn low_energy_diverts_without_deduction() {
        let mut store = store_with_energy(10);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        let (decision, _) = gate.request_entry(&mut store, 1, "d1-warmup", &Screen::Map, 0);
        assert_eq!(decision, EntryDecision::Diverted);
        assert_eq!(store.state().energy, 10);
        assert_eq!(gate.pending().map(|p| p.step_id.as_str()), Some("d1-warmup"));
        assert_eq!(gate.return_to(), Some(&Screen::Map));
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut store = store_with_energy(20);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        let (decision, _) = gate.request_entry(&mut store, 1, "d1-warmup", &Screen::Map, 0);
        assert_eq!(decision, EntryDecision::Enter { cost: 10 });
        assert_eq!(store.state().energy, 10);
    }

    #[test]
    fn locked_and_unknown_steps() {
        let mut store = store_with_energy(100);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        let (locked, _) = gate.request_entry(&mut store, 2, "d2-plan", &Screen::Map, 0);
        assert_eq!(locked, EntryDecision::Locked);
        let (unknown, _) = gate.request_entry(&mut store, 1, "d2-plan", &Screen::Map, 0);
        assert_eq!(unknown, EntryDecision::Unknown);
        assert_eq!(store.state().energy, 100);
    }

    #[test]
    fn gated_break_rewards_then_resumes_pending_step() {
        let mut store = store_with_energy(5);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        gate.request_entry(&mut store, 1, "d1-explore", &Screen::Map, 0);

        gate.start(&mut store, "dance", &Screen::EnergizerSelect, 10);
        assert_eq!(store.state().used_energizers, vec!["dance".to_string()]);

        let outcome = gate.finish(&mut store, &mut rng(), 20).unwrap();
        assert!((20..=40).contains(&outcome.restored));
        assert_eq!(store.state().energy, 5 + outcome.restored - 15);
        assert_eq!(
            outcome.next,
            Screen::Step {
                day_id: 1,
                step_id: "d1-explore".into()
            }
        );
        assert!(outcome.resumed.is_some());
        assert!(!gate.is_on_break());
    }

    #[test]
    fn recharge_without_pending_returns_to_prior_screen() {
        let mut store = store_with_energy(30);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        let prior = Screen::DayIntro { day_id: 1 };
        gate.open_recharge(&prior);
        let outcome = gate.finish(&mut store, &mut rng(), 0).unwrap();
        assert_eq!(outcome.next, prior);
        assert_eq!(store.state().energy, 30 + outcome.restored);
        assert!(outcome.resumed.is_none());
    }

    #[test]
    fn reward_is_capped_at_max_energy() {
        let mut store = store_with_energy(95);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        gate.open_recharge(&Screen::Map);
        let outcome = gate.finish(&mut store, &mut rng(), 0).unwrap();
        assert_eq!(store.state().energy, 100);
        assert_eq!(outcome.restored, 5);
    }

    #[test]
    fn free_break_changes_no_energy() {
        let mut store = store_with_energy(40);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        gate.open_free(&Screen::Map);
        gate.start(&mut store, "stretch", &Screen::EnergizerSelect, 0);
        let outcome = gate.finish(&mut store, &mut rng(), 0).unwrap();
        assert_eq!(outcome.restored, 0);
        assert_eq!(outcome.next, Screen::Map);
        assert_eq!(store.state().energy, 40);
        assert!(matches!(
            outcome.events.last(),
            Some(Event::EnergizerFinished { energizer_id: Some(id), restored: 0, .. }) if id == "stretch"
        ));
    }

    #[test]
    fn finish_without_break_is_none() {
        let mut store = store_with_energy(40);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        assert!(gate.finish(&mut store, &mut rng(), 0).is_none());
    }

    #[test]
    fn unknown_energizer_is_ignored() {
        let mut store = store_with_energy(40);
        let mut gate = EnergizerGate::new(EnergySettings::default());
        assert!(gate.start(&mut store, "juggle", &Screen::Map, 0).is_empty());
        assert!(store.state().used_energizers.is_empty());
        assert!(!gate.is_on_break());
    }

    #[test]
    fn offer_prefers_unused() {
        let mut store = store_with_energy(40);
        store.record_energizer_used("stretch");
        store.record_energizer_used("shake");
        let gate = EnergizerGate::new(EnergySettings::default());
        let (mut offered, events) = gate.offer(&store, &mut rng(), 0);
        offered.sort();
        assert_eq!(offered, vec!["breathe", "dance", "mirror"]);
        assert_eq!(events.len(), 1);
    }
}
