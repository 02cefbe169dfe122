//! Progress store: owns the record and applies every mutation to it.
//!
//! Operations are total. Unknown day or step ids are no-ops that return no
//! events; the caller is expected to have validated them against the
//! catalog already.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::state::{ProgressState, MAX_ENERGY};
use crate::content::{Catalog, DayId};
use crate::events::Event;

pub struct ProgressStore {
    state: ProgressState,
    catalog: Arc<Catalog>,
    /// Bumped on every effective change; lets owners detect "something
    /// changed" without diffing.
    revision: u64,
}

impl ProgressStore {
    pub fn new(state: ProgressState, catalog: Arc<Catalog>) -> Self {
        Self {
            state,
            catalog,
            revision: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_step_complete(&self, step_id: &str) -> bool {
        self.state.completed_steps.contains_key(step_id)
    }

    pub fn is_day_complete(&self, day_id: DayId) -> bool {
        self.state.completed_days.contains(&day_id)
    }

    pub fn is_day_unlocked(&self, day_id: DayId) -> bool {
        day_id <= self.state.current_day
    }

    /// `(completed, total)` steps of a day, `None` for unknown days.
    pub fn day_progress(&self, day_id: DayId) -> Option<(usize, usize)> {
        let day = self.catalog.day(day_id)?;
        let done = day
            .steps
            .iter()
            .filter(|s| self.is_step_complete(&s.id))
            .count();
        Some((done, day.steps.len()))
    }

    /// Gate check: entering is refused while energy is below `threshold`.
    /// The step cost itself is not part of the decision; callers deduct it
    /// after a successful check.
    pub fn can_enter_step(&self, _step_cost: u32, threshold: u32) -> bool {
        self.state.energy >= threshold
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn complete_step(&mut self, step_id: &str, day_id: DayId) -> Vec<Event> {
        let catalog = Arc::clone(&self.catalog);
        let Some(day) = catalog.day(day_id) else {
            return Vec::new();
        };
        if !day.steps.iter().any(|s| s.id == step_id) {
            return Vec::new();
        }

        let mut events = Vec::new();
        if self
            .state
            .completed_steps
            .insert(step_id.to_string(), true)
            .is_none()
        {
            self.bump();
            events.push(Event::StepCompleted {
                day_id,
                step_id: step_id.to_string(),
                at: Utc::now(),
            });
        }

        let all_done = day
            .steps
            .iter()
            .all(|s| self.state.completed_steps.contains_key(&s.id));
        if all_done && !self.state.completed_days.contains(&day_id) {
            self.state.completed_days.push(day_id);
            let mut unlocked_day = None;
            if day_id < catalog.last_day_id() && self.state.current_day < day_id + 1 {
                self.state.current_day = day_id + 1;
                unlocked_day = Some(day_id + 1);
            }
            self.bump();
            debug!(day_id, ?unlocked_day, "day completed");
            events.push(Event::DayCompleted {
                day_id,
                unlocked_day,
                at: Utc::now(),
            });
        }
        events
    }

    /// Removes the completion flag. The owning day stays in
    /// `completed_days`: completion is a one-way ratchet.
    pub fn uncomplete_step(&mut self, step_id: &str) -> Vec<Event> {
        if self.state.completed_steps.remove(step_id).is_none() {
            return Vec::new();
        }
        self.bump();
        vec![Event::StepUncompleted {
            step_id: step_id.to_string(),
            at: Utc::now(),
        }]
    }

    /// Clears a day's steps, its completion and its intro flag.
    /// `current_day` is left alone. A day with nothing to clear is a no-op.
    pub fn reset_day(&mut self, day_id: DayId) -> Vec<Event> {
        let catalog = Arc::clone(&self.catalog);
        let Some(day) = catalog.day(day_id) else {
            return Vec::new();
        };
        let mut changed = false;
        for step in &day.steps {
            changed |= self.state.completed_steps.remove(&step.id).is_some();
        }
        let before = self.state.completed_days.len();
        self.state.completed_days.retain(|d| *d != day_id);
        changed |= self.state.completed_days.len() != before;
        // An absent intro flag already reads as unseen.
        if self.state.day_intro_seen.get(&day_id) == Some(&true) {
            self.state.day_intro_seen.insert(day_id, false);
            changed = true;
        }
        if !changed {
            return Vec::new();
        }
        self.bump();
        vec![Event::DayReset {
            day_id,
            at: Utc::now(),
        }]
    }

    pub fn spend_energy(&mut self, amount: u32) -> Vec<Event> {
        let from = self.state.energy;
        self.set_energy(from.saturating_sub(amount))
    }

    pub fn restore_energy(&mut self, amount: u32) -> Vec<Event> {
        let from = self.state.energy;
        self.set_energy(from.saturating_add(amount).min(MAX_ENERGY))
    }

    pub fn mark_day_intro_seen(&mut self, day_id: DayId) -> Vec<Event> {
        if self.catalog.day(day_id).is_none()
            || self.state.day_intro_seen.get(&day_id) == Some(&true)
        {
            return Vec::new();
        }
        self.state.day_intro_seen.insert(day_id, true);
        self.bump();
        vec![Event::DayIntroSeen {
            day_id,
            at: Utc::now(),
        }]
    }

    pub fn complete_intro(&mut self) -> Vec<Event> {
        if self.state.intro_completed {
            return Vec::new();
        }
        self.state.intro_completed = true;
        self.bump();
        vec![Event::IntroCompleted { at: Utc::now() }]
    }

    pub fn record_energizer_used(&mut self, energizer_id: &str) {
        self.state.used_energizers.push(energizer_id.to_string());
        self.bump();
    }

    /// Device-local preference; clamped to `0.0..=1.0`.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        if self.state.volume != volume {
            self.state.volume = volume;
            self.bump();
        }
    }

    /// Swap in a whole record (remote merge or reset).
    pub fn replace(&mut self, state: ProgressState) {
        if self.state != state {
            self.state = state;
            self.bump();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn set_energy(&mut self, to: u32) -> Vec<Event> {
        let to = to.min(MAX_ENERGY);
        let from = self.state.energy;
        if from == to {
            return Vec::new();
        }
        self.state.energy = to;
        self.bump();
        vec![Event::EnergyChanged {
            from,
            to,
            at: Utc::now(),
        }]
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::from_toml_str(
                r#"
                [[days]]
                id = 1
                [[days.steps]]
                id = "a"
                cost = 10
                [[days.steps]]
                id = "b"
                cost = 10

                [[days]]
                id = 2
                [[days.steps]]
                id = "c"

                [[days]]
                id = 3
                [[days.steps]]
                id = "d"
                "#,
            )
            .unwrap(),
        )
    }

    fn store() -> ProgressStore {
        ProgressStore::new(ProgressState::default(), catalog())
    }

    fn day_completed_count(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::DayCompleted { .. }))
            .count()
    }

    #[test]
    fn completing_all_steps_completes_day_once() {
        let mut store = store();
        let first = store.complete_step("a", 1);
        assert_eq!(day_completed_count(&first), 0);
        assert_eq!(store.state().current_day, 1);

        let second = store.complete_step("b", 1);
        assert_eq!(day_completed_count(&second), 1);
        assert_eq!(store.state().completed_days, vec![1]);
        assert_eq!(store.state().current_day, 2);

        let again = store.complete_step("b", 1);
        assert!(again.is_empty());
        assert_eq!(store.state().completed_days, vec![1]);
    }

    #[test]
    fn last_day_does_not_advance_current_day() {
        let mut store = store();
        store.replace(ProgressState {
            current_day: 3,
            ..ProgressState::default()
        });
        let events = store.complete_step("d", 3);
        assert_eq!(day_completed_count(&events), 1);
        assert_eq!(store.state().current_day, 3);
        assert!(matches!(
            events.last(),
            Some(Event::DayCompleted { unlocked_day: None, .. })
        ));
    }

    #[test]
    fn current_day_never_decreases() {
        let mut store = store();
        store.replace(ProgressState {
            current_day: 3,
            ..ProgressState::default()
        });
        store.complete_step("a", 1);
        store.complete_step("b", 1);
        assert_eq!(store.state().current_day, 3);
        assert_eq!(store.state().completed_days, vec![1]);
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mut store = store();
        assert!(store.complete_step("a", 99).is_empty());
        assert!(store.complete_step("c", 1).is_empty());
        assert!(store.uncomplete_step("zzz").is_empty());
        assert!(store.reset_day(42).is_empty());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn uncomplete_keeps_day_ratchet() {
        let mut store = store();
        store.complete_step("c", 2);
        assert!(store.is_day_complete(2));
        let events = store.uncomplete_step("c");
        assert_eq!(events.len(), 1);
        assert!(!store.is_step_complete("c"));
        assert!(store.is_day_complete(2));
    }

    #[test]
    fn reset_day_clears_day_state() {
        let mut store = store();
        store.mark_day_intro_seen(1);
        store.complete_step("a", 1);
        store.complete_step("b", 1);
        store.complete_step("c", 2);

        store.reset_day(1);
        let state = store.state();
        assert!(!state.completed_days.contains(&1));
        assert!(state.completed_days.contains(&2));
        assert_eq!(state.day_intro_seen.get(&1), Some(&false));
        assert!(!state.completed_steps.contains_key("a"));
        assert!(!state.completed_steps.contains_key("b"));
        assert!(state.completed_steps.contains_key("c"));
        assert_eq!(state.current_day, 3);
    }

    #[test]
    fn reset_of_untouched_day_is_noop() {
        let mut store = store();
        assert!(store.reset_day(2).is_empty());
        assert_eq!(store.revision(), 0);
        assert!(!store.state().day_intro_seen.contains_key(&2));

        store.complete_step("c", 2);
        let revision = store.revision();
        assert_eq!(store.reset_day(2).len(), 1);
        assert_eq!(store.revision(), revision + 1);
        assert!(store.reset_day(2).is_empty());
        assert_eq!(store.revision(), revision + 1);
    }

    #[test]
    fn energy_is_clamped() {
        let mut store = store();
        store.spend_energy(u32::MAX);
        assert_eq!(store.state().energy, 0);
        store.restore_energy(u32::MAX);
        assert_eq!(store.state().energy, MAX_ENERGY);
        assert!(store.restore_energy(5).is_empty());
    }

    #[test]
    fn gate_check_uses_threshold() {
        let mut store = store();
        store.spend_energy(90);
        assert!(!store.can_enter_step(5, 20));
        store.restore_energy(10);
        assert!(store.can_enter_step(5, 20));
    }

    #[test]
    fn day_progress_counts_steps() {
        let mut store = store();
        store.complete_step("a", 1);
        assert_eq!(store.day_progress(1), Some((1, 2)));
        assert_eq!(store.day_progress(9), None);
    }

    #[test]
    fn volume_is_clamped() {
        let mut store = store();
        store.set_volume(3.0);
        assert_eq!(store.state().volume, 1.0);
        store.set_volume(f32::NAN);
        assert_eq!(store.state().volume, 0.0);
    }
}
