//! Transition controller.
//!
//! A three-phase visibility machine that serializes "leave current screen,
//! swap screen, enter new screen". Like the sync engine it has no internal
//! threads; the caller is responsible for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Visible --goto--> FadingOut --T--> (swap, fire effect) FadingIn --T--> Visible
//! ```
//!
//! A `goto` that arrives while a fade is in flight swaps the screen at once
//! and leaves the phase alone, so rapid requests never stack. The latest
//! request always wins: the in-flight fade no longer swaps to its own
//! pending screen.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::screen::{Effect, Screen};
use crate::clock::datetime_from_ms;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    Visible,
    FadingOut,
    FadingIn,
}

#[derive(Debug, Clone)]
pub struct TransitionController {
    screen: Screen,
    phase: TransitionPhase,
    pending_screen: Option<Screen>,
    pending_effect: Option<Effect>,
    /// When the current fade phase ends (epoch milliseconds).
    phase_ends_ms: Option<u64>,
    fade_ms: u64,
}

impl TransitionController {
    pub fn new(initial: Screen, fade_ms: u64) -> Self {
        Self {
            screen: initial,
            phase: TransitionPhase::Visible,
            pending_screen: None,
            pending_effect: None,
            phase_ends_ms: None,
            fade_ms,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn pending_screen(&self) -> Option<&Screen> {
        self.pending_screen.as_ref()
    }

    pub fn pending_effect(&self) -> Option<&Effect> {
        self.pending_effect.as_ref()
    }

    /// Content opacity: hidden only while fading out.
    pub fn opacity(&self) -> f32 {
        match self.phase {
            TransitionPhase::FadingOut => 0.0,
            TransitionPhase::Visible | TransitionPhase::FadingIn => 1.0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TransitionPhase::Visible
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn goto(&mut self, next: Screen, effect: Option<Effect>, now_ms: u64) -> Vec<Event> {
        let at = datetime_from_ms(now_ms);
        if self.phase != TransitionPhase::Visible {
            debug!(?next, phase = ?self.phase, "transition in flight; swapping immediately");
            self.screen = next.clone();
            self.pending_screen = None;
            return vec![Event::ScreenChanged { screen: next, at }];
        }

        self.pending_screen = Some(next);
        self.pending_effect = effect;
        self.enter_phase(TransitionPhase::FadingOut, now_ms)
    }

    /// Call periodically. Catches up on every phase boundary that has passed,
    /// measuring each phase from its scheduled start rather than from `now`.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(ends) = self.phase_ends_ms.filter(|ends| now_ms >= *ends) {
            match self.phase {
                TransitionPhase::FadingOut => {
                    if let Some(next) = self.pending_screen.take() {
                        self.screen = next.clone();
                        events.push(Event::ScreenChanged {
                            screen: next,
                            at: datetime_from_ms(ends),
                        });
                    }
                    if let Some(effect) = self.pending_effect.take() {
                        events.push(Event::EffectFired {
                            effect,
                            at: datetime_from_ms(ends),
                        });
                    }
                    events.extend(self.enter_phase(TransitionPhase::FadingIn, ends));
                }
                TransitionPhase::FadingIn => {
                    events.extend(self.enter_phase(TransitionPhase::Visible, ends));
                }
                TransitionPhase::Visible => {
                    self.phase_ends_ms = None;
                }
            }
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn enter_phase(&mut self, phase: TransitionPhase, started_ms: u64) -> Vec<Event> {
        self.phase = phase;
        self.phase_ends_ms = match phase {
            TransitionPhase::Visible => None,
            _ => Some(started_ms.saturating_add(self.fade_ms)),
        };
        vec![Event::PhaseChanged {
            phase,
            at: datetime_from_ms(started_ms),
        }]
    }
}
