//! Energizers: the energy gate in front of steps, break-activity selection
//! and the reward paid out when a break ends.

mod gate;
mod reward;
mod selection;

pub use gate::{BreakKind, BreakOutcome, EnergizerGate, EntryDecision, PendingTask};
pub use reward::roll_reward;
pub use selection::pick_candidates;

/// Tunables of the energy economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergySettings {
    /// Entering a step is refused while energy is below this.
    pub low_threshold: u32,
    pub reward_min: u32,
    pub reward_max: u32,
    /// How many energizers are offered per break.
    pub candidates: usize,
}

impl Default for EnergySettings {
    fn default() -> Self {
        Self {
            low_threshold: 20,
            reward_min: 20,
            reward_max: 40,
            candidates: 3,
        }
    }
}
