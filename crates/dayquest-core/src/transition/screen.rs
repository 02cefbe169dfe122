use serde::{Deserialize, Serialize};

use crate::content::{DayId, EnergizerId, StepId};

/// Screens the core knows how to route between. Rendering is the host's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// First-run onboarding sequence.
    Intro,
    GroupSelect,
    Map,
    DayIntro { day_id: DayId },
    Step { day_id: DayId, step_id: StepId },
    EnergizerSelect,
    Energizer { energizer_id: EnergizerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Whoosh,
    DayComplete,
    Reward,
}

/// One-shot side effect released when a transition swaps screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cue", rename_all = "snake_case")]
pub enum Effect {
    Sound(SoundCue),
}
