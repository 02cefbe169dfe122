use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{DayId, EnergizerId, StepId};
use crate::sync::SaveStatus;
use crate::transition::{Effect, Screen, TransitionPhase};

/// Every observable change in a session produces an Event.
/// The host drains them after each intent or tick to drive UI and audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StepCompleted {
        day_id: DayId,
        step_id: StepId,
        at: DateTime<Utc>,
    },
    StepUncompleted {
        step_id: StepId,
        at: DateTime<Utc>,
    },
    /// Side channel for reward/celebration logic; distinct from the state
    /// change itself.
    DayCompleted {
        day_id: DayId,
        /// Day newly unlocked by this completion, if any.
        unlocked_day: Option<DayId>,
        at: DateTime<Utc>,
    },
    DayReset {
        day_id: DayId,
        at: DateTime<Utc>,
    },
    DayIntroSeen {
        day_id: DayId,
        at: DateTime<Utc>,
    },
    IntroCompleted {
        at: DateTime<Utc>,
    },
    EnergyChanged {
        from: u32,
        to: u32,
        at: DateTime<Utc>,
    },
    StepEntered {
        day_id: DayId,
        step_id: StepId,
        cost: u32,
        at: DateTime<Utc>,
    },
    /// Entry refused for lack of energy; an energizer break was opened.
    EntryDiverted {
        day_id: DayId,
        step_id: StepId,
        energy: u32,
        at: DateTime<Utc>,
    },
    EnergizersOffered {
        candidates: Vec<EnergizerId>,
        at: DateTime<Utc>,
    },
    EnergizerStarted {
        energizer_id: EnergizerId,
        at: DateTime<Utc>,
    },
    EnergizerFinished {
        energizer_id: Option<EnergizerId>,
        restored: u32,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        phase: TransitionPhase,
        at: DateTime<Utc>,
    },
    ScreenChanged {
        screen: Screen,
        at: DateTime<Utc>,
    },
    /// One-shot effect released at the midpoint of a transition.
    EffectFired {
        effect: Effect,
        at: DateTime<Utc>,
    },
    SaveStatusChanged {
        status: SaveStatus,
        at: DateTime<Utc>,
    },
    RemoteMerged {
        group_key: String,
        at: DateTime<Utc>,
    },
    ProgressReset {
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::DayCompleted {
            day_id: 2,
            unlocked_day: Some(3),
            at: crate::clock::datetime_from_ms(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DayCompleted");
        assert_eq!(json["unlocked_day"], 3);
    }
}
