//! The progress record and its normalization rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{DayId, EnergizerId, StepId};

/// Upper bound of the energy economy.
pub const MAX_ENERGY: u32 = 100;

pub const DEFAULT_VOLUME: f32 = 0.5;

/// The single mutable record describing a learner's progress.
///
/// Serialized camelCase; that shape is shared by the local snapshot and the
/// remote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Highest day the learner may open.
    pub current_day: DayId,
    /// Spendable resource, always within `0..=MAX_ENERGY`.
    pub energy: u32,
    /// Presence means completed. Values are always `true`.
    pub completed_steps: BTreeMap<StepId, bool>,
    /// Each day appears at most once, in completion order.
    pub completed_days: Vec<DayId>,
    pub used_energizers: Vec<EnergizerId>,
    pub day_intro_seen: BTreeMap<DayId, bool>,
    pub intro_completed: bool,
    /// Device-local playback preference. Remote merges never touch it.
    pub volume: f32,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            current_day: 1,
            energy: MAX_ENERGY,
            completed_steps: BTreeMap::new(),
            completed_days: Vec::new(),
            used_energizers: Vec::new(),
            day_intro_seen: BTreeMap::new(),
            intro_completed: false,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl ProgressState {
    /// Build a record from an arbitrary JSON value, field by field.
    ///
    /// Well-formed fields are taken as-is (numbers clamped into range);
    /// missing or malformed fields fall back to the default record. Never
    /// fails: a non-object value yields the default record.
    pub fn from_value_lenient(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            return defaults;
        };

        let current_day = obj
            .get("currentDay")
            .and_then(as_u64_lenient)
            .map(|d| d.clamp(1, u64::from(DayId::MAX)) as DayId)
            .unwrap_or(defaults.current_day);

        let energy = obj
            .get("energy")
            .and_then(as_f64_lenient)
            .map(|e| e.round().clamp(0.0, f64::from(MAX_ENERGY)) as u32)
            .unwrap_or(defaults.energy);

        let volume = obj
            .get("volume")
            .and_then(as_f64_lenient)
            .map(|v| v.clamp(0.0, 1.0) as f32)
            .unwrap_or(defaults.volume);

        let intro_completed = obj
            .get("introCompleted")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.intro_completed);

        Self {
            current_day,
            energy,
            completed_steps: normalize_step_flags(obj.get("completedSteps")),
            completed_days: normalize_day_list(obj.get("completedDays")),
            used_energizers: normalize_string_list(obj.get("usedEnergizers")),
            day_intro_seen: normalize_day_flags(obj.get("dayIntroSeen")),
            intro_completed,
            volume,
        }
    }

    /// Field-level override used for inbound remote snapshots: everything
    /// comes from `remote` except the device-local `volume`.
    pub fn merged_with_remote(&self, remote: &Value) -> Self {
        let mut merged = Self::from_value_lenient(remote);
        merged.volume = self.volume;
        merged
    }
}

fn as_u64_lenient(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Remote stores may turn integer-keyed maps into sparse arrays and drop
/// empty containers entirely, so both shapes are accepted.
fn entries(value: Option<&Value>) -> Vec<(Option<String>, &Value)> {
    match value {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (Some(k.clone()), v)).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (Some(i.to_string()), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_step_flags(value: Option<&Value>) -> BTreeMap<StepId, bool> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(map)) = value {
        for (step_id, flag) in map {
            if flag.as_bool() == Some(true) {
                out.insert(step_id.clone(), true);
            }
        }
    }
    out
}

fn normalize_day_flags(value: Option<&Value>) -> BTreeMap<DayId, bool> {
    let mut out = BTreeMap::new();
    for (key, flag) in entries(value) {
        let Some(day) = key.and_then(|k| k.parse::<DayId>().ok()) else {
            continue;
        };
        if let Some(seen) = flag.as_bool() {
            out.insert(day, seen);
        }
    }
    out
}

fn normalize_day_list(value: Option<&Value>) -> Vec<DayId> {
    let mut out: Vec<DayId> = Vec::new();
    for (_, item) in entries(value) {
        if let Some(day) = as_u64_lenient(item).and_then(|d| DayId::try_from(d).ok()) {
            if !out.contains(&day) {
                out.push(day);
            }
        }
    }
    out
}

fn normalize_string_list(value: Option<&Value>) -> Vec<String> {
    entries(value)
        .into_iter()
        .filter_map(|(_, item)| item.as_str().map(str::to_string))
        .collect()
}
