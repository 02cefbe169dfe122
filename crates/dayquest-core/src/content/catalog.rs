//! Read-only content catalog: days, their steps, and the energizer pool.
//!
//! The catalog is authored outside this crate (TOML or JSON). The core only
//! needs ids, step costs and ordering; the remaining metadata is carried
//! through for the rendering layer.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

pub type DayId = u32;
pub type StepId = String;
pub type EnergizerId = String;

const BUILTIN_CATALOG: &str = include_str!("builtin_catalog.toml");

/// A single task inside a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDef {
    pub id: StepId,
    #[serde(default)]
    pub title: String,
    /// Energy deducted when the learner enters this step.
    #[serde(default)]
    pub cost: u32,
}

/// One day of the activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayDef {
    pub id: DayId,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Introduction shown once, the first time the day is opened.
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDef>,
}

/// A break activity. The reward is computed by the energizer subsystem,
/// never supplied by content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergizerDef {
    pub id: EnergizerId,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_energizer_secs")]
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub days: Vec<DayDef>,
    #[serde(default)]
    pub energizers: Vec<EnergizerDef>,
}

fn default_color() -> String {
    "#3b82f6".into()
}

fn default_energizer_secs() -> u64 {
    60
}

impl Catalog {
    /// Parse and validate a TOML catalog.
    pub fn from_toml_str(src: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(src)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a JSON catalog.
    pub fn from_json_str(src: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(src)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file. `.json` files are parsed as JSON, anything else
    /// as TOML.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// The catalog compiled into the crate, used when no catalog path is
    /// configured.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.days.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut day_ids = HashSet::new();
        let mut step_ids = HashSet::new();
        for day in &self.days {
            if !day_ids.insert(day.id) {
                return Err(CatalogError::DuplicateId {
                    kind: "day",
                    id: day.id.to_string(),
                });
            }
            for step in &day.steps {
                if !step_ids.insert(step.id.as_str()) {
                    return Err(CatalogError::DuplicateId {
                        kind: "step",
                        id: step.id.clone(),
                    });
                }
            }
        }
        let mut energizer_ids = HashSet::new();
        for energizer in &self.energizers {
            if !energizer_ids.insert(energizer.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "energizer",
                    id: energizer.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn day(&self, id: DayId) -> Option<&DayDef> {
        self.days.iter().find(|d| d.id == id)
    }

    /// Id of the final day in catalog order.
    pub fn last_day_id(&self) -> DayId {
        self.days.last().map(|d| d.id).unwrap_or(1)
    }

    pub fn step(&self, day_id: DayId, step_id: &str) -> Option<&StepDef> {
        self.day(day_id)?.steps.iter().find(|s| s.id == step_id)
    }

    /// Day that owns `step_id`, if any.
    pub fn day_of_step(&self, step_id: &str) -> Option<&DayDef> {
        self.days
            .iter()
            .find(|d| d.steps.iter().any(|s| s.id == step_id))
    }

    pub fn energizer(&self, id: &str) -> Option<&EnergizerDef> {
        self.energizers.iter().find(|e| e.id == id)
    }
}
