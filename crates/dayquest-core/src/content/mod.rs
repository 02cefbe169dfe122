//! Static content consumed by the core.

mod catalog;

pub use catalog::{Catalog, DayDef, DayId, EnergizerDef, EnergizerId, StepDef, StepId};
