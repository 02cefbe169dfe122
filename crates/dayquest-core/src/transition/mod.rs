//! Screen transitions.

mod controller;
mod screen;

pub use controller::{TransitionController, TransitionPhase};
pub use screen::{Effect, Screen, SoundCue};
