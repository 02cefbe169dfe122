//! Progress store: the authoritative learner record and its operations.

mod state;
mod store;

pub use state::{ProgressState, DEFAULT_VOLUME, MAX_ENERGY};
pub use store::ProgressStore;
