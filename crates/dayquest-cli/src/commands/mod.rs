pub mod config;
pub mod day;
pub mod energizer;
pub mod status;
pub mod step;
pub mod sync;
