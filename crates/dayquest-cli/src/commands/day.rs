use clap::Subcommand;
use dayquest_core::clock::now_ms;
use dayquest_core::Config;

use crate::common::open_session;

#[derive(Subcommand)]
pub enum DayAction {
    /// Clear a day's steps, completion and intro flag
    Reset {
        /// Day ID
        day: u32,
    },
    /// Mark a day's introduction as seen
    IntroSeen {
        /// Day ID
        day: u32,
    },
}

pub fn run(action: DayAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut session = open_session(&config)?;
    let now = now_ms();

    match action {
        DayAction::Reset { day } => {
            if session.catalog().day(day).is_none() {
                return Err(format!("unknown day {day}").into());
            }
            session.reset_day(day, now);
            println!("day {day} reset");
        }
        DayAction::IntroSeen { day } => {
            if session.catalog().day(day).is_none() {
                return Err(format!("unknown day {day}").into());
            }
            session.mark_day_intro_seen(day, now);
            println!("day {day} intro seen");
        }
    }
    Ok(())
}
