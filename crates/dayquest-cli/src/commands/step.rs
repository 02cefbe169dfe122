use clap::Subcommand;
use dayquest_core::clock::now_ms;
use dayquest_core::{Config, EntryDecision};

use crate::common::open_session;

#[derive(Subcommand)]
pub enum StepAction {
    /// Mark a step as completed
    Complete {
        /// Day ID
        day: u32,
        /// Step ID
        step: String,
    },
    /// Clear a step's completion
    Uncomplete {
        /// Step ID
        step: String,
    },
    /// Enter a step, paying its energy cost
    Enter {
        /// Day ID
        day: u32,
        /// Step ID
        step: String,
    },
}

pub fn run(action: StepAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut session = open_session(&config)?;
    let now = now_ms();

    match action {
        StepAction::Complete { day, step } => {
            if session.catalog().step(day, &step).is_none() {
                return Err(format!("no step '{step}' in day {day}").into());
            }
            session.complete_step(day, &step, now);
            println!("completed {step}");
            if session.store().is_day_complete(day) {
                println!("day {day} complete; current day is {}", session.state().current_day);
            }
        }
        StepAction::Uncomplete { step } => {
            session.uncomplete_step(&step, now);
            println!("uncompleted {step}");
        }
        StepAction::Enter { day, step } => match session.enter_step(day, &step, now) {
            EntryDecision::Enter { cost } => {
                println!("entered {step} (cost {cost}, energy now {})", session.state().energy);
            }
            EntryDecision::Diverted => {
                println!(
                    "energy {} is below {}; take a break first (dayquest-cli energizer offer)",
                    session.state().energy,
                    config.energy.low_threshold
                );
            }
            EntryDecision::Locked => return Err(format!("day {day} is locked").into()),
            EntryDecision::Unknown => return Err(format!("no step '{step}' in day {day}").into()),
        },
    }
    Ok(())
}
