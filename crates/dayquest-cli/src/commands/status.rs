use dayquest_core::clock::now_ms;
use dayquest_core::{Config, MAX_ENERGY};

use crate::common::open_session;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let session = open_session(&config)?;
    let state = session.state();

    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    println!("Energy: {}/{MAX_ENERGY}", state.energy);
    println!("Current day: {}", state.current_day);
    for day in &session.catalog().days {
        let (done, total) = session.store().day_progress(day.id).unwrap_or((0, 0));
        let mark = if session.store().is_day_complete(day.id) {
            "done"
        } else if session.store().is_day_unlocked(day.id) {
            "open"
        } else {
            "locked"
        };
        println!("  Day {} [{mark}] {}: {done}/{total}", day.id, day.title);
        for step in &day.steps {
            let check = if session.store().is_step_complete(&step.id) {
                "x"
            } else {
                " "
            };
            println!("    [{check}] {} ({}, cost {})", step.title, step.id, step.cost);
        }
    }
    Ok(())
}

pub fn reset() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut session = open_session(&config)?;
    session.reset_all(now_ms());
    println!("progress reset");
    Ok(())
}
