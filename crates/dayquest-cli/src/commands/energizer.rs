use clap::Subcommand;
use dayquest_core::clock::now_ms;
use dayquest_core::Config;

use crate::common::open_session;

#[derive(Subcommand)]
pub enum EnergizerAction {
    /// List candidate energizers, unused ones first
    Offer {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Do an energizer break and collect the reward
    Run {
        /// Energizer ID
        id: String,
        /// Break by choice: no energy reward
        #[arg(long)]
        free: bool,
    },
}

pub fn run(action: EnergizerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut session = open_session(&config)?;
    let mut rng = rand::thread_rng();
    let now = now_ms();

    match action {
        EnergizerAction::Offer { json } => {
            let candidates = session.offer_energizers(&mut rng, now);
            if json {
                println!("{}", serde_json::to_string_pretty(&candidates)?);
            } else {
                for id in &candidates {
                    let title = session
                        .catalog()
                        .energizer(id)
                        .map(|e| e.title.as_str())
                        .unwrap_or_default();
                    println!("{id}\t{title}");
                }
            }
        }
        EnergizerAction::Run { id, free } => {
            if free {
                session.open_free_energizer(now);
            } else {
                session.open_recharge(now);
            }
            if !session.start_energizer(&id, now) {
                return Err(format!("unknown energizer '{id}'").into());
            }
            let outcome = session
                .finish_energizer(&mut rng, now)
                .ok_or("energizer break was not open")?;
            println!(
                "restored {} energy (now {})",
                outcome.restored,
                session.state().energy
            );
        }
    }
    Ok(())
}
