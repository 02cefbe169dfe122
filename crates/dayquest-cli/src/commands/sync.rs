use std::sync::Arc;

use clap::Subcommand;
use dayquest_core::clock::now_ms;
use dayquest_core::{Config, Event, RemoteStore};

use crate::common::{open_session, remote};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Overwrite the shared record with local progress
    Push,
    /// Merge the shared record into local progress
    Pull,
    /// Show sync settings and when the shared record last changed
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let (store, group_key) = remote(&config)?;
    let mut session = open_session(&config)?;

    match action {
        SyncAction::Push => {
            session.join_group(Arc::new(store), &group_key)?;
            session.force_save(now_ms())?;
            session.teardown();
            println!("pushed to {group_key}");
        }
        SyncAction::Pull => {
            session.join_group(Arc::new(store), &group_key)?;
            session.tick(now_ms());
            let merged = session
                .drain_events()
                .iter()
                .any(|e| matches!(e, Event::RemoteMerged { .. }));
            session.teardown();
            if merged {
                println!("merged {group_key} into local progress");
            } else {
                println!("no shared record for {group_key} yet");
            }
        }
        SyncAction::Status { json } => {
            let updated = store.last_updated(&group_key)?;
            let device_id = session.settings().device_id.clone();
            if json {
                let status = serde_json::json!({
                    "group_key": group_key,
                    "remote_dir": store.dir(),
                    "echo_policy": config.sync.echo_policy,
                    "device_id": device_id,
                    "last_updated": updated,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Group: {group_key}");
                println!("Remote dir: {}", store.dir().display());
                println!("Echo policy: {:?}", config.sync.echo_policy);
                println!("Device: {device_id}");
                match updated {
                    Some(at) => println!("Last updated: {}", at.to_rfc3339()),
                    None => println!("Last updated: never"),
                }
            }
        }
    }
    Ok(())
}
