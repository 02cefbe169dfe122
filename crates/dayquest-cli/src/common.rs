//! Session setup shared by the commands.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use dayquest_core::storage::data_dir;
use dayquest_core::sync::get_or_create_device_id_at;
use dayquest_core::{
    Catalog, Config, DirRemote, LocalPersistence, Session, SessionSettings, SqliteKv,
};
use tracing::debug;

const DB_FILE: &str = "dayquest.db";

pub fn load_catalog(config: &Config) -> Result<Catalog, Box<dyn Error>> {
    let catalog = match config.catalog_path.as_deref() {
        Some(path) if !path.is_empty() => Catalog::load(Path::new(path))?,
        _ => Catalog::builtin()?,
    };
    Ok(catalog)
}

/// Open a local-only session over the on-disk snapshot.
pub fn open_session(config: &Config) -> Result<Session, Box<dyn Error>> {
    let dir = data_dir()?;
    let catalog = load_catalog(config)?;
    let kv = SqliteKv::open(&dir.join(DB_FILE))?;
    let device_id = get_or_create_device_id_at(&dir)?;
    debug!(data_dir = %dir.display(), %device_id, "opening session");
    Ok(Session::init(
        Arc::new(catalog),
        LocalPersistence::new(Box::new(kv)),
        SessionSettings::from_config(config, device_id),
    ))
}

/// Shared directory store and group key from `[sync]`.
pub fn remote(config: &Config) -> Result<(DirRemote, String), Box<dyn Error>> {
    let dir = config
        .sync
        .remote_dir
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or("sync.remote_dir is not set (dayquest-cli config set sync.remote_dir <dir>)")?;
    let group_key = config
        .sync
        .group_key
        .clone()
        .filter(|g| !g.is_empty())
        .ok_or("sync.group_key is not set (dayquest-cli config set sync.group_key <key>)")?;
    Ok((DirRemote::new(dir), group_key))
}
