use std::path::Path;

use patchline_core::db::{CacheRepository, SqliteCacheRepository};

use crate::commands::common::open_database;
use crate::error::CliError;

pub fn run_cache_sweep(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let cache = SqliteCacheRepository::new(db.connection());
    let purged = cache.clear_expired()?;
    println!("Purged {purged} expired entries.");
    Ok(())
}

pub fn run_cache_clear(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let cache = SqliteCacheRepository::new(db.connection());
    let purged = cache.clear_all()?;
    println!("Dropped {purged} entries.");
    Ok(())
}
