use std::path::Path;

use crate::commands::common::{open_engine, relative_time};
use crate::error::CliError;

pub async fn run_status(as_json: bool, db_path: &Path, api_url: &str) -> Result<(), CliError> {
    let engine = open_engine(db_path, api_url)?;

    let online = engine.client().probe().await;
    engine.monitor().set_state(online);

    let status = engine.status().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", status.status_line());
    match status.last_sync {
        Some(millis) => println!("Last sync: {}", relative_time(millis)),
        None => println!("Last sync: never"),
    }
    if let Some(error) = &status.sync_error {
        println!("Last error: {error}");
    }
    let failures = engine.dead_letters(1)?;
    if !failures.is_empty() {
        println!("There are dropped mutations; see: patchline queue failures");
    }
    Ok(())
}
