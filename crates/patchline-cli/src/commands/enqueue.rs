use std::path::Path;

use patchline_core::models::MutationKind;

use crate::commands::common::{open_engine, parse_payload};
use crate::error::CliError;

pub fn run_enqueue(
    method: MutationKind,
    target: &str,
    payload: Option<&str>,
    max_retries: Option<u32>,
    db_path: &Path,
    api_url: &str,
) -> Result<(), CliError> {
    let payload = parse_payload(payload)?;
    let engine = open_engine(db_path, api_url)?;
    let item = engine.enqueue(method, target.trim(), payload, max_retries)?;
    println!("{}", item.id);
    Ok(())
}
