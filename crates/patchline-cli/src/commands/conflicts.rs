use std::path::Path;

use patchline_core::models::{ConflictId, ManualAction};

use crate::commands::common::{
    conflict_record_to_item, conflict_to_list_item, format_conflict_lines,
    format_conflict_log_lines, open_engine, parse_payload, ConflictListItem, ConflictLogItem,
};
use crate::error::CliError;

pub async fn run_conflicts_list(
    as_json: bool,
    db_path: &Path,
    api_url: &str,
) -> Result<(), CliError> {
    let engine = open_engine(db_path, api_url)?;
    let conflicts = engine.pending_conflicts().await;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_list_item)
            .collect::<Vec<ConflictListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No unresolved conflicts in this session.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_conflicts_log(
    limit: usize,
    as_json: bool,
    db_path: &Path,
    api_url: &str,
) -> Result<(), CliError> {
    let engine = open_engine(db_path, api_url)?;
    let records = engine.conflict_history(limit)?;

    if as_json {
        let json_items = records
            .iter()
            .map(conflict_record_to_item)
            .collect::<Vec<ConflictLogItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No resolved conflicts recorded.");
        return Ok(());
    }

    for line in format_conflict_log_lines(&records) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_conflicts_resolve(
    id: &str,
    action: ManualAction,
    payload: Option<&str>,
    db_path: &Path,
    api_url: &str,
) -> Result<(), CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId);
    }
    let conflict_id: ConflictId = trimmed
        .parse()
        .map_err(|_| CliError::InvalidId(trimmed.to_string()))?;

    let custom_data = match payload {
        Some(text) => Some(parse_payload(Some(text))?),
        None => None,
    };

    let engine = open_engine(db_path, api_url)?;

    let online = engine.client().probe().await;
    engine.monitor().set_state(online);

    match engine.resolve_conflict(conflict_id, action, custom_data).await {
        Ok(true) => println!("Conflict resolved; mutation settled."),
        Ok(false) => println!("Conflict resolved; replay failed, mutation stays queued."),
        Err(patchline_core::Error::NotFound(_)) => {
            return Err(CliError::ConflictNotFound(trimmed.to_string()));
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}
