use std::path::Path;

use crate::commands::common::{
    dead_letter_to_item, format_dead_letter_lines, format_queue_lines, open_engine,
    parse_queue_id, queue_item_to_list_item, DeadLetterItem, QueueListItem,
};
use crate::error::CliError;

pub fn run_queue_list(as_json: bool, db_path: &Path, api_url: &str) -> Result<(), CliError> {
    let engine = open_engine(db_path, api_url)?;
    let items = engine.pending()?;

    if as_json {
        let json_items = items
            .iter()
            .map(queue_item_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for line in format_queue_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_queue_failures(
    limit: usize,
    as_json: bool,
    db_path: &Path,
    api_url: &str,
) -> Result<(), CliError> {
    let engine = open_engine(db_path, api_url)?;
    let letters = engine.dead_letters(limit)?;

    if as_json {
        let json_items = letters
            .iter()
            .map(dead_letter_to_item)
            .collect::<Vec<DeadLetterItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if letters.is_empty() {
        println!("No dropped mutations.");
        return Ok(());
    }

    for line in format_dead_letter_lines(&letters) {
        println!("{line}");
    }
    println!("Acknowledge with: patchline queue ack <id>");
    Ok(())
}

pub fn run_queue_ack(id: &str, db_path: &Path, api_url: &str) -> Result<(), CliError> {
    let id = parse_queue_id(id)?;
    let engine = open_engine(db_path, api_url)?;
    engine.acknowledge_dead_letter(&id)?;
    println!("Acknowledged {id}");
    Ok(())
}
