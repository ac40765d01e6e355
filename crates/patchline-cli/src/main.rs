//! Patchline CLI - offline-first queue and sync for inventory mutations
//!
//! Queue mutations while disconnected, then drain them against the remote
//! API once connectivity returns.

mod cli;
mod commands;
mod error;

use clap::Parser;

use cli::{CacheCommands, Cli, Commands, ConflictCommands, QueueCommands, SyncCommands};
use commands::common::{resolve_api_url, resolve_db_path};
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patchline=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path.clone());
    let api_url = resolve_api_url(cli.api_url.clone());

    match cli.command {
        Commands::Enqueue {
            method,
            target,
            payload,
            max_retries,
        } => commands::enqueue::run_enqueue(
            method.into(),
            &target,
            payload.as_deref(),
            max_retries,
            &db_path,
            &api_url,
        )?,
        Commands::Queue { command } => match command {
            QueueCommands::List { json } => {
                commands::queue::run_queue_list(json, &db_path, &api_url)?;
            }
            QueueCommands::Failures { limit, json } => {
                commands::queue::run_queue_failures(limit, json, &db_path, &api_url)?;
            }
            QueueCommands::Ack { id } => {
                commands::queue::run_queue_ack(&id, &db_path, &api_url)?;
            }
        },
        Commands::Sync { command } => match command {
            None => commands::sync::run_sync(&db_path, &api_url).await?,
            Some(SyncCommands::Watch { interval }) => {
                commands::sync::run_sync_watch(interval, &db_path, &api_url).await?;
            }
        },
        Commands::Status { json } => {
            commands::status::run_status(json, &db_path, &api_url).await?;
        }
        Commands::Conflicts { command } => match command {
            ConflictCommands::List { json } => {
                commands::conflicts::run_conflicts_list(json, &db_path, &api_url).await?;
            }
            ConflictCommands::Log { limit, json } => {
                commands::conflicts::run_conflicts_log(limit, json, &db_path, &api_url)?;
            }
            ConflictCommands::Resolve {
                id,
                action,
                payload,
            } => {
                commands::conflicts::run_conflicts_resolve(
                    &id,
                    action.into(),
                    payload.as_deref(),
                    &db_path,
                    &api_url,
                )
                .await?;
            }
        },
        Commands::Cache { command } => match command {
            CacheCommands::Sweep => commands::cache::run_cache_sweep(&db_path)?,
            CacheCommands::Clear => commands::cache::run_cache_clear(&db_path)?,
        },
        Commands::Completions { shell, output } => {
            commands::completions::run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
