use std::path::Path;
use std::time::Duration;

use patchline_core::sync::DrainOutcome;

use crate::commands::common::{format_conflict_lines, open_engine};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path, api_url: &str) -> Result<(), CliError> {
    let engine = open_engine(db_path, api_url)?;

    let online = engine.client().probe().await;
    engine.monitor().set_state(online);

    if !online {
        let status = engine.status().await?;
        println!(
            "Offline; {} changes stay queued for the next sync.",
            status.pending_count()
        );
        return Ok(());
    }

    match engine.force_sync().await? {
        DrainOutcome::Completed(report) => {
            println!("Sync finished: {}", report.summary());
            for id in &report.dropped {
                println!("Dropped after exhausting retries: {id}");
            }
            let conflicts = engine.pending_conflicts().await;
            if !conflicts.is_empty() {
                println!("Conflicts awaiting a decision:");
                for line in format_conflict_lines(&conflicts) {
                    println!("  {line}");
                }
                println!("Resolve with: patchline conflicts resolve <id> --action <keep-local|keep-server|custom>");
            }
        }
        DrainOutcome::AlreadyRunning => println!("A sync pass is already running."),
        DrainOutcome::Offline => println!("Went offline before the pass could start."),
    }
    Ok(())
}

pub async fn run_sync_watch(
    interval_secs: u64,
    db_path: &Path,
    api_url: &str,
) -> Result<(), CliError> {
    let engine = open_engine(db_path, api_url)?;
    let interval = Duration::from_secs(interval_secs.max(1));

    println!("Watching connectivity (probe every {}s); Ctrl-C to stop.", interval.as_secs());

    let probe_loop = async {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let online = engine.client().probe().await;
            engine.monitor().set_state(online);
        }
    };

    tokio::select! {
        () = probe_loop => {}
        result = engine.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped.");
        }
    }

    let status = engine.status().await?;
    if status.pending_count() > 0 {
        println!("{} changes still queued.", status.pending_count());
    }
    Ok(())
}
