use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use patchline_core::models::{ManualAction, MutationKind};

#[derive(Parser)]
#[command(name = "patchline")]
#[command(about = "Queue inventory mutations offline and sync them when connectivity returns")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Remote inventory API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a mutation for replay when connectivity allows
    #[command(alias = "add")]
    Enqueue {
        /// Mutation verb
        #[arg(long, value_enum)]
        method: MethodArg,
        /// Resource path, e.g. equipment/eq-1
        #[arg(long, value_name = "PATH")]
        target: String,
        /// Mutation body as JSON (defaults to an empty object)
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
        /// Retry budget before the mutation is dropped
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,
    },
    /// Inspect the pending queue and dropped mutations
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Drain the queue against the remote API
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show connectivity and sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect and resolve sync conflicts
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
    /// Read-cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued mutations in replay order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List mutations dropped after exhausting retries
    Failures {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Acknowledge (remove) a dropped mutation
    Ack {
        /// Dropped mutation ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Keep probing connectivity and drain on every reconnect
    Watch {
        /// Seconds between connectivity probes
        #[arg(long, default_value = "15", value_name = "SECS")]
        interval: u64,
    },
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List conflicts awaiting a decision in this session
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List resolved conflicts from the durable history
    Log {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict with an explicit action
    Resolve {
        /// Conflict ID
        id: String,
        /// Resolution action
        #[arg(long, value_enum)]
        action: ActionArg,
        /// Final payload for a custom resolution
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Purge expired cache entries
    Sweep,
    /// Drop all cache entries
    Clear,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum MethodArg {
    Create,
    Update,
    Delete,
    Patch,
}

impl From<MethodArg> for MutationKind {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Create => Self::Create,
            MethodArg::Update => Self::Update,
            MethodArg::Delete => Self::Delete,
            MethodArg::Patch => Self::Patch,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ActionArg {
    KeepLocal,
    KeepServer,
    Custom,
}

impl From<ActionArg> for ManualAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::KeepLocal => Self::KeepLocal,
            ActionArg::KeepServer => Self::KeepServer,
            ActionArg::Custom => Self::Custom,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
