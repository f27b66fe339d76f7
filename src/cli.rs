use clap::{Args, Parser, Subcommand};
use draftcast_history::PartitionKey;
use std::path::PathBuf;

/// Inspect and maintain the local script revision history.
#[derive(Debug, Parser)]
#[command(name = "draftcast", version, about)]
pub struct Cli {
    /// Configuration file (defaults to draftcast.toml in the platform config
    /// directory, when present)
    #[arg(long, global = true, env = "DRAFTCAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the device-local store (overrides configuration)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Work with recorded revisions
    #[command(subcommand)]
    History(HistoryCommand),
    /// Convert legacy history into the current schema
    Migrate,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List revisions of one script, most recent first
    List(Partition),
    /// Print one revision in full
    Show {
        /// Revision identifier, as printed by `history list`
        id: String,
    },
    /// Record a snapshot of a script
    Record {
        #[command(flatten)]
        partition: Partition,
        /// File to read the script from; `-` or nothing reads standard input
        file: Option<PathBuf>,
    },
}

impl HistoryCommand {
    /// Whether the command only reads history.
    pub fn is_read_only(&self) -> bool {
        !matches!(self, Self::Record { .. })
    }
}

#[derive(Debug, Args)]
pub struct Partition {
    /// Project identifier
    #[arg(long, short)]
    pub project: String,
    /// Episode number; leave out for single-episode projects
    #[arg(long, short)]
    pub episode: Option<u32>,
}

impl From<&Partition> for PartitionKey {
    fn from(partition: &Partition) -> Self {
        PartitionKey::new(partition.project.clone(), partition.episode)
    }
}
