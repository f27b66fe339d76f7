//! Operator CLI for the local script revision history.
//!
//! Reads the same device-local store the editor writes, so history can be
//! inspected, seeded or migrated without opening a project.

mod cli;
mod error;

use crate::cli::{Cli, Command, HistoryCommand};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use draftcast_config::Config;
use draftcast_history::{PartitionKey, RevisionEntry, RevisionId, RevisionStore};
use draftcast_storage::BackendHandle;
use draftcast_storage::backend::{LocalBackend, ReadOnlyBackend};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("draftcast=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            if err.is_retryable() {
                eprintln!("(this may succeed if retried)");
            }
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = Some(data_dir);
    }
    let data_dir = config.data_dir().or_raise(|| ErrorKind::Config)?;
    let read_only = match &cli.command {
        Command::History(command) => command.is_read_only(),
        Command::Migrate => false,
    };
    let backend = open_backend(&data_dir, read_only)?;
    tracing::debug!(data_dir = %data_dir.display(), read_only, "opened local storage");

    match cli.command {
        Command::Migrate => {
            let (store, migration) = RevisionStore::open_with_migration(backend, config.history_options()).await;
            println!("{migration}");
            println!("{} revisions retained", store.len().await);
        },
        Command::History(HistoryCommand::List(partition)) => {
            let partition = PartitionKey::from(&partition);
            let store = RevisionStore::open(backend, config.history_options()).await;
            let entries = store.list(&partition).await;
            if entries.is_empty() {
                println!("No revisions recorded for {partition}");
            }
            for entry in entries {
                println!("{}  {}  {:>6} chars  {}", entry.id, timestamp(&entry), entry.length, entry.summary);
            }
        },
        Command::History(HistoryCommand::Show { id }) => {
            let id = id.parse::<RevisionId>().or_raise(|| ErrorKind::InvalidArgument(format!("revision id {id:?}")))?;
            let store = RevisionStore::open(backend, config.history_options()).await;
            let entry = store.get(id).await.ok_or_raise(|| ErrorKind::NotFound(id.to_string()))?;
            println!("id:       {}", entry.id);
            println!("script:   {}", entry.partition);
            println!("recorded: {}", timestamp(&entry));
            println!("length:   {} chars", entry.length);
            println!("hash:     {}", entry.content_hash);
            println!();
            println!("{}", entry.content);
        },
        Command::History(HistoryCommand::Record { partition, file }) => {
            let partition = PartitionKey::from(&partition);
            let content = read_script(file.as_deref()).await?;
            let store = RevisionStore::open(backend, config.history_options()).await;
            match store.record(&partition, &content).await {
                Some(entry) => println!("Recorded {} for {partition}", entry.id),
                None => println!("Unchanged: identical revision already recorded for {partition}"),
            }
        },
    }
    Ok(())
}

fn open_backend(data_dir: &Path, read_only: bool) -> Result<BackendHandle> {
    let describe = || ErrorKind::Storage(data_dir.display().to_string());
    let root = std::path::absolute(data_dir).or_raise(describe)?;
    let local: BackendHandle = Arc::new(LocalBackend::new("local", root).or_raise(describe)?);
    Ok(if read_only { Arc::new(ReadOnlyBackend::new(local)) } else { local })
}

async fn read_script(file: Option<&Path>) -> Result<String> {
    match file.filter(|path| *path != Path::new("-")) {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .or_raise(|| ErrorKind::Input(path.display().to_string())),
        None => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .or_raise(|| ErrorKind::Input("standard input".to_string()))?;
            Ok(content)
        },
    }
}

fn timestamp(entry: &RevisionEntry) -> String {
    entry.created_at.format(&Rfc3339).unwrap_or_else(|_| entry.created_at.to_string())
}
