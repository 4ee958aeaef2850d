use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "threadgraph",
    version,
    about = "Rebuild a linked message graph from messenger export snapshots",
    after_help = r#"Examples:
  threadgraph inputs --export '~/exports/messenger/*/threads_db2'
  threadgraph messages --export ./threads_db2 --facebook-id 100012345
  threadgraph entities --config threadgraph.yaml --fail-on-error
  threadgraph stats --config threadgraph.yaml
  threadgraph hackernews --export ~/exports/hn.db

Environment:
  THREADGRAPH_EXPORT_PATH, THREADGRAPH_FACEBOOK_ID, THREADGRAPH_PAGE_SIZE,
  THREADGRAPH_HACKERNEWS_PATH; RUST_LOG controls log verbosity (stderr).
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// YAML config file with `fbmessenger:` / `hackernews:` sections.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Export file, directory or glob. Repeatable; replaces configured paths.
    #[arg(long = "export", value_name = "PATH")]
    pub exports: Vec<String>,
    /// Account owner's id, excluded from thread participant lists.
    #[arg(long)]
    pub facebook_id: Option<String>,
    /// Message rows fetched per query.
    #[arg(long)]
    pub page_size: Option<usize>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List discovered export files in processing order.
    Inputs {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print the deduplicated raw fact stream as JSON Lines.
    Facts {
        #[command(flatten)]
        source: SourceArgs,
        /// Exit non-zero if any error was produced.
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Print resolved senders, threads, messages and errors as JSON Lines.
    Entities {
        #[command(flatten)]
        source: SourceArgs,
        /// Exit non-zero if any error was produced.
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Print resolved messages and errors as JSON Lines.
    Messages {
        #[command(flatten)]
        source: SourceArgs,
        /// Exit non-zero if any error was produced.
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Run the pipeline and print summary counts.
    Stats {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print items from the newest Hacker News dogsheep export.
    Hackernews {
        #[command(flatten)]
        source: SourceArgs,
        /// Exit non-zero if any item failed to decode.
        #[arg(long)]
        fail_on_error: bool,
    },
}
