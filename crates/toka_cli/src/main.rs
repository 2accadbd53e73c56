//! Toka CLI: fetch tokenizer definitions and manage the native library.
//!
//! Provides `toka fetch` for resolving a model's `tokenizer.json` through the
//! cache tiers, `toka resolve-lib`, `toka lib-info` and `toka versions` for the
//! native library, and `toka cache` for inspecting and clearing caches.

#![warn(missing_docs)]

mod cache;
mod context;
mod fetch;
mod library;

use std::error::Error;
use std::process;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle for raising the log level after settings are resolved.
pub type LogFilterHandle = reload::Handle<EnvFilter, Registry>;

/// Toka: tokenizer asset resolution.
#[derive(Parser, Debug)]
#[command(name = "toka", version, about = "Tokenizer asset resolver")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `toka.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a model's tokenizer definition.
    Fetch(FetchArgs),
    /// Resolve and load the native library, then report it.
    ResolveLib(ResolveLibArgs),
    /// Show where the native library would come from.
    LibInfo,
    /// List published native library releases.
    Versions,
    /// Inspect or clear caches.
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Arguments for `toka fetch`.
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Model identifier (`name` or `owner/name`).
    pub model: String,

    /// Branch, tag or commit (default: configured revision).
    #[arg(short, long)]
    pub revision: Option<String>,

    /// Bearer token for the model hub.
    #[arg(long)]
    pub token: Option<String>,

    /// Use only local caches.
    #[arg(long)]
    pub offline: bool,

    /// Write the document here instead of printing its cache path.
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for `toka resolve-lib`.
#[derive(Parser, Debug)]
pub struct ResolveLibArgs {
    /// Load this library file instead of searching.
    #[arg(long)]
    pub path: Option<String>,

    /// Release tag to download when nothing local is usable.
    #[arg(long)]
    pub version: Option<String>,
}

/// `toka cache` subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show cache state for a model.
    Info {
        /// Model identifier.
        model: String,
    },
    /// Remove cached tokenizer definitions.
    Clear(ClearArgs),
    /// Remove the cached native library.
    ClearLib,
}

/// Arguments for `toka cache clear`.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Model whose revisions are removed.
    #[arg(conflicts_with_all = ["all", "pattern"], required_unless_present_any = ["all", "pattern"])]
    pub model: Option<String>,

    /// Remove every cached model.
    #[arg(long, conflicts_with = "pattern")]
    pub all: bool,

    /// Remove models whose identifiers match a glob (e.g. `google/*`).
    #[arg(long)]
    pub pattern: Option<String>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
    /// Live log filter, absent when no subscriber was installed.
    pub log_filter: Option<LogFilterHandle>,
}

impl GlobalArgs {
    /// Switches logging to debug level unless `--quiet` was given.
    pub fn enable_debug_logging(&self) {
        if self.quiet {
            return;
        }
        if let Some(handle) = &self.log_filter {
            if let Err(e) = handle.modify(|filter| *filter = EnvFilter::new("debug")) {
                eprintln!("warning: could not enable debug logging: {e}");
            }
        }
    }
}

/// Result type shared by the subcommands.
pub type CliResult = Result<i32, Box<dyn Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_filter = init_tracing(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
        log_filter: Some(log_filter),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = match cli.command {
        Command::Fetch(ref args) => fetch::run(args, &global, &cancel).await,
        Command::ResolveLib(ref args) => library::resolve(args, &global, &cancel).await,
        Command::LibInfo => library::info(&global),
        Command::Versions => library::versions(&global, &cancel).await,
        Command::Cache(ref cmd) => cache::run(cmd, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {}", error_chain(e.as_ref()));
            process::exit(1);
        }
    }
}

/// Installs the log subscriber.
///
/// `--quiet` silences logging and `--verbose` selects debug level; otherwise
/// `RUST_LOG` applies with `info` as the fallback. The filter stays reloadable
/// so a `DEBUG` setting found during settings resolution can raise it.
fn init_tracing(quiet: bool, verbose: bool) -> LogFilterHandle {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
    handle
}

/// Joins an error and its sources with `: `.
fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        if !out.contains(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = cause.source();
    }
    out
}
