//! `toka fetch`: resolve a tokenizer definition through the cache tiers.

use tokio_util::sync::CancellationToken;
use toka_cache::{ModelHub, Source};

use crate::{context, CliResult, FetchArgs, GlobalArgs};

/// Runs `toka fetch`.
///
/// Prints the cache path of the document, or writes the document to
/// `--output` when given.
pub async fn run(args: &FetchArgs, global: &GlobalArgs, cancel: &CancellationToken) -> CliResult {
    let mut config = context::load(global)?;
    if args.token.is_some() {
        config.hub.token = args.token.clone();
    }
    if args.offline {
        config.cache.offline = Some(true);
    }
    let settings = context::settings(&config, global);
    let client = context::client(&settings)?;
    let hub = ModelHub::new(client, &settings);

    let resolved = hub
        .fetch_tokenizer(&args.model, args.revision.as_deref(), cancel)
        .await?;

    if !global.quiet {
        let from = match resolved.source {
            Source::Primary => "cache",
            Source::Secondary => "hub cache",
            Source::Network => "network",
        };
        eprintln!(
            "  Resolved {} ({} bytes from {from})",
            args.model,
            resolved.bytes.len()
        );
    }

    match (&args.output, &resolved.path) {
        (Some(out), _) => {
            std::fs::write(out, &resolved.bytes)?;
            if !global.quiet {
                eprintln!("     Wrote {out}");
            }
        }
        (None, Some(path)) => println!("{}", path.display()),
        (None, None) => {
            use std::io::Write;
            std::io::stdout().write_all(&resolved.bytes)?;
        }
    }
    Ok(0)
}
