//! Native library subcommands: `resolve-lib`, `lib-info`, `versions`.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use toka_config::ProcessEnv;
use toka_native::{library_info, DylibLoader, LibraryResolver, ReleaseApi};

use crate::{context, CliResult, GlobalArgs, ResolveLibArgs};

/// Runs `toka resolve-lib`.
pub async fn resolve(
    args: &ResolveLibArgs,
    global: &GlobalArgs,
    cancel: &CancellationToken,
) -> CliResult {
    let config = context::load(global)?;
    let mut settings = context::settings(&config, global);
    if let Some(path) = &args.path {
        settings.library.explicit_path = Some(PathBuf::from(path));
    }
    if let Some(version) = &args.version {
        settings.library.version = version.clone();
    }
    let client = context::client(&settings)?;
    let resolver = LibraryResolver::new(&settings, client, Arc::new(DylibLoader));

    let lib = resolver.resolve(cancel).await?;
    if !global.quiet {
        eprintln!("  Loaded native library {} via {}", lib.version(), lib.provider());
    }
    println!("{}", lib.path().display());
    Ok(0)
}

/// Runs `toka lib-info`.
pub fn info(global: &GlobalArgs) -> CliResult {
    let config = context::load(global)?;
    let settings = context::settings(&config, global);
    let info = library_info(&settings.library, &ProcessEnv, &DylibLoader);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(0)
}

/// Runs `toka versions`.
pub async fn versions(global: &GlobalArgs, cancel: &CancellationToken) -> CliResult {
    let config = context::load(global)?;
    let settings = context::settings(&config, global);
    let client = context::client(&settings)?;
    let releases = ReleaseApi::new(client, &settings.library, &settings.transfer);

    let tags = releases.list_versions(cancel).await?;
    if tags.is_empty() && !global.quiet {
        eprintln!("  No releases published in {}", releases.repo());
    }
    for tag in tags {
        println!("{tag}");
    }
    Ok(0)
}
