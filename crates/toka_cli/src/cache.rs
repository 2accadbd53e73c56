//! `toka cache`: inspect and clear the tokenizer and library caches.

use toka_cache::PrimaryCache;
use toka_common::ModelId;
use toka_native::{cached_library_path, clear_library_cache, Platform};

use crate::{context, CacheCommand, ClearArgs, CliResult, GlobalArgs};

/// Runs a `toka cache` subcommand.
pub fn run(cmd: &CacheCommand, global: &GlobalArgs) -> CliResult {
    let config = context::load(global)?;
    let settings = context::settings(&config, global);
    let cache = PrimaryCache::new(settings.cache.base_dir.clone());

    match cmd {
        CacheCommand::Info { model } => {
            let model = ModelId::parse(model).map_err(|e| format!("invalid model ID '{model}': {e}"))?;
            let info = cache.info(&model)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        CacheCommand::Clear(args) => clear(&cache, args, global)?,
        CacheCommand::ClearLib => {
            let path = cached_library_path(&settings.library, &Platform::current());
            let removed = clear_library_cache(&path)?;
            if !global.quiet {
                if removed {
                    eprintln!("  Removed {}", path.display());
                } else {
                    eprintln!("  No cached library at {}", path.display());
                }
            }
        }
    }
    Ok(0)
}

fn clear(
    cache: &PrimaryCache,
    args: &ClearArgs,
    global: &GlobalArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let message = if args.all {
        cache.clear_all()?;
        format!("Cleared all cached models in {}", cache.models_dir().display())
    } else if let Some(pattern) = &args.pattern {
        let cleared = cache.clear_matching(pattern)?;
        format!("Cleared {cleared} cached model(s) matching '{pattern}'")
    } else if let Some(model) = &args.model {
        let id = ModelId::parse(model).map_err(|e| format!("invalid model ID '{model}': {e}"))?;
        if cache.clear_model(&id)? {
            format!("Cleared cached model {id}")
        } else {
            format!("Model {id} was not cached")
        }
    } else {
        return Err("nothing to clear: give a model, --all or --pattern".into());
    };
    if !global.quiet {
        eprintln!("  {message}");
    }
    Ok(())
}
