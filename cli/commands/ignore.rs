use crate::cli_args::{IgnoreAction, IgnoreArgs};
use crate::load_config_for_command;
use anyhow::{Context, Result};
use colored::*;
use ctxsnap_core::patterns::{self, PatternStore, SavedPatterns};
use ctxsnap_core::{AppError, Config, get_builtin_ignore_patterns};
use std::path::{Path, PathBuf};

pub fn handle_ignore_command(args: IgnoreArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    let config = load_config_for_command(
        &project_root,
        args.project_config.config.as_ref(),
        args.project_config.no_config,
    )
    .context("Failed to load configuration for ignore command")?;

    let store_path = resolve_store_path(args.store.as_ref(), &config)?;
    log::debug!("Saved pattern store: {}", store_path.display());

    match args.action {
        IgnoreAction::List {} => list_saved(&store_path, quiet),
        IgnoreAction::Add { patterns } => {
            let added = SavedPatterns::merge_and_persist(
                &store_path,
                patterns.iter().map(String::as_str),
            )
            .context("Failed to save patterns")?;
            report_changes("Saved", &added, &store_path, quiet);
            Ok(())
        }
        IgnoreAction::Remove { patterns } => {
            let removed =
                SavedPatterns::remove_and_persist(&store_path, patterns.iter().map(String::as_str))
                    .context("Failed to remove saved patterns")?;
            report_changes("Removed", &removed, &store_path, quiet);
            Ok(())
        }
        IgnoreAction::Apply { saved_only } => {
            let local_ignore = project_root.join(&config.general.local_ignore_file);
            let appended = apply_to_local(&store_path, &local_ignore, saved_only)?;
            report_changes("Appended", &appended, &local_ignore, quiet);
            Ok(())
        }
        IgnoreAction::Path {} => {
            println!("{}", store_path.display());
            Ok(())
        }
    }
}

fn resolve_store_path(cli_store: Option<&PathBuf>, config: &Config) -> Result<PathBuf> {
    cli_store
        .cloned()
        .or_else(|| config.saved_patterns_path())
        .ok_or_else(|| {
            AppError::Config(
                "Could not determine the user config directory; pass --store or set general.saved_patterns_file."
                    .to_string(),
            )
            .into()
        })
}

/// Appends built-ins (unless `saved_only`) and saved patterns to the local
/// ignore file, skipping entries it already has.
fn apply_to_local(store_path: &Path, local_ignore: &Path, saved_only: bool) -> Result<Vec<String>> {
    let saved = SavedPatterns::load(store_path).context("Failed to load saved patterns")?;
    let builtins = &get_builtin_ignore_patterns().snapshot;
    let (files, dirs): (&[String], &[String]) = if saved_only {
        (&[], &[])
    } else {
        (builtins.files.as_slice(), builtins.dirs.as_slice())
    };
    let store = PatternStore::load(files, dirs, local_ignore)
        .context("Failed to read local ignore file")?
        .with_saved(saved);

    let to_append = store.builtin().iter().chain(store.saved()).map(String::as_str);
    Ok(patterns::append_patterns(local_ignore, to_append)
        .with_context(|| format!("Failed to update {}", local_ignore.display()))?)
}

fn list_saved(store_path: &Path, quiet: bool) -> Result<()> {
    let saved = SavedPatterns::load(store_path).context("Failed to load saved patterns")?;
    if saved.patterns().is_empty() {
        if !quiet {
            println!("{}", "(No saved patterns)".dimmed());
        }
        return Ok(());
    }
    for pattern in saved.patterns() {
        println!("{}", pattern);
    }
    Ok(())
}

fn report_changes(verb: &str, changed: &[String], target: &Path, quiet: bool) {
    if quiet {
        return;
    }
    if changed.is_empty() {
        println!(
            "{} Nothing to do for {}",
            "ℹ️".blue(),
            target.display().to_string().dimmed()
        );
        return;
    }
    println!(
        "{} {} {} pattern(s) in {}",
        "✅".green(),
        verb,
        changed.len(),
        target.display().to_string().blue()
    );
    for pattern in changed {
        println!("  - {}", pattern.cyan());
    }
}
