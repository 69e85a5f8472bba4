use crate::cli_args::RulesArgs;
use crate::load_config_for_command;
use crate::watch;
use anyhow::{Context, Result};
use colored::*;
use ctxsnap_core::rules::{self, RulesOptions, RulesOutcome};
use ctxsnap_core::{AppError, Config};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn handle_rules_command(args: RulesArgs, quiet: bool, verbose: u8) -> Result<()> {
    let project_root = resolve_rules_root(args.project_root.as_ref())?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, args.config.as_ref(), args.no_config)
        .context("Failed to load configuration for rules command")?;

    let mut options = config
        .to_rules_options(&project_root)
        .context("Failed to resolve rules options")?;
    if let Some(rules_file) = &args.rules_file {
        options.rules_file = rules_file.clone();
    }

    run_update(&project_root, &options, quiet)?;

    if args.watch {
        let delay = watch_delay(&config, args.watch_delay.as_deref())?;
        watch::run_rules_watch(&project_root, &options, delay, quiet, verbose)?;
    }
    Ok(())
}

/// An explicit root is used as is; otherwise the nearest marked ancestor of
/// the current directory.
fn resolve_rules_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
    if cli_project_root.is_some() {
        return Config::determine_project_root(cli_project_root)
            .context("Failed to determine project root");
    }
    let cwd = env::current_dir()
        .map_err(AppError::Io)
        .context("Failed to read current directory")?;
    Ok(rules::find_project_root(&cwd))
}

fn watch_delay(config: &Config, cli_delay: Option<&str>) -> Result<Duration> {
    let mut config = config.clone();
    if let Some(raw) = cli_delay {
        config.watch.delay = raw.to_string();
    }
    Ok(config.get_watch_delay()?)
}

pub fn run_update(
    project_root: &Path,
    options: &RulesOptions,
    quiet: bool,
) -> Result<RulesOutcome> {
    let rules_path = options.rules_path(project_root);
    let outcome = rules::update_rules(project_root, options)
        .with_context(|| format!("Failed to update rules file {}", rules_path.display()))?;
    if !quiet {
        let label = match outcome {
            RulesOutcome::Created => "Created".green(),
            RulesOutcome::Updated => "Updated".green(),
            RulesOutcome::Unchanged => "Unchanged".dimmed(),
        };
        println!(
            "{} {} {}",
            "✅".green(),
            label,
            rules_path.display().to_string().blue()
        );
    }
    Ok(outcome)
}
