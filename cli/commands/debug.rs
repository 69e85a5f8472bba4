use crate::cli_args::DebugArgs;
use crate::load_config_for_command;
use crate::output::print_data_or_text;
use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use ctxsnap_core::classify;
use ctxsnap_core::snapshot;
use ctxsnap_core::{Config, PatternSet, PatternStore, SavedPatterns};
use serde::Serialize;
use std::path::{Path, PathBuf};

const PATTERN_PREVIEW_LIMIT: usize = 6;

#[derive(Debug, Serialize)]
struct DebugInfo<'a> {
    effective_config: &'a Config,
    project_root: &'a Path,
    snapshot_output: PathBuf,
    output_exclusion: Option<String>,
    pattern_layers: PatternStore,
    tree_lines: Vec<String>,
    files_to_include: Vec<String>,
}

pub fn handle_debug_command(args: DebugArgs) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(
        &project_root,
        args.project_config.config.as_ref(),
        args.project_config.no_config,
    )
    .context("Failed to load configuration for debug command")?;

    let options = config
        .to_snapshot_options()
        .context("Invalid snapshot configuration")?;
    let snapshot_output = project_root.join(&config.snapshot.output);

    let mut pattern_layers = snapshot::build_snapshot_patterns(&project_root, &options)
        .context("Failed to load pattern layers")?;
    let output_exclusion = snapshot::output_exclusion(&project_root, &snapshot_output)
        .context("Failed to resolve snapshot output path")?;
    if let Some(store_path) = config.saved_patterns_path() {
        match SavedPatterns::load(&store_path) {
            Ok(saved) => pattern_layers = pattern_layers.with_saved(saved),
            Err(e) => log::warn!("Could not read saved patterns: {}", e),
        }
    }

    let plan = snapshot::plan_snapshot(&project_root, Some(&snapshot_output), &options)
        .context("Failed to plan snapshot")?;

    let debug_data = DebugInfo {
        effective_config: &config,
        project_root: &project_root,
        snapshot_output,
        output_exclusion,
        pattern_layers,
        files_to_include: plan
            .files
            .iter()
            .map(|f| classify::normalize_relative(&f.relative_path))
            .collect(),
        tree_lines: plan.tree_lines,
    };

    if args.format_output.format.is_none() {
        print_debug_info_pretty(&debug_data)
    } else {
        print_data_or_text(&debug_data, None, &args.format_output, "json")
    }
}

fn print_debug_info_pretty(debug_info: &DebugInfo) -> Result<()> {
    println!(
        "{}",
        "\n--- Effective Configuration ---"
            .green()
            .bold()
            .underline()
    );
    let config_toml = toml::to_string_pretty(debug_info.effective_config)
        .context("Failed to serialize effective config to TOML")?;
    println!("{}", config_toml);

    println!("{}", "\n--- Pattern Layers ---".green().bold().underline());
    println!("{table}", table = pattern_layer_table(&debug_info.pattern_layers));
    println!(
        "{}",
        "Saved patterns feed `ignore apply`; snapshots read the local ignore file.".dimmed()
    );
    match &debug_info.output_exclusion {
        Some(rel) => println!("Snapshot output excluded by exact path: {}", rel.cyan()),
        None => println!(
            "{}",
            format!(
                "Snapshot output {} is outside the project root.",
                debug_info.snapshot_output.display()
            )
            .dimmed()
        ),
    }

    println!("{}", "\n--- Tree ---".green().bold().underline());
    if debug_info.tree_lines.is_empty() {
        println!("{}", "(Empty)".dimmed());
    } else {
        debug_info.tree_lines.iter().for_each(|line| println!("{}", line));
    }

    println!("{}", "\n--- Files Included ---".green().bold().underline());
    if debug_info.files_to_include.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        debug_info
            .files_to_include
            .iter()
            .for_each(|p| println!("- {}", p.cyan()));
    }

    println!("{}", "\n--- End Debug Info ---".green().bold());
    Ok(())
}

fn pattern_layer_table(store: &PatternStore) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Layer").fg(Color::Green),
        Cell::new("Count").fg(Color::Green),
        Cell::new("Patterns").fg(Color::Green),
    ]);
    for (name, patterns) in store.layers() {
        table.add_row(vec![
            Cell::new(name).fg(Color::Cyan),
            Cell::new(patterns.len()).set_alignment(comfy_table::CellAlignment::Right),
            Cell::new(preview(patterns)).fg(Color::DarkGrey),
        ]);
    }
    table
}

fn preview(patterns: &PatternSet) -> String {
    let shown: Vec<&str> = patterns
        .iter()
        .take(PATTERN_PREVIEW_LIMIT)
        .map(String::as_str)
        .collect();
    let mut text = shown.join(", ");
    if patterns.len() > PATTERN_PREVIEW_LIMIT {
        text.push_str(&format!(", … (+{})", patterns.len() - PATTERN_PREVIEW_LIMIT));
    }
    text
}
