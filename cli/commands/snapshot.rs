use crate::cli_args::SnapshotArgs;
use crate::load_config_for_command;
use crate::output::print_data_or_text;
use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use colored::*;
use ctxsnap_core::snapshot::{self, SnapshotDocument};
use ctxsnap_core::{Config, SnapshotSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tiktoken_rs::cl100k_base;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotReport {
    #[serde(flatten)]
    summary: SnapshotSummary,
    size_readable: String,
    estimated_tokens: usize,
}

pub fn handle_snapshot_command(args: SnapshotArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(
        &project_root,
        args.project_config.config.as_ref(),
        args.project_config.no_config,
    )
    .context("Failed to load configuration for snapshot command")?;

    let mut options = config
        .to_snapshot_options()
        .context("Invalid snapshot configuration")?;
    if args.include_markdown {
        options.include_markdown = true;
    }

    let output_path = resolve_output_path(&project_root, args.output.as_deref(), &config);
    log::debug!("Snapshot output path: {}", output_path.display());

    let document = snapshot::build_snapshot(&project_root, Some(&output_path), &options)
        .context("Failed to build snapshot")?;
    let summary = document
        .write_to(&output_path)
        .context("Failed to write snapshot")?;

    let report = SnapshotReport {
        size_readable: readable_size(summary.bytes_written),
        estimated_tokens: estimate_tokens(&document),
        summary,
    };

    if quiet && args.format_output.format.is_none() {
        return Ok(());
    }
    print_data_or_text(
        &report,
        Some(render_report_text(&report)),
        &args.format_output,
        "text",
    )
}

/// A CLI path is taken as given; the configured default is relative to the
/// project root.
fn resolve_output_path(project_root: &Path, cli_output: Option<&Path>, config: &Config) -> PathBuf {
    match cli_output {
        Some(path) => path.to_path_buf(),
        None if config.snapshot.output.is_absolute() => config.snapshot.output.clone(),
        None => project_root.join(&config.snapshot.output),
    }
}

fn readable_size(bytes: usize) -> String {
    Byte::from_u128(bytes as u128)
        .unwrap_or_default()
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

fn estimate_tokens(document: &SnapshotDocument) -> usize {
    match cl100k_base() {
        Ok(bpe) => bpe.encode_ordinary(&document.text).len(),
        Err(e) => {
            log::warn!("Token estimate unavailable: {}", e);
            0
        }
    }
}

fn render_report_text(report: &SnapshotReport) -> String {
    let summary = &report.summary;
    let mut text = format!(
        "{} Snapshot saved to: {}\n",
        "✅".green(),
        summary.output_path.display().to_string().blue()
    );
    text.push_str(&format!(
        "{:<18} {}\n",
        "Files processed:".green(),
        summary.files_processed.to_string().cyan()
    ));
    if summary.errors > 0 {
        text.push_str(&format!(
            "{:<18} {}\n",
            "Errors:".yellow(),
            summary.errors.to_string().yellow()
        ));
    }
    text.push_str(&format!(
        "{:<18} {}\n",
        "Size:".green(),
        report.size_readable.cyan()
    ));
    text.push_str(&format!(
        "{:<18} {}\n",
        "Est. tokens:".green(),
        report.estimated_tokens.to_string().cyan()
    ));
    text
}
