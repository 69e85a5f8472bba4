use anyhow::Result;
use ctxsnap_core::AppError;
use ctxsnap_core::rules::RulesOptions;
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "watch")]
use {
    crate::commands::rules::run_update,
    colored::*,
    ctxsnap_core::ExclusionMatcher,
    ctxsnap_core::rules::rules_matcher,
    notify::{Event, EventKind, RecursiveMode, Watcher, event::ModifyKind},
    std::sync::mpsc::{self, Receiver, RecvTimeoutError},
    std::time::Instant,
};

#[cfg(feature = "watch")]
const WATCH_REMEDIATION: &str = "On Linux, raise fs.inotify.max_user_watches or \
     fs.inotify.max_user_instances; elsewhere check that the directory is on a local filesystem.";

/// Only additions, removals and renames change the tree.
#[cfg(feature = "watch")]
fn is_structural(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

#[cfg(feature = "watch")]
fn is_relevant(
    event: &notify::Result<Event>,
    project_root: &Path,
    matcher: &ExclusionMatcher,
) -> bool {
    match event {
        Ok(event) => {
            is_structural(&event.kind)
                && event.paths.iter().any(|path| {
                    path.strip_prefix(project_root).is_ok_and(|rel| {
                        !rel.as_os_str().is_empty() && !matcher.should_exclude(rel)
                    })
                })
        }
        Err(e) => {
            log::warn!("Watch error: {}", e);
            false
        }
    }
}

/// Drains the channel until `quiet_period` passes without an item that
/// `extends` accepts. Other items are consumed without moving the deadline.
/// Returns the number of accepted items and whether the sender side has gone
/// away.
#[cfg(feature = "watch")]
fn drain_until_quiet<T>(
    rx: &Receiver<T>,
    quiet_period: Duration,
    extends: impl Fn(&T) -> bool,
) -> (usize, bool) {
    let mut accepted = 0;
    let mut deadline = Instant::now() + quiet_period;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return (accepted, false);
        }
        match rx.recv_timeout(remaining) {
            Ok(item) if extends(&item) => {
                accepted += 1;
                deadline = Instant::now() + quiet_period;
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => return (accepted, false),
            Err(RecvTimeoutError::Disconnected) => return (accepted, true),
        }
    }
}

/// Blocks until the watcher goes away, regenerating the rules file once per
/// burst of structural changes.
#[cfg(feature = "watch")]
pub fn run_rules_watch(
    project_root: &Path,
    options: &RulesOptions,
    delay: Duration,
    quiet: bool,
    verbose: u8,
) -> Result<()> {
    let unavailable = |e: notify::Error| {
        AppError::WatchUnavailable(format!("{}. {}", e, WATCH_REMEDIATION))
    };
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx).map_err(unavailable)?;
    watcher
        .watch(project_root, RecursiveMode::Recursive)
        .map_err(unavailable)?;

    if !quiet {
        println!(
            "👀 Watching '{}' for structural changes. Press Ctrl+C to exit.",
            project_root.display()
        );
    }

    let mut matcher = rules_matcher(project_root, options)?;
    loop {
        let Ok(first) = rx.recv() else {
            log::debug!("Watcher channel closed, leaving watch mode.");
            return Ok(());
        };
        if !is_relevant(&first, project_root, &matcher) {
            log::trace!("Ignoring event: {:?}", first);
            continue;
        }

        let (burst, disconnected) =
            drain_until_quiet(&rx, delay, |event| is_relevant(event, project_root, &matcher));
        log::debug!("Structural change detected, {} more in the same burst.", burst);
        if !quiet && verbose > 0 {
            eprintln!("{} {} structural event(s) detected.", "🔄".blue(), burst + 1);
        }

        if let Err(e) = run_update(project_root, options, quiet) {
            if !quiet {
                eprintln!("{} {:#}", "⚠️ Error updating rules:".yellow(), e);
            }
            log::error!("Rules update failed: {:#}", e);
        }
        match rules_matcher(project_root, options) {
            Ok(updated) => matcher = updated,
            Err(e) => log::warn!("Keeping previous exclusion patterns: {}", e),
        }

        if disconnected {
            log::debug!("Watcher channel closed, leaving watch mode.");
            return Ok(());
        }
    }
}

#[cfg(not(feature = "watch"))]
pub fn run_rules_watch(
    _project_root: &Path,
    _options: &RulesOptions,
    _delay: Duration,
    _quiet: bool,
    _verbose: u8,
) -> Result<()> {
    Err(AppError::WatchUnavailable(
        "this build was compiled without the `watch` feature. Rebuild with `--features watch`."
            .to_string(),
    )
    .into())
}
