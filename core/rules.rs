use crate::builtins::{get_builtin_ignore_patterns, get_default_system_prompt};
use crate::classify::{self, ExclusionMatcher};
use crate::error::{AppError, Result};
use crate::patterns::PatternStore;
use crate::region::{PROJECT_STRUCTURE, Placement, SYSTEM_PROMPT};
use crate::snapshot::DEFAULT_LOCAL_IGNORE_FILE;
use crate::tree;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_RULES_FILENAME: &str = ".cursorrules";

/// Files or directories whose presence marks a project root.
pub const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
    "requirements.txt",
];

/// Walks upward from `start` to the first directory holding a project marker.
/// Falls back to `start` when none is found.
pub fn find_project_root(start: &Path) -> PathBuf {
    for dir in start.ancestors() {
        if let Some(marker) = PROJECT_MARKERS.iter().find(|m| dir.join(m).exists()) {
            log::debug!("Project root {} (marker '{}')", dir.display(), marker);
            return dir.to_path_buf();
        }
    }
    log::debug!(
        "No project marker above {}, using it as root",
        start.display()
    );
    start.to_path_buf()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulesOptions {
    /// Relative paths resolve against the project root.
    pub rules_file: PathBuf,
    pub local_ignore_file: PathBuf,
    pub extra_patterns: Vec<String>,
    pub system_prompt: String,
}

impl RulesOptions {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            rules_file: PathBuf::from(DEFAULT_RULES_FILENAME),
            local_ignore_file: PathBuf::from(DEFAULT_LOCAL_IGNORE_FILE),
            extra_patterns: Vec::new(),
            system_prompt: system_prompt.into(),
        }
    }

    pub fn with_default_prompt() -> Result<Self> {
        Ok(Self::new(get_default_system_prompt()?))
    }

    pub fn rules_path(&self, root: &Path) -> PathBuf {
        root.join(&self.rules_file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesOutcome {
    Created,
    Updated,
    Unchanged,
}

/// The heavier rules built-ins ∪ local ignore ∪ extras.
pub fn build_rules_patterns(root: &Path, options: &RulesOptions) -> Result<PatternStore> {
    let builtins = &get_builtin_ignore_patterns().rules;
    let local_ignore = root.join(&options.local_ignore_file);
    Ok(PatternStore::load(&builtins.files, &builtins.dirs, &local_ignore)?
        .with_extra(&options.extra_patterns))
}

/// Rules patterns plus the rules file itself, matched by its exact path.
pub fn rules_matcher(root: &Path, options: &RulesOptions) -> Result<ExclusionMatcher> {
    let rules_rel = classify::relative_within(&options.rules_path(root), root);
    Ok(ExclusionMatcher::new(&build_rules_patterns(root, options)?.union())?
        .with_exact_path(rules_rel))
}

pub fn generate_rules_tree(root: &Path, options: &RulesOptions) -> Result<Vec<String>> {
    tree::generate_tree(root, &rules_matcher(root, options)?)
}

/// Splices both generated regions into `existing`. The system prompt goes to
/// the top and the tree to the bottom when they are not present yet. The
/// tree region is never searched for inside the system prompt block.
pub fn merge_rules_document(
    existing: &str,
    tree_lines: &[String],
    system_prompt: &str,
    path: &Path,
) -> Result<String> {
    let to_merge_error = |e: crate::region::UnterminatedRegion| AppError::RulesMerge {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let with_prompt = SYSTEM_PROMPT
        .splice(existing, system_prompt.trim(), Placement::Start)
        .map_err(to_merge_error)?;
    let prompt_range = SYSTEM_PROMPT.find(&with_prompt).map_err(to_merge_error)?;
    PROJECT_STRUCTURE
        .splice_outside(
            &with_prompt,
            &tree_lines.join("\n"),
            Placement::End,
            prompt_range.as_ref(),
        )
        .map_err(to_merge_error)
}

/// Regenerates the rules file in place. Running it twice without filesystem
/// changes leaves the file byte-identical.
pub fn update_rules(root: &Path, options: &RulesOptions) -> Result<RulesOutcome> {
    let rules_path = options.rules_path(root);
    log::info!("Updating rules file {}", rules_path.display());

    let tree_lines = generate_rules_tree(root, options)?;

    let existing = match fs::read_to_string(&rules_path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(AppError::FileRead {
                path: rules_path,
                source: e,
            });
        }
    };

    let merged = merge_rules_document(
        existing.as_deref().unwrap_or(""),
        &tree_lines,
        &options.system_prompt,
        &rules_path,
    )?;

    let outcome = match existing {
        Some(ref current) if *current == merged => RulesOutcome::Unchanged,
        Some(_) => RulesOutcome::Updated,
        None => RulesOutcome::Created,
    };
    if outcome != RulesOutcome::Unchanged {
        fs::write(&rules_path, &merged).map_err(|e| AppError::FileWrite {
            path: rules_path.clone(),
            source: e,
        })?;
    }
    log::debug!("Rules file {}: {:?}", rules_path.display(), outcome);
    Ok(outcome)
}
