//! Layered exclusion patterns.
//!
//! Three layers make up the effective pattern set: fixed built-ins, the
//! per-user saved store and the repository-local ignore file. The saved store
//! is process-external state; every invocation loads it, merges and persists
//! explicitly.

use crate::error::{AppError, Result};
use indexmap::IndexSet;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub type PatternSet = IndexSet<String>;

pub const SAVED_PATTERNS_FILENAME: &str = "saved_patterns.txt";
pub const SAVED_PATTERNS_DIR: &str = "ctxsnap";

/// Trims whitespace, one leading path separator and trailing separators.
/// Returns `None` for blank lines and comments.
pub fn normalize_pattern(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let without_lead = trimmed
        .strip_prefix('/')
        .or_else(|| trimmed.strip_prefix('\\'))
        .unwrap_or(trimmed);
    let normalized = without_lead.trim_end_matches(&['/', '\\'] as &[char]);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

pub fn parse_patterns(content: &str) -> PatternSet {
    content.lines().filter_map(normalize_pattern).collect()
}

/// Reads a pattern file. A missing file is an empty contribution.
pub fn read_pattern_file(path: &Path) -> Result<PatternSet> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let patterns = parse_patterns(&content);
            log::debug!(
                "Loaded {} pattern(s) from {}",
                patterns.len(),
                path.display()
            );
            Ok(patterns)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("No pattern file at {}", path.display());
            Ok(PatternSet::new())
        }
        Err(e) => Err(AppError::FileRead {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Appends the patterns not yet present in `path`, creating the file and its
/// parent directories when needed. Returns the patterns actually written.
pub fn append_patterns<'a, I>(path: &Path, patterns: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = read_pattern_file(path)?;
    let to_add: Vec<String> = patterns
        .into_iter()
        .filter_map(normalize_pattern)
        .filter(|p| seen.insert(p.clone()))
        .collect();

    if to_add.is_empty() {
        log::debug!("No new patterns to append to {}", path.display());
        return Ok(to_add);
    }

    ensure_parent_dir(path)?;
    let needs_leading_newline = fs::read(path)
        .map(|bytes| !bytes.is_empty() && !bytes.ends_with(b"\n"))
        .unwrap_or(false);

    let write_err = |source| AppError::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    let mut buf = String::new();
    if needs_leading_newline {
        buf.push('\n');
    }
    for pattern in &to_add {
        buf.push_str(pattern);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes()).map_err(write_err)?;
    log::info!(
        "Appended {} pattern(s) to {}",
        to_add.len(),
        path.display()
    );
    Ok(to_add)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// `<user config dir>/ctxsnap/saved_patterns.txt`
pub fn default_saved_patterns_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SAVED_PATTERNS_DIR).join(SAVED_PATTERNS_FILENAME))
}

/// The per-user pattern store persisted across invocations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedPatterns {
    path: PathBuf,
    patterns: PatternSet,
}

impl SavedPatterns {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            patterns: read_pattern_file(path)?,
        })
    }

    /// Load, merge `patterns` in and append only the new entries.
    pub fn merge_and_persist<'a, I>(path: &Path, patterns: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        append_patterns(path, patterns)
    }

    /// Load, drop `patterns` and rewrite the store. Returns what was removed.
    pub fn remove_and_persist<'a, I>(path: &Path, patterns: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut store = Self::load(path)?;
        let removed: Vec<String> = patterns
            .into_iter()
            .filter_map(normalize_pattern)
            .filter(|p| store.patterns.shift_remove(p))
            .collect();
        if !removed.is_empty() {
            store.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let mut content = String::new();
        for pattern in &self.patterns {
            content.push_str(pattern);
            content.push('\n');
        }
        fs::write(&self.path, content).map_err(|e| AppError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;
        log::debug!(
            "Persisted {} saved pattern(s) to {}",
            self.patterns.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn into_patterns(self) -> PatternSet {
        self.patterns
    }
}

/// Pattern layers in precedence-free union order: built-in, saved, local.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct PatternStore {
    builtin: PatternSet,
    saved: PatternSet,
    local: PatternSet,
    extra: PatternSet,
}

impl PatternStore {
    pub fn load(
        builtin_files: &[String],
        builtin_dirs: &[String],
        local_ignore_path: &Path,
    ) -> Result<Self> {
        let builtin: PatternSet = builtin_files
            .iter()
            .chain(builtin_dirs)
            .filter_map(|p| normalize_pattern(p))
            .collect();
        let local = read_pattern_file(local_ignore_path)?;
        log::debug!(
            "Pattern store loaded: {} built-in, {} local",
            builtin.len(),
            local.len()
        );
        Ok(Self {
            builtin,
            local,
            ..Self::default()
        })
    }

    pub fn with_saved(mut self, saved: SavedPatterns) -> Self {
        self.saved = saved.into_patterns();
        self
    }

    /// Adds invocation-specific patterns (config extras, output files).
    pub fn with_extra<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra
            .extend(patterns.into_iter().filter_map(|p| normalize_pattern(p.as_ref())));
        self
    }

    pub fn builtin(&self) -> &PatternSet {
        &self.builtin
    }

    pub fn saved(&self) -> &PatternSet {
        &self.saved
    }

    pub fn local(&self) -> &PatternSet {
        &self.local
    }

    pub fn extra(&self) -> &PatternSet {
        &self.extra
    }

    /// Named layers in union order, for diagnostics.
    pub fn layers(&self) -> [(&'static str, &PatternSet); 4] {
        [
            ("built-in", &self.builtin),
            ("saved", &self.saved),
            ("local", &self.local),
            ("extra", &self.extra),
        ]
    }

    pub fn union(&self) -> PatternSet {
        self.builtin
            .iter()
            .chain(&self.saved)
            .chain(&self.local)
            .chain(&self.extra)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_strips_separators_and_comments() {
        assert_eq!(normalize_pattern("  /build/ "), Some("build".to_string()));
        assert_eq!(normalize_pattern("*.png"), Some("*.png".to_string()));
        assert_eq!(normalize_pattern("# comment"), None);
        assert_eq!(normalize_pattern("   "), None);
        assert_eq!(normalize_pattern("/"), None);
    }

    #[test]
    fn missing_local_file_contributes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = PatternStore::load(
            &["*.pyc".to_string()],
            &["node_modules".to_string()],
            &temp.path().join(".cursorignore"),
        )
        .unwrap();
        assert!(store.local().is_empty());
        assert_eq!(store.union().len(), 2);
    }

    #[test]
    fn local_file_is_parsed_line_by_line() {
        let temp = TempDir::new().unwrap();
        let ignore = temp.path().join(".cursorignore");
        fs::write(&ignore, "# generated\n/secrets\n\n*.bin\nsecrets\n").unwrap();

        let store = PatternStore::load(&[], &["node_modules".to_string()], &ignore).unwrap();
        let local: Vec<_> = store.local().iter().cloned().collect();
        assert_eq!(local, vec!["secrets".to_string(), "*.bin".to_string()]);
        assert!(store.union().contains("node_modules"));
    }

    #[test]
    fn union_collapses_duplicates_across_layers() {
        let temp = TempDir::new().unwrap();
        let ignore = temp.path().join(".cursorignore");
        fs::write(&ignore, "node_modules\n").unwrap();
        let store = PatternStore::load(&[], &["node_modules".to_string()], &ignore)
            .unwrap()
            .with_extra(["node_modules", "out.txt"]);
        assert_eq!(store.union().len(), 2);
    }

    #[test]
    fn saved_store_appends_without_duplicates() {
        let temp = TempDir::new().unwrap();
        let store_path = temp.path().join("nested").join(SAVED_PATTERNS_FILENAME);

        let added = SavedPatterns::merge_and_persist(&store_path, ["*.log", "dist"]).unwrap();
        assert_eq!(added, vec!["*.log".to_string(), "dist".to_string()]);

        let added =
            SavedPatterns::merge_and_persist(&store_path, ["dist", "/tmp/", "*.log"]).unwrap();
        assert_eq!(added, vec!["tmp".to_string()]);

        assert_eq!(fs::read_to_string(&store_path).unwrap(), "*.log\ndist\ntmp\n");
    }

    #[test]
    fn append_adds_newline_when_file_lacks_one() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".cursorignore");
        fs::write(&path, "keep").unwrap();
        append_patterns(&path, ["new"]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep\nnew\n");
    }

    #[test]
    fn remove_rewrites_store() {
        let temp = TempDir::new().unwrap();
        let store_path = temp.path().join(SAVED_PATTERNS_FILENAME);
        SavedPatterns::merge_and_persist(&store_path, ["a", "b", "c"]).unwrap();

        let removed = SavedPatterns::remove_and_persist(&store_path, ["b", "zzz"]).unwrap();
        assert_eq!(removed, vec!["b".to_string()]);

        let reloaded = SavedPatterns::load(&store_path).unwrap();
        let patterns: Vec<_> = reloaded.patterns().iter().cloned().collect();
        assert_eq!(patterns, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn saved_layer_joins_the_union() {
        let temp = TempDir::new().unwrap();
        let store_path = temp.path().join(SAVED_PATTERNS_FILENAME);
        SavedPatterns::merge_and_persist(&store_path, ["vendor"]).unwrap();

        let store = PatternStore::load(&[], &[], &temp.path().join("missing"))
            .unwrap()
            .with_saved(SavedPatterns::load(&store_path).unwrap());
        assert!(store.union().contains("vendor"));
        assert!(store.saved().contains("vendor"));
    }
}
