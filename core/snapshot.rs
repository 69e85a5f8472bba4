//! Codebase snapshot: a tree block followed by one fenced block per file.
//!
//! ```text
//! <project_structure>
//! ├── a.py
//! </project_structure>
//!
//! <file path="a.py">
//! ```python
//! print(1)
//! ```
//! </file>
//! ```

use crate::builtins::get_builtin_ignore_patterns;
use crate::classify::{self, BINARY_PLACEHOLDER, ExclusionMatcher, FileContent};
use crate::error::{AppError, Result};
use crate::patterns::PatternStore;
use crate::region::PROJECT_STRUCTURE;
use crate::tree::{self, WalkedEntry};
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_LOCAL_IGNORE_FILE: &str = ".cursorignore";
pub const DEFAULT_SNAPSHOT_FILENAME: &str = "codebase_snapshot.txt";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOptions {
    pub include_markdown: bool,
    pub max_file_size: u64,
    /// Relative paths resolve against the snapshot root.
    pub local_ignore_file: PathBuf,
    pub extra_patterns: Vec<String>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_markdown: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            local_ignore_file: PathBuf::from(DEFAULT_LOCAL_IGNORE_FILE),
            extra_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordContent {
    Text(String),
    Binary,
    Oversized(u64),
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub relative_path: String,
    pub language: &'static str,
    pub content: RecordContent,
}

impl FileRecord {
    pub fn is_error(&self) -> bool {
        matches!(self.content, RecordContent::Unreadable(_))
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!("<file path=\"{}\">\n", self.relative_path));
        out.push_str("```");
        out.push_str(self.language);
        out.push('\n');
        match &self.content {
            RecordContent::Text(text) => {
                out.push_str(text);
                if !text.is_empty() && !text.ends_with('\n') {
                    out.push('\n');
                }
            }
            RecordContent::Binary => {
                out.push_str(BINARY_PLACEHOLDER);
                out.push('\n');
            }
            RecordContent::Oversized(size) => {
                out.push_str(&format!(
                    "[File too large: {:.2}MB]\n",
                    *size as f64 / BYTES_PER_MB
                ));
            }
            RecordContent::Unreadable(message) => {
                out.push_str(&format!("[Error reading file: {}]\n", message));
            }
        }
        out.push_str("```\n</file>\n\n");
    }
}

/// Tree lines plus the ordered list of files whose content will be emitted.
#[derive(Debug, Clone)]
pub struct SnapshotPlan {
    pub tree_lines: Vec<String>,
    pub files: Vec<WalkedEntry>,
}

#[derive(Debug, Clone)]
pub struct SnapshotDocument {
    pub text: String,
    pub files_processed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct SnapshotSummary {
    pub output_path: PathBuf,
    pub files_processed: usize,
    pub errors: usize,
    pub bytes_written: usize,
}

impl SnapshotDocument {
    pub fn write_to(&self, output_path: &Path) -> Result<SnapshotSummary> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(output_path, &self.text).map_err(|e| AppError::FileWrite {
            path: output_path.to_path_buf(),
            source: e,
        })?;
        log::info!(
            "Snapshot written to {} ({} bytes)",
            output_path.display(),
            self.text.len()
        );
        Ok(SnapshotSummary {
            output_path: output_path.to_path_buf(),
            files_processed: self.files_processed,
            errors: self.errors,
            bytes_written: self.text.len(),
        })
    }
}

/// Relative paths are taken from the current directory; an existing parent
/// is canonicalized so it compares equal to a canonical root.
pub fn absolute_output_path(output_path: &Path) -> Result<PathBuf> {
    let absolute = if output_path.is_absolute() {
        output_path.to_path_buf()
    } else {
        env::current_dir()?.join(output_path)
    };
    let canonical_parent = absolute.parent().and_then(|p| p.canonicalize().ok());
    Ok(match (canonical_parent, absolute.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => absolute,
    })
}

/// Built-ins ∪ local ignore file ∪ extras.
pub fn build_snapshot_patterns(root: &Path, options: &SnapshotOptions) -> Result<PatternStore> {
    let builtins = &get_builtin_ignore_patterns().snapshot;
    let local_ignore = root.join(&options.local_ignore_file);
    Ok(PatternStore::load(&builtins.files, &builtins.dirs, &local_ignore)?
        .with_extra(&options.extra_patterns))
}

/// Root-relative path of the output file, or `None` when it is written
/// outside `root`.
pub fn output_exclusion(root: &Path, output_path: &Path) -> Result<Option<String>> {
    let absolute = absolute_output_path(output_path)?;
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let relative = classify::relative_within(&absolute, &canonical_root);
    match &relative {
        Some(rel) => log::debug!("Excluding snapshot output file: {}", rel),
        None => log::debug!(
            "Snapshot output {} is outside the root, nothing to exclude",
            absolute.display()
        ),
    }
    Ok(relative)
}

pub fn plan_snapshot(
    root: &Path,
    output_path: Option<&Path>,
    options: &SnapshotOptions,
) -> Result<SnapshotPlan> {
    let store = build_snapshot_patterns(root, options)?;
    let output_rule = match output_path {
        Some(output) => output_exclusion(root, output)?,
        None => None,
    };
    let matcher = ExclusionMatcher::new(&store.union())?.with_exact_path(output_rule);

    let tree_lines = tree::generate_tree(root, &matcher)?;

    let files: Vec<WalkedEntry> = tree::walk_entries(root, &matcher)?
        .into_iter()
        .filter(|entry| !entry.is_dir && entry.path.is_file())
        .filter(|entry| {
            let document = classify::is_document(&entry.path, options.include_markdown);
            if document {
                log::trace!("Skipping document: {}", entry.relative_path.display());
            }
            !document
        })
        .collect();
    log::debug!(
        "Snapshot plan: {} tree lines, {} files",
        tree_lines.len(),
        files.len()
    );
    Ok(SnapshotPlan { tree_lines, files })
}

pub fn read_record(entry: &WalkedEntry, max_file_size: u64) -> FileRecord {
    let relative_path = classify::normalize_relative(&entry.relative_path);
    let language = classify::language_for_path(&entry.path);
    let content = match fs::metadata(&entry.path) {
        Ok(meta) if meta.len() > max_file_size => {
            log::debug!("{} exceeds size cap ({} bytes)", relative_path, meta.len());
            RecordContent::Oversized(meta.len())
        }
        Ok(_) => match classify::read_file_content(&entry.path) {
            Ok(FileContent::Text(text)) => RecordContent::Text(text),
            Ok(FileContent::Binary) => RecordContent::Binary,
            Err(e) => {
                log::warn!("Error reading {}: {}", relative_path, e);
                RecordContent::Unreadable(e.to_string())
            }
        },
        Err(e) => {
            log::warn!("Error reading metadata for {}: {}", relative_path, e);
            RecordContent::Unreadable(e.to_string())
        }
    };
    FileRecord {
        relative_path,
        language,
        content,
    }
}

pub fn render_document(tree_lines: &[String], records: &[FileRecord]) -> String {
    let mut out = PROJECT_STRUCTURE.render(&tree_lines.join("\n"));
    out.push_str("\n\n");
    for record in records {
        record.render_into(&mut out);
    }
    out
}

pub fn build_snapshot(
    root: &Path,
    output_path: Option<&Path>,
    options: &SnapshotOptions,
) -> Result<SnapshotDocument> {
    log::info!("Building snapshot for {}", root.display());
    let plan = plan_snapshot(root, output_path, options)?;

    let records: Vec<FileRecord> = plan
        .files
        .iter()
        .map(|entry| read_record(entry, options.max_file_size))
        .collect();
    let errors = records.iter().filter(|r| r.is_error()).count();

    Ok(SnapshotDocument {
        text: render_document(&plan.tree_lines, &records),
        files_processed: records.len() - errors,
        errors,
    })
}

pub fn create_snapshot(
    root: &Path,
    output_path: &Path,
    options: &SnapshotOptions,
) -> Result<SnapshotSummary> {
    build_snapshot(root, Some(output_path), options)?.write_to(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn record(rel: &str, content: RecordContent) -> FileRecord {
        FileRecord {
            relative_path: rel.to_string(),
            language: "",
            content,
        }
    }

    #[test]
    fn placeholders_render_exactly() {
        let mut out = String::new();
        record("big.txt", RecordContent::Oversized(DEFAULT_MAX_FILE_SIZE + 1))
            .render_into(&mut out);
        assert_eq!(
            out,
            "<file path=\"big.txt\">\n```\n[File too large: 10.00MB]\n```\n</file>\n\n"
        );

        let mut out = String::new();
        record("x", RecordContent::Unreadable("denied".into())).render_into(&mut out);
        assert!(out.contains("[Error reading file: denied]\n"));
    }

    #[test]
    fn text_without_trailing_newline_gets_one() {
        let mut out = String::new();
        record("a", RecordContent::Text("one\n".into())).render_into(&mut out);
        assert_eq!(out, "<file path=\"a\">\n```\none\n```\n</file>\n\n");
    }

    #[test]
    fn size_cap_boundary() {
        let temp = TempDir::new().unwrap();
        let cap = 16;
        write(temp.path(), "exact.txt", &vec![b'a'; cap as usize]);
        write(temp.path(), "over.txt", &vec![b'a'; cap as usize + 1]);

        let options = SnapshotOptions {
            max_file_size: cap,
            ..SnapshotOptions::default()
        };
        let plan = plan_snapshot(temp.path(), None, &options).unwrap();
        let records: Vec<_> = plan.files.iter().map(|f| read_record(f, cap)).collect();

        assert_eq!(records[0].relative_path, "exact.txt");
        assert_eq!(records[0].content, RecordContent::Text("a".repeat(16)));
        assert_eq!(records[1].content, RecordContent::Oversized(17));
    }

    #[test]
    fn markdown_toggle_affects_content_but_not_tree() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "README.md", b"# hi");
        write(temp.path(), "main.rs", b"fn main() {}");

        let plan = plan_snapshot(temp.path(), None, &SnapshotOptions::default()).unwrap();
        assert_eq!(plan.tree_lines, vec!["├── README.md", "├── main.rs"]);
        assert_eq!(plan.files.len(), 1);

        let options = SnapshotOptions {
            include_markdown: true,
            ..SnapshotOptions::default()
        };
        let plan = plan_snapshot(temp.path(), None, &options).unwrap();
        assert_eq!(plan.files.len(), 2);
    }

    #[test]
    fn output_file_excludes_itself() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "main.rs", b"fn main() {}");
        let output = temp.path().join(DEFAULT_SNAPSHOT_FILENAME);

        create_snapshot(temp.path(), &output, &SnapshotOptions::default()).unwrap();
        let first = fs::read_to_string(&output).unwrap();
        create_snapshot(temp.path(), &output, &SnapshotOptions::default()).unwrap();
        let second = fs::read_to_string(&output).unwrap();

        assert!(!second.contains(DEFAULT_SNAPSHOT_FILENAME));
        assert_eq!(first, second);
    }

    #[test]
    fn size_cap_boundary_at_default_limit() {
        let temp = TempDir::new().unwrap();
        for (name, len) in [
            ("exact.bin", DEFAULT_MAX_FILE_SIZE),
            ("over.bin", DEFAULT_MAX_FILE_SIZE + 1),
        ] {
            fs::File::create(temp.path().join(name))
                .unwrap()
                .set_len(len)
                .unwrap();
        }

        let plan = plan_snapshot(temp.path(), None, &SnapshotOptions::default()).unwrap();
        let records: Vec<_> = plan
            .files
            .iter()
            .map(|f| read_record(f, DEFAULT_MAX_FILE_SIZE))
            .collect();

        assert_eq!(records[0].relative_path, "exact.bin");
        assert_eq!(records[0].content, RecordContent::Binary);
        assert_eq!(records[1].relative_path, "over.bin");
        assert_eq!(
            records[1].content,
            RecordContent::Oversized(DEFAULT_MAX_FILE_SIZE + 1)
        );
    }

    #[test]
    fn output_at_root_keeps_nested_files_with_the_same_name() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "tests/fixtures/snapshot.txt", b"nested fixture");
        let output = temp.path().join("snapshot.txt");

        create_snapshot(temp.path(), &output, &SnapshotOptions::default()).unwrap();
        create_snapshot(temp.path(), &output, &SnapshotOptions::default()).unwrap();
        let text = fs::read_to_string(&output).unwrap();

        assert!(text.contains("<file path=\"tests/fixtures/snapshot.txt\">"));
        assert!(text.contains("nested fixture"));
        assert!(!text.contains("<file path=\"snapshot.txt\">"));
    }

    #[test]
    fn output_outside_root_excludes_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("proj");
        write(&root, "lib.rs", b"pub fn top() {}");
        write(&root, "src/lib.rs", b"pub fn nested() {}");
        let output = temp.path().join("lib.rs");

        create_snapshot(&root, &output, &SnapshotOptions::default()).unwrap();
        let text = fs::read_to_string(&output).unwrap();

        assert!(text.contains("├── lib.rs\n"));
        assert!(text.contains("<file path=\"lib.rs\">"));
        assert!(text.contains("<file path=\"src/lib.rs\">"));
        assert_eq!(output_exclusion(&root, &output).unwrap(), None);
    }

    #[test]
    fn local_ignore_and_extras_apply() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".cursorignore", b"# local\n/secret\n");
        write(temp.path(), "secret/key.pem", b"k");
        write(temp.path(), "vendor/lib.js", b"v");
        write(temp.path(), "app.js", b"a");

        let options = SnapshotOptions {
            extra_patterns: vec!["vendor".to_string()],
            ..SnapshotOptions::default()
        };
        let plan = plan_snapshot(temp.path(), None, &options).unwrap();
        let files: Vec<_> = plan
            .files
            .iter()
            .map(|f| classify::normalize_relative(&f.relative_path))
            .collect();
        assert_eq!(files, vec![".cursorignore", "app.js"]);
    }
}
