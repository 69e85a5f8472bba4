use crate::classify::ExclusionMatcher;
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ANCESTOR_GLYPH: &str = "│   ";
const BRANCH_GLYPH: &str = "├── ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedEntry {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    /// 1 for direct children of the root.
    pub depth: usize,
    pub is_dir: bool,
}

impl WalkedEntry {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn ensure_directory(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!(
            "Not a directory: {}",
            root.display()
        )))
    }
}

/// Depth-first, name-sorted walk below `root`. Excluded entries are skipped
/// and excluded directories are never descended into.
pub fn walk_entries(root: &Path, matcher: &ExclusionMatcher) -> Result<Vec<WalkedEntry>> {
    ensure_directory(root)?;
    log::debug!("Walking directory: {}", root.display());

    let relative =
        |path: &Path| pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !matcher.should_exclude(&relative(entry.path())));

    let mut entries = Vec::new();
    for entry_result in walker {
        match entry_result {
            Ok(entry) => {
                let relative_path = relative(entry.path());
                log::trace!("Walked path: {}", relative_path.display());
                entries.push(WalkedEntry {
                    is_dir: entry.file_type().is_dir(),
                    depth: entry.depth(),
                    path: entry.into_path(),
                    relative_path,
                });
            }
            Err(e) => {
                log::warn!(
                    "Error walking directory: {} (at {})",
                    e,
                    e.path()
                        .map_or_else(|| "unknown path".into(), |p| p.display().to_string())
                );
            }
        }
    }
    log::debug!("Walk complete, {} entries kept.", entries.len());
    Ok(entries)
}

pub fn render_tree_lines(entries: &[WalkedEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}{}{}",
                ANCESTOR_GLYPH.repeat(entry.depth.saturating_sub(1)),
                BRANCH_GLYPH,
                entry.name()
            )
        })
        .collect()
}

pub fn generate_tree(root: &Path, matcher: &ExclusionMatcher) -> Result<Vec<String>> {
    Ok(render_tree_lines(&walk_entries(root, matcher)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternSet;
    use std::fs;
    use tempfile::TempDir;

    fn matcher(patterns: &[&str]) -> ExclusionMatcher {
        let set: PatternSet = patterns.iter().map(|p| p.to_string()).collect();
        ExclusionMatcher::new(&set).unwrap()
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn tree_is_sorted_and_indented() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/main.rs");
        touch(temp.path(), "src/lib/util.rs");
        touch(temp.path(), "b.txt");
        touch(temp.path(), "a.txt");

        let lines = generate_tree(temp.path(), &matcher(&[])).unwrap();
        assert_eq!(
            lines,
            vec![
                "├── a.txt",
                "├── b.txt",
                "├── src",
                "│   ├── lib",
                "│   │   ├── util.rs",
                "│   ├── main.rs",
            ]
        );
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "node_modules/pkg/index.js");
        touch(temp.path(), "app.js");

        let lines = generate_tree(temp.path(), &matcher(&["node_modules"])).unwrap();
        assert_eq!(lines, vec!["├── app.js"]);
    }

    #[test]
    fn children_of_excluded_glob_directory_do_not_leak() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "generated/keep.rs");
        touch(temp.path(), "main.rs");

        let entries = walk_entries(temp.path(), &matcher(&["gen*"])).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["main.rs"]);
    }

    #[test]
    fn empty_or_fully_excluded_directory_yields_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(generate_tree(temp.path(), &matcher(&[])).unwrap().is_empty());

        touch(temp.path(), "only.log");
        assert!(generate_tree(temp.path(), &matcher(&["*.log"])).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            generate_tree(&temp.path().join("nope"), &matcher(&[])),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
