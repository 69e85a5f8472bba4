use crate::builtins::get_builtin_ignore_patterns;
use crate::error::Result;
use crate::patterns::PatternSet;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path};

/// Bytes inspected when sniffing a file for binary content.
pub const SNIFF_LIMIT: usize = 8000;

pub const BINARY_PLACEHOLDER: &str = "[Binary file not displayed]";

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "icns", "tif", "tiff", "webp", "avif", "heic",
    "psd", "svgz",
];

const BINARY_EXTENSIONS: &[&str] = &[
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "zst", "jar", "war", "whl", "egg",
    // executables and libraries
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "obj", "class", "pyc", "pyo", "pyd",
    "wasm", "rlib", "deb", "rpm", "dmg", "iso", "msi", "apk",
    // media
    "mp3", "mp4", "m4a", "wav", "flac", "ogg", "avi", "mov", "mkv", "webm",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // data
    "db", "sqlite", "sqlite3", "pkl", "pickle", "npy", "npz", "parquet", "h5", "onnx", "pt",
    // office
    "pdf", "doc", "docx", "xls", "xlsx", "xlsm", "ppt", "pptx", "odt", "ods", "odp",
];

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdx"];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Root-relative path with `/` separators and no `.` components.
pub fn normalize_relative(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Root-relative form of `path`, or `None` when it lies outside `root` or is
/// the root itself.
pub fn relative_within(path: &Path, root: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(path, root)?;
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(normalize_relative(&relative)).filter(|rel| !rel.is_empty())
}

/// Compiled form of a pattern set.
///
/// Patterns without a separator are also kept as literal component names;
/// every pattern is compiled as a glob against the whole relative path.
/// Exact paths exclude one root-relative path and nothing else.
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    exact_paths: HashSet<String>,
    literals: HashSet<String>,
    globs: GlobSet,
    glob_sources: Vec<String>,
}

impl ExclusionMatcher {
    pub fn new(patterns: &PatternSet) -> Result<Self> {
        let mut literals = HashSet::new();
        let mut builder = GlobSetBuilder::new();
        let mut glob_sources = Vec::new();
        for pattern in patterns {
            if !pattern.contains('/') {
                literals.insert(pattern.clone());
            }
            match Glob::new(pattern) {
                Ok(glob) => {
                    log::trace!("Adding glob pattern: {}", pattern);
                    builder.add(glob);
                    glob_sources.push(pattern.clone());
                }
                Err(e) => {
                    log::warn!(
                        "Invalid glob pattern \"{}\", matching it literally only: {}",
                        pattern,
                        e
                    );
                }
            }
        }
        let globs = builder.build()?;
        Ok(Self {
            exact_paths: HashSet::new(),
            literals,
            globs,
            glob_sources,
        })
    }

    pub fn with_exact_path(mut self, relative_path: Option<String>) -> Self {
        if let Some(path) = relative_path {
            log::debug!("Excluding exact path: {}", path);
            self.exact_paths.insert(path);
        }
        self
    }

    pub fn should_exclude(&self, relative_path: &Path) -> bool {
        let normalized = normalize_relative(relative_path);
        if normalized.is_empty() {
            return false;
        }

        if self.exact_paths.contains(&normalized) {
            log::trace!("Excluded {} (exact path)", normalized);
            return true;
        }

        if let Some(component) = normalized
            .split('/')
            .find(|component| self.literals.contains(*component))
        {
            log::trace!("Excluded {} (component '{}')", normalized, component);
            return true;
        }

        let matches = self.globs.matches(&normalized);
        if let Some(&index) = matches.first() {
            log::trace!(
                "Excluded {} (glob '{}')",
                normalized,
                self.glob_sources[index]
            );
            return true;
        }
        false
    }
}

/// One-shot form of [`ExclusionMatcher::should_exclude`].
pub fn should_exclude(relative_path: &Path, patterns: &PatternSet) -> Result<bool> {
    Ok(ExclusionMatcher::new(patterns)?.should_exclude(relative_path))
}

pub fn is_image(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Extension-only check. Unknown extensions are not assumed binary.
pub fn is_binary_extension(path: &Path) -> bool {
    is_image(path)
        || lowercase_extension(path).is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_markdown(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext.as_str()))
}

/// Spreadsheets and office documents, plus Markdown unless it is treated as
/// source.
pub fn is_document(path: &Path, include_markdown: bool) -> bool {
    if is_markdown(path) {
        return !include_markdown;
    }
    lowercase_extension(path).is_some_and(|ext| {
        get_builtin_ignore_patterns()
            .documents
            .iter()
            .any(|doc| doc.eq_ignore_ascii_case(&ext))
    })
}

/// Classifies a byte prefix: NUL bytes or invalid UTF-8 mean binary. A
/// multi-byte sequence cut off at the end of the prefix is not an error.
pub fn is_binary_prefix(prefix: &[u8]) -> bool {
    if prefix.contains(&0) {
        return true;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => false,
        Err(e) => e.error_len().is_some(),
    }
}

fn read_prefix(path: &Path) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(SNIFF_LIMIT);
    File::open(path)?
        .take(SNIFF_LIMIT as u64)
        .read_to_end(&mut buf)?;
    Ok(buf)
}

/// Reads at most [`SNIFF_LIMIT`] bytes. Unreadable files count as binary.
pub fn sniff_is_binary(path: &Path) -> bool {
    match read_prefix(path) {
        Ok(prefix) => is_binary_prefix(&prefix),
        Err(e) => {
            log::debug!(
                "Could not sniff {}, treating as binary: {}",
                path.display(),
                e
            );
            true
        }
    }
}

pub fn is_binary_file(path: &Path) -> bool {
    is_binary_extension(path) || sniff_is_binary(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary,
}

/// Binary-aware reader. Text is decoded with replacement characters, so only
/// I/O failures on the full read surface as errors.
pub fn read_file_content(path: &Path) -> io::Result<FileContent> {
    if is_binary_file(path) {
        return Ok(FileContent::Binary);
    }
    let bytes = fs::read(path)?;
    Ok(FileContent::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Fence tag for a file, empty when unknown.
pub fn language_for_path(path: &Path) -> &'static str {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    match file_name {
        "Dockerfile" => return "dockerfile",
        "Makefile" | "GNUmakefile" => return "makefile",
        "CMakeLists.txt" => return "cmake",
        "Gemfile" | "Rakefile" => return "ruby",
        _ => {}
    }
    let Some(ext) = lowercase_extension(path) else {
        return "";
    };
    match ext.as_str() {
        "py" | "pyw" | "pyi" => "python",
        "rs" => "rust",
        "js" | "cjs" | "mjs" => "javascript",
        "jsx" => "jsx",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "swift" => "swift",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "lua" => "lua",
        "r" => "r",
        "dart" => "dart",
        "ex" | "exs" => "elixir",
        "erl" => "erlang",
        "hs" => "haskell",
        "clj" => "clojure",
        "sh" | "bash" | "zsh" => "bash",
        "fish" => "fish",
        "ps1" => "powershell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "less" => "less",
        "vue" => "vue",
        "svelte" => "svelte",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "svg" => "svg",
        "ini" | "cfg" => "ini",
        "md" | "markdown" | "mdx" => "markdown",
        "graphql" | "gql" => "graphql",
        "proto" => "protobuf",
        "tf" => "hcl",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(patterns: &[&str]) -> PatternSet {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn literal_component_matches_at_any_depth() {
        let matcher = ExclusionMatcher::new(&set(&["node_modules"])).unwrap();
        assert!(matcher.should_exclude(Path::new("node_modules")));
        assert!(matcher.should_exclude(Path::new("web/node_modules/react/index.js")));
        assert!(!matcher.should_exclude(Path::new("web/node_modules_backup")));
    }

    #[test]
    fn glob_matches_full_relative_path() {
        let matcher = ExclusionMatcher::new(&set(&["*.png", "docs/*.txt"])).unwrap();
        assert!(matcher.should_exclude(Path::new("logo.png")));
        assert!(matcher.should_exclude(Path::new("assets/img/logo.png")));
        assert!(matcher.should_exclude(Path::new("docs/notes.txt")));
        assert!(!matcher.should_exclude(Path::new("notes.txt")));
        assert!(!matcher.should_exclude(Path::new("src/main.rs")));
    }

    #[test]
    fn dot_components_are_normalized() {
        let matcher = ExclusionMatcher::new(&set(&["build"])).unwrap();
        assert!(matcher.should_exclude(Path::new("./build/out.o")));
        assert!(!matcher.should_exclude(Path::new(".")));
    }

    #[test]
    fn invalid_glob_still_matches_literally() {
        let matcher = ExclusionMatcher::new(&set(&["weird[dir"])).unwrap();
        assert!(matcher.should_exclude(Path::new("src/weird[dir/file.rs")));
    }

    #[test]
    fn exact_path_matches_only_itself() {
        let matcher = ExclusionMatcher::new(&set(&["*.log"]))
            .unwrap()
            .with_exact_path(Some("snapshot.txt".to_string()));
        assert!(matcher.should_exclude(Path::new("snapshot.txt")));
        assert!(!matcher.should_exclude(Path::new("tests/fixtures/snapshot.txt")));
        assert!(matcher.should_exclude(Path::new("tests/run.log")));
    }

    #[test]
    fn relative_within_rejects_paths_outside_root() {
        let root = Path::new("/work/proj");
        assert_eq!(
            relative_within(Path::new("/work/proj/out/snap.txt"), root),
            Some("out/snap.txt".to_string())
        );
        assert_eq!(relative_within(Path::new("/work/lib.rs"), root), None);
        assert_eq!(relative_within(Path::new("/work/proj"), root), None);
    }

    #[test]
    fn one_shot_should_exclude() {
        assert!(should_exclude(Path::new("a/__pycache__/x.pyc"), &set(&["__pycache__"])).unwrap());
        assert!(!should_exclude(Path::new("a/b.py"), &set(&["__pycache__"])).unwrap());
    }

    #[test]
    fn nul_byte_means_binary() {
        assert!(is_binary_prefix(b"abc\0def"));
        assert!(!is_binary_prefix("héllo wörld".as_bytes()));
        assert!(is_binary_prefix(&[0xff, 0xfe, 0x41]));
    }

    #[test]
    fn truncated_multibyte_at_boundary_is_text() {
        let mut bytes = "é".as_bytes().to_vec();
        bytes.pop();
        let mut prefix = b"abc".to_vec();
        prefix.extend(bytes);
        assert!(!is_binary_prefix(&prefix));
    }

    #[test]
    fn sniffing_only_reads_the_prefix() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("late_nul.dat");
        let mut content = vec![b'a'; SNIFF_LIMIT];
        content.push(0);
        fs::write(&path, &content).unwrap();
        assert!(!sniff_is_binary(&path));

        let early = temp.path().join("early_nul.dat");
        let mut content = vec![b'a'; SNIFF_LIMIT - 1];
        content.push(0);
        fs::write(&early, &content).unwrap();
        assert!(sniff_is_binary(&early));
    }

    #[test]
    fn unreadable_file_is_binary() {
        let temp = TempDir::new().unwrap();
        assert!(sniff_is_binary(&temp.path().join("missing.txt")));
    }

    #[test]
    fn extension_table_short_circuits_reading() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("looks_like_text.png");
        fs::write(&path, "plain text").unwrap();
        assert_eq!(read_file_content(&path).unwrap(), FileContent::Binary);
        assert!(is_image(&path));
    }

    #[test]
    fn invalid_utf8_is_binary_and_text_is_read() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("blob.unknownext");
        fs::write(&binary, [0xc3, 0x28, 0x41]).unwrap();
        assert_eq!(read_file_content(&binary).unwrap(), FileContent::Binary);

        let text = temp.path().join("a.py");
        fs::write(&text, "print(1)").unwrap();
        assert_eq!(
            read_file_content(&text).unwrap(),
            FileContent::Text("print(1)".to_string())
        );
        assert!(!is_binary_file(&text));
    }

    #[test]
    fn markdown_toggle_controls_document_axis() {
        assert!(is_document(Path::new("README.md"), false));
        assert!(!is_document(Path::new("README.md"), true));
        assert!(is_document(Path::new("budget.XLSX"), true));
        assert!(!is_document(Path::new("main.rs"), false));
    }

    #[test]
    fn language_tags() {
        assert_eq!(language_for_path(Path::new("a.py")), "python");
        assert_eq!(language_for_path(Path::new("src/lib.RS")), "rust");
        assert_eq!(language_for_path(Path::new("docker/Dockerfile")), "dockerfile");
        assert_eq!(language_for_path(Path::new("LICENSE")), "");
        assert_eq!(language_for_path(Path::new("data.weird")), "");
    }
}
