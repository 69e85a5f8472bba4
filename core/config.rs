use crate::builtins::get_default_system_prompt;
use crate::error::{AppError, Result};
use crate::patterns;
use crate::rules::{DEFAULT_RULES_FILENAME, RulesOptions};
use crate::snapshot::{DEFAULT_LOCAL_IGNORE_FILE, DEFAULT_SNAPSHOT_FILENAME, SnapshotOptions};
use byte_unit::Byte;
use parse_duration::parse;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = ".ctxsnap";
pub const DEFAULT_CONFIG_FILENAME: &str = "ctxsnap.toml";
pub const DEFAULT_WATCH_DELAY: &str = "300ms";
pub const DEFAULT_MAX_FILE_SIZE: &str = "10MiB";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_local_ignore_file")]
    pub local_ignore_file: PathBuf,
    #[serde(default)]
    pub saved_patterns_file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub include_markdown: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default = "default_rules_file")]
    pub file: PathBuf,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default = "default_watch_delay_string")]
    pub delay: String,
}

fn default_local_ignore_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_IGNORE_FILE)
}
fn default_snapshot_output() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_FILENAME)
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}
fn default_rules_file() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_FILENAME)
}
fn default_watch_delay_string() -> String {
    DEFAULT_WATCH_DELAY.to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            local_ignore_file: default_local_ignore_file(),
            saved_patterns_file: None,
        }
    }
}
impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            output: default_snapshot_output(),
            include_markdown: false,
            max_file_size: default_max_file_size(),
            exclude: Vec::new(),
        }
    }
}
impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            file: default_rules_file(),
            exclude: Vec::new(),
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}
impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            delay: default_watch_delay_string(),
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

impl Config {
    /// CLI flag, then `PROJECT_ROOT`, then the current directory. The result
    /// is canonical.
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => expand_path(&p_str),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        path_to_resolve.canonicalize().map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to canonicalize project root '{}': {}",
                    path_to_resolve.display(),
                    e
                ),
            ))
        })
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p_str) => {
                let path = expand_path(p_str);
                let path = if path.is_absolute() {
                    path
                } else {
                    project_root.join(path)
                };
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = project_root
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        toml::from_str::<Config>(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    /// Loads the resolved config file, or defaults when there is none.
    pub fn load(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Self> {
        match Self::resolve_config_path(project_root, cli_config_file, cli_disable_config)? {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn get_watch_delay(&self) -> Result<Duration> {
        parse(&self.watch.delay).map_err(|e| {
            AppError::InvalidArgument(format!(
                "Invalid watch delay duration '{}': {}. Use format like '500ms', '2s'.",
                self.watch.delay, e
            ))
        })
    }

    pub fn get_max_file_size(&self) -> Result<u64> {
        let raw = self.snapshot.max_file_size.as_str();
        let byte_value = Byte::from_str(raw).map_err(|e| {
            AppError::SizeParse(format!("Invalid max_file_size '{}': {}", raw, e))
        })?;
        let bytes: u128 = byte_value.into();
        bytes.try_into().map_err(|_| {
            AppError::SizeParse(format!("max_file_size '{}' is too large", raw))
        })
    }

    pub fn saved_patterns_path(&self) -> Option<PathBuf> {
        self.general
            .saved_patterns_file
            .as_deref()
            .map(expand_path)
            .or_else(patterns::default_saved_patterns_path)
    }

    /// Inline prompt, then the prompt file, then the embedded default.
    pub fn resolve_system_prompt(&self, project_root: &Path) -> Result<String> {
        if let Some(inline) = self.rules.system_prompt.as_ref().filter(|s| !s.trim().is_empty()) {
            log::debug!("Using inline system prompt from config.");
            return Ok(inline.clone());
        }
        if let Some(file) = &self.rules.system_prompt_file {
            let path = project_root.join(expand_path(&file.to_string_lossy()));
            log::debug!("Reading system prompt from {}", path.display());
            return fs::read_to_string(&path).map_err(|e| AppError::FileRead { path, source: e });
        }
        get_default_system_prompt()
    }

    pub fn to_snapshot_options(&self) -> Result<SnapshotOptions> {
        Ok(SnapshotOptions {
            include_markdown: self.snapshot.include_markdown,
            max_file_size: self.get_max_file_size()?,
            local_ignore_file: self.general.local_ignore_file.clone(),
            extra_patterns: self.snapshot.exclude.clone(),
        })
    }

    pub fn to_rules_options(&self, project_root: &Path) -> Result<RulesOptions> {
        Ok(RulesOptions {
            rules_file: self.rules.file.clone(),
            local_ignore_file: self.general.local_ignore_file.clone(),
            extra_patterns: self.rules.exclude.clone(),
            system_prompt: self.resolve_system_prompt(project_root)?,
        })
    }
}
