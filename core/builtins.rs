use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use rust_embed::RustEmbed;
use serde::Deserialize;

pub const SYSTEM_PROMPT_ASSET: &str = "system_prompt";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PatternLayer {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub dirs: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BuiltinIgnores {
    #[serde(default)]
    pub snapshot: PatternLayer,
    #[serde(default)]
    pub rules: PatternLayer,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(RustEmbed)]
#[folder = "../data/prompts/"]
#[prefix = "prompts/"]
struct PromptAssets;

static BUILTIN_IGNORE_PATTERNS: Lazy<BuiltinIgnores> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../data/builtin_ignores.yaml"
    ));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/builtin_ignores.yaml")
});

pub fn get_builtin_ignore_patterns() -> &'static BuiltinIgnores {
    &BUILTIN_IGNORE_PATTERNS
}

/// Loads an embedded prompt by stem, e.g. `system_prompt` for
/// `data/prompts/system_prompt.md`.
pub fn get_embedded_prompt(stem: &str) -> Result<String> {
    let file_path = format!("prompts/{}.md", stem);
    log::trace!("Attempting to get embedded prompt: {}", file_path);
    let asset = PromptAssets::get(&file_path).ok_or_else(|| {
        AppError::DataLoading(format!("Embedded prompt not found: {}", file_path))
    })?;
    let content = std::str::from_utf8(asset.data.as_ref())?;
    Ok(content.to_string())
}

pub fn get_default_system_prompt() -> Result<String> {
    get_embedded_prompt(SYSTEM_PROMPT_ASSET)
}
