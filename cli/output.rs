use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{self, Write};

use crate::cli_args::FormatOutputOpts;

/// Prints `plain_text` for the text format, or serializes `data` as JSON or
/// YAML. Falls back to pretty JSON when no text rendering exists.
pub fn print_data_or_text<T: Serialize>(
    data: &T,
    plain_text: Option<String>,
    format_opts: &FormatOutputOpts,
    default_format: &str,
) -> Result<()> {
    let format = format_opts
        .format
        .as_deref()
        .unwrap_or(default_format)
        .to_lowercase();

    match (format.as_str(), plain_text) {
        ("text", Some(text)) => write_to_stdout(&text),
        (format, _) => write_to_stdout(&serialize_output(data, format)?),
    }
}

pub fn serialize_output<T: Serialize>(data: &T, format: &str) -> Result<String> {
    match format {
        "yaml" | "yml" => serde_yml::to_string(data).context("Failed to serialize output to YAML"),
        _ => serde_json::to_string_pretty(data).context("Failed to serialize output to JSON"),
    }
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
        count: usize,
    }

    #[test]
    fn serializes_json_and_yaml() {
        let sample = Sample {
            name: "demo",
            count: 2,
        };
        let json = serialize_output(&sample, "json").unwrap();
        assert!(json.contains("\"count\": 2"));

        let yaml = serialize_output(&sample, "yaml").unwrap();
        assert!(yaml.contains("name: demo"));
    }
}
