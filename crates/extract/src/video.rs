//! Container tags of video files via `ffprobe`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::MetadataError;
use crate::RawFields;

/// Top-level ffprobe JSON output (`-print_format json -show_format`).
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// Run the probe tool on `path` and return its format-level tags.
///
/// Tag keys are lower-cased: containers disagree on the case of keys such
/// as `comment` / `COMMENT`.
pub async fn probe_tags(ffprobe: &str, path: &Path) -> Result<RawFields, MetadataError> {
    let output = tokio::process::Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await
        .map_err(|e| MetadataError::ExternalCommand {
            command: ffprobe.to_string(),
            message: format!("could not start: {e}"),
        })?;

    if !output.status.success() {
        return Err(MetadataError::ExternalCommand {
            command: ffprobe.to_string(),
            message: format!(
                "exit code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Extract lower-cased format tags from ffprobe's JSON output.
pub fn parse_probe_output(stdout: &str) -> Result<RawFields, MetadataError> {
    let parsed: FfprobeOutput = serde_json::from_str(stdout)
        .map_err(|e| MetadataError::Parse(format!("ffprobe output: {e}")))?;

    Ok(parsed
        .format
        .map(|f| f.tags)
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect())
}
