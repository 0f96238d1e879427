use std::path::PathBuf;

use comfymeta_core::params::{DEFAULT_MODEL, DEFAULT_SIZE};
use comfymeta_extract::extractor::DEFAULT_FFPROBE;

/// Command configuration loaded from environment variables.
///
/// Every field has a default; command-line flags take precedence over
/// anything read here.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Probe tool for video containers (default: `ffprobe`).
    pub ffprobe_path: String,
    /// Directory for saved JSON files (default: next to each input).
    pub output_dir: Option<PathBuf>,
    /// Checkpoint used when the parameters name none.
    pub default_model: String,
    /// Canvas size used when the parameters give none or a malformed one.
    pub default_size: String,
    /// Id of the first node in converted workflows (default: `1`).
    pub start_id: u32,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: DEFAULT_FFPROBE.to_string(),
            output_dir: None,
            default_model: DEFAULT_MODEL.to_string(),
            default_size: DEFAULT_SIZE.to_string(),
            start_id: 1,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                      |
    /// |---------------------------|------------------------------|
    /// | `COMFYMETA_FFPROBE`       | `ffprobe`                    |
    /// | `COMFYMETA_OUTPUT_DIR`    | --                           |
    /// | `COMFYMETA_DEFAULT_MODEL` | `sd_xl_base_1.0.safetensors` |
    /// | `COMFYMETA_DEFAULT_SIZE`  | `512x512`                    |
    /// | `COMFYMETA_START_ID`      | `1`                          |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let start_id = match var("COMFYMETA_START_ID") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(id) if id >= 1 => id,
                _ => {
                    tracing::warn!(value = %raw, "COMFYMETA_START_ID must be a positive integer, using 1");
                    defaults.start_id
                }
            },
            None => defaults.start_id,
        };

        Self {
            ffprobe_path: var("COMFYMETA_FFPROBE").unwrap_or(defaults.ffprobe_path),
            output_dir: var("COMFYMETA_OUTPUT_DIR").map(PathBuf::from),
            default_model: var("COMFYMETA_DEFAULT_MODEL").unwrap_or(defaults.default_model),
            default_size: var("COMFYMETA_DEFAULT_SIZE").unwrap_or(defaults.default_size),
            start_id,
        }
    }
}
