//! Generation parameter normalization.
//!
//! Turns the loosely-typed [`RawParameters`] map produced by the metadata
//! parsing layer into a typed, defaulted [`GenerationParameters`] record.
//! Nothing in this module fails: every missing or malformed field falls back
//! to its default.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::lora::LoraReference;
use crate::types::RawParameters;
use crate::upscale::UpscaleSpec;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Sampling steps when the source omits them.
pub const DEFAULT_STEPS: u32 = 20;

/// Classifier-free guidance scale when the source omits it.
pub const DEFAULT_CFG: f64 = 7.0;

/// Sampler name when the source omits it.
pub const DEFAULT_SAMPLER: &str = "DPM++ 2M Karras";

/// Seed when the source omits it.
pub const DEFAULT_SEED: i64 = 42;

/// Checkpoint filename when the source omits it.
pub const DEFAULT_MODEL: &str = "sd_xl_base_1.0.safetensors";

/// Canvas size when the source omits it.
pub const DEFAULT_SIZE: &str = "512x512";

/// Last-resort dimensions when even the caller's default size is malformed.
const FALLBACK_DIMENSIONS: (u32, u32) = (512, 512);

// ---------------------------------------------------------------------------
// Raw parameter keys
// ---------------------------------------------------------------------------

/// Keys of the raw parameter map exchanged with the parsing layer.
pub mod keys {
    pub const POSITIVE_PROMPT: &str = "positive_prompt";
    pub const NEGATIVE_PROMPT: &str = "negative_prompt";
    pub const STEPS: &str = "steps";
    pub const CFG: &str = "cfg";
    pub const SAMPLER: &str = "sampler";
    pub const SEED: &str = "seed";
    pub const MODEL: &str = "model";
    pub const SIZE: &str = "size";
    pub const HIRES_FIX: &str = "hires_fix";
    pub const HIRES_UPSCALER: &str = "hires_upscaler";
    pub const HIRES_STEPS: &str = "hires_steps";
    pub const HIRES_DENOISING: &str = "hires_denoising";
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Typed generation request consumed by the graph builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub positive_prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub cfg: f64,
    pub sampler: String,
    pub seed: i64,
    pub model: String,
    pub width: u32,
    pub height: u32,
    /// In order of appearance in the positive prompt.
    pub loras: Vec<LoraReference>,
    pub upscale: Option<UpscaleSpec>,
}

/// Caller-overridable fallbacks for the model and canvas size.
#[derive(Debug, Clone, Copy)]
pub struct ParameterDefaults<'a> {
    pub model: &'a str,
    pub size: &'a str,
}

impl Default for ParameterDefaults<'static> {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL,
            size: DEFAULT_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Normalize a raw parameter map into [`GenerationParameters`].
///
/// LoRAs and the upscale policy are resolved separately and left empty here;
/// the conversion façade fills them in.
pub fn normalize(raw: &RawParameters, defaults: ParameterDefaults<'_>) -> GenerationParameters {
    let (width, height) = raw_field(raw, keys::SIZE)
        .and_then(parse_size)
        .or_else(|| parse_size(defaults.size))
        .unwrap_or(FALLBACK_DIMENSIONS);

    GenerationParameters {
        positive_prompt: raw.get(keys::POSITIVE_PROMPT).cloned().unwrap_or_default(),
        negative_prompt: raw.get(keys::NEGATIVE_PROMPT).cloned().unwrap_or_default(),
        steps: parse_or(raw_field(raw, keys::STEPS), DEFAULT_STEPS),
        cfg: parse_finite_or(raw_field(raw, keys::CFG), DEFAULT_CFG),
        sampler: raw_field(raw, keys::SAMPLER)
            .unwrap_or(DEFAULT_SAMPLER)
            .to_string(),
        seed: parse_or(raw_field(raw, keys::SEED), DEFAULT_SEED),
        model: raw_field(raw, keys::MODEL)
            .unwrap_or(defaults.model)
            .to_string(),
        width,
        height,
        loras: Vec::new(),
        upscale: None,
    }
}

/// Parse `value`, returning `default` when it is absent, blank or unparseable.
pub fn parse_or<T: FromStr>(value: Option<&str>, default: T) -> T {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Like [`parse_or`] for floats, additionally rejecting NaN and infinities.
pub fn parse_finite_or(value: Option<&str>, default: f64) -> f64 {
    let parsed: f64 = parse_or(value, default);
    if parsed.is_finite() {
        parsed
    } else {
        default
    }
}

/// Parse a `"<width>x<height>"` size string. Both sides must be positive.
pub fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.trim().split_once('x')?;
    let width: u32 = w.trim().parse().ok()?;
    let height: u32 = h.trim().parse().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}

/// Fetch a trimmed, non-empty field from the raw map.
pub(crate) fn raw_field<'a>(raw: &'a RawParameters, key: &str) -> Option<&'a str> {
    raw.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawParameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // -- normalize ------------------------------------------------------------

    #[test]
    fn empty_map_yields_all_defaults() {
        let params = normalize(&RawParameters::new(), ParameterDefaults::default());
        assert_eq!(params.positive_prompt, "");
        assert_eq!(params.negative_prompt, "");
        assert_eq!(params.steps, DEFAULT_STEPS);
        assert_eq!(params.cfg, DEFAULT_CFG);
        assert_eq!(params.sampler, DEFAULT_SAMPLER);
        assert_eq!(params.seed, DEFAULT_SEED);
        assert_eq!(params.model, DEFAULT_MODEL);
        assert_eq!((params.width, params.height), (512, 512));
        assert!(params.loras.is_empty());
        assert!(params.upscale.is_none());
    }

    #[test]
    fn numeric_fields_are_parsed() {
        let params = normalize(
            &raw(&[
                ("steps", "30"),
                ("cfg", "5.5"),
                ("seed", "1234567890"),
                ("size", "832x1216"),
                ("sampler", "Euler a"),
                ("model", "dreamshaper_8"),
            ]),
            ParameterDefaults::default(),
        );
        assert_eq!(params.steps, 30);
        assert_eq!(params.cfg, 5.5);
        assert_eq!(params.seed, 1_234_567_890);
        assert_eq!((params.width, params.height), (832, 1216));
        assert_eq!(params.sampler, "Euler a");
        assert_eq!(params.model, "dreamshaper_8");
    }

    #[test]
    fn non_numeric_fields_fall_back_to_defaults() {
        let params = normalize(
            &raw(&[("steps", "many"), ("cfg", "NaN"), ("seed", "random")]),
            ParameterDefaults::default(),
        );
        assert_eq!(params.steps, DEFAULT_STEPS);
        assert_eq!(params.cfg, DEFAULT_CFG);
        assert_eq!(params.seed, DEFAULT_SEED);
    }

    #[test]
    fn negative_seed_is_kept() {
        let params = normalize(&raw(&[("seed", "-1")]), ParameterDefaults::default());
        assert_eq!(params.seed, -1);
    }

    #[test]
    fn malformed_size_uses_caller_default() {
        let defaults = ParameterDefaults {
            model: DEFAULT_MODEL,
            size: "1024x1024",
        };
        let params = normalize(&raw(&[("size", "huge")]), defaults);
        assert_eq!((params.width, params.height), (1024, 1024));
    }

    #[test]
    fn malformed_default_size_uses_fallback() {
        let defaults = ParameterDefaults {
            model: DEFAULT_MODEL,
            size: "wide",
        };
        let params = normalize(&raw(&[("size", "0x0")]), defaults);
        assert_eq!((params.width, params.height), FALLBACK_DIMENSIONS);
    }

    #[test]
    fn blank_model_uses_caller_default() {
        let defaults = ParameterDefaults {
            model: "custom.safetensors",
            size: DEFAULT_SIZE,
        };
        let params = normalize(&raw(&[("model", "   ")]), defaults);
        assert_eq!(params.model, "custom.safetensors");
    }

    // -- helpers --------------------------------------------------------------

    #[test]
    fn parse_size_accepts_padded_values() {
        assert_eq!(parse_size(" 640 x 480 "), Some((640, 480)));
    }

    #[test]
    fn parse_size_rejects_other_separators() {
        assert_eq!(parse_size("640*480"), None);
        assert_eq!(parse_size("640x"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn parse_or_trims_input() {
        assert_eq!(parse_or(Some("  12 "), 0u32), 12);
        assert_eq!(parse_or(None, 7u32), 7);
    }
}
