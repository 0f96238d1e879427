//! Automatic1111 `parameters` text parsing.
//!
//! The A1111 web UI stores generation settings as a single text blob:
//!
//! ```text
//! masterpiece, a castle on a hill <lora:detail:0.6>
//! Negative prompt: blurry, lowres
//! Steps: 28, Sampler: DPM++ 2M Karras, CFG scale: 6.5, Seed: 1234, Size: 832x1216
//! ```
//!
//! [`parse_a1111_parameters`] turns it into the [`RawParameters`] map the
//! conversion façade consumes.

use std::sync::LazyLock;

use regex::Regex;

use crate::params::keys;
use crate::types::RawParameters;

/// Regex pattern for one `Key: value` pair on the settings line. Values may be
/// JSON-quoted when they contain commas.
pub const SETTING_PATTERN: &str = r#"\s*(\w[\w \-/+]*):\s*("(?:\\.|[^\\"])+"|[^,]*)(?:,|$)"#;

static SETTING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SETTING_PATTERN).expect("valid regex"));

/// Prefix that starts the negative prompt section.
const NEGATIVE_PROMPT_PREFIX: &str = "Negative prompt:";

/// The last line is only treated as settings when it has this many pairs.
const MIN_SETTINGS_PAIRS: usize = 3;

/// A1111 settings key whose presence means hi-res fix was enabled.
const HIRES_UPSCALE_KEY: &str = "Hires upscale";

/// Parse an A1111 `parameters` blob into a raw parameter map.
///
/// Recognised settings are mapped to the [`keys`] vocabulary; any other
/// setting is kept under its lower snake-case name.
pub fn parse_a1111_parameters(text: &str) -> RawParameters {
    let mut raw = RawParameters::new();
    let mut lines: Vec<&str> = text.trim().lines().collect();

    let settings = match lines.last() {
        Some(last) if SETTING_RE.captures_iter(last).count() >= MIN_SETTINGS_PAIRS => lines.pop(),
        _ => None,
    };

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    let mut in_negative = false;
    for line in lines {
        if let Some(rest) = line.trim_start().strip_prefix(NEGATIVE_PROMPT_PREFIX) {
            in_negative = true;
            negative.push(rest.trim());
        } else if in_negative {
            negative.push(line.trim());
        } else {
            positive.push(line.trim());
        }
    }

    raw.insert(
        keys::POSITIVE_PROMPT.to_string(),
        positive.join("\n").trim().to_string(),
    );
    if in_negative {
        raw.insert(
            keys::NEGATIVE_PROMPT.to_string(),
            negative.join("\n").trim().to_string(),
        );
    }

    if let Some(settings) = settings {
        for caps in SETTING_RE.captures_iter(settings) {
            let key = caps[1].trim();
            let value = unquote(caps[2].trim());
            if key == HIRES_UPSCALE_KEY {
                raw.insert(keys::HIRES_FIX.to_string(), "true".to_string());
            }
            raw.insert(map_key(key), value);
        }
    }

    raw
}

/// Cheap check for whether `text` looks like an A1111 parameters blob.
pub fn looks_like_a1111(text: &str) -> bool {
    text.contains("Steps:") && (text.contains("Sampler:") || text.contains("CFG scale:"))
}

fn map_key(key: &str) -> String {
    match key {
        "Steps" => keys::STEPS.to_string(),
        "CFG scale" => keys::CFG.to_string(),
        "Sampler" => keys::SAMPLER.to_string(),
        "Seed" => keys::SEED.to_string(),
        "Size" => keys::SIZE.to_string(),
        "Model" => keys::MODEL.to_string(),
        "Hires upscaler" => keys::HIRES_UPSCALER.to_string(),
        "Hires steps" => keys::HIRES_STEPS.to_string(),
        "Denoising strength" => keys::HIRES_DENOISING.to_string(),
        other => other
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect(),
    }
}

/// Strip JSON quoting from a settings value, leaving bare values untouched.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        serde_json::from_str::<String>(value).unwrap_or_else(|_| value[1..value.len() - 1].to_string())
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_SAMPLE: &str = "masterpiece, a castle on a hill <lora:detail:0.6>\n\
        Negative prompt: blurry, lowres\n\
        Steps: 28, Sampler: DPM++ 2M Karras, CFG scale: 6.5, Seed: 1234, Size: 832x1216, \
        Model hash: abc123, Model: dreamshaper_8";

    #[test]
    fn parses_prompts_and_settings() {
        let raw = parse_a1111_parameters(FULL_SAMPLE);
        assert_eq!(raw["positive_prompt"], "masterpiece, a castle on a hill <lora:detail:0.6>");
        assert_eq!(raw["negative_prompt"], "blurry, lowres");
        assert_eq!(raw["steps"], "28");
        assert_eq!(raw["sampler"], "DPM++ 2M Karras");
        assert_eq!(raw["cfg"], "6.5");
        assert_eq!(raw["seed"], "1234");
        assert_eq!(raw["size"], "832x1216");
        assert_eq!(raw["model"], "dreamshaper_8");
        assert_eq!(raw["model_hash"], "abc123");
    }

    #[test]
    fn multi_line_prompts_are_preserved() {
        let text = "line one\nline two\nNegative prompt: bad\nworse\n\
            Steps: 20, Sampler: Euler a, CFG scale: 7";
        let raw = parse_a1111_parameters(text);
        assert_eq!(raw["positive_prompt"], "line one\nline two");
        assert_eq!(raw["negative_prompt"], "bad\nworse");
    }

    #[test]
    fn missing_negative_prompt_is_absent() {
        let raw = parse_a1111_parameters("a dog\nSteps: 20, Sampler: Euler, CFG scale: 7");
        assert_eq!(raw["positive_prompt"], "a dog");
        assert!(!raw.contains_key("negative_prompt"));
    }

    #[test]
    fn hires_settings_enable_upscale() {
        let text = "a dog\nSteps: 20, Sampler: Euler, CFG scale: 7, Denoising strength: 0.45, \
            Hires upscale: 2, Hires steps: 12, Hires upscaler: 4x-UltraSharp";
        let raw = parse_a1111_parameters(text);
        assert_eq!(raw["hires_fix"], "true");
        assert_eq!(raw["hires_upscaler"], "4x-UltraSharp");
        assert_eq!(raw["hires_steps"], "12");
        assert_eq!(raw["hires_denoising"], "0.45");
    }

    #[test]
    fn quoted_values_are_unquoted() {
        let text = "a dog\nSteps: 20, Sampler: Euler, CFG scale: 7, \
            Lora hashes: \"detail: 1a2b, style: 3c4d\"";
        let raw = parse_a1111_parameters(text);
        assert_eq!(raw["lora_hashes"], "detail: 1a2b, style: 3c4d");
    }

    #[test]
    fn text_without_settings_is_all_prompt() {
        let raw = parse_a1111_parameters("just a prompt, nothing else");
        assert_eq!(raw["positive_prompt"], "just a prompt, nothing else");
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn looks_like_a1111_heuristic() {
        assert!(looks_like_a1111(FULL_SAMPLE));
        assert!(!looks_like_a1111("{\"3\": {\"class_type\": \"KSampler\"}}"));
        assert!(!looks_like_a1111("Steps: 20 only"));
    }
}
