//! LoRA tag extraction.
//!
//! A1111 prompts reference LoRA adapters inline with `<lora:NAME:STRENGTH>`
//! tags. Extraction and stripping are independent: callers may keep the tags
//! in the visible prompt while still wiring the adapters into the graph.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Regex pattern matching a `<lora:NAME:STRENGTH>` tag.
///
/// NAME may not contain `:` or `>`. STRENGTH is a plain unsigned decimal;
/// signs, exponents and words do not match, so such tags stay in the prompt.
pub const LORA_TAG_PATTERN: &str = r"<lora:([^:>]+):(\d+(?:\.\d*)?|\.\d+)>";

static LORA_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LORA_TAG_PATTERN).expect("valid regex"));

/// File extension appended to a LoRA name to form its loader path.
pub const LORA_FILE_EXTENSION: &str = ".safetensors";

/// A LoRA adapter referenced from a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraReference {
    pub name: String,
    pub strength: f64,
    pub path: String,
}

impl LoraReference {
    pub fn new(name: &str, strength: f64) -> Self {
        let name = name.trim().to_string();
        let path = format!("{name}{LORA_FILE_EXTENSION}");
        Self {
            name,
            strength,
            path,
        }
    }
}

/// Extract every well-formed LoRA tag from `prompt`, left to right.
///
/// Duplicates are preserved.
pub fn extract_loras(prompt: &str) -> Vec<LoraReference> {
    LORA_TAG_RE
        .captures_iter(prompt)
        .filter_map(|caps| parse_tag(&caps))
        .collect()
}

/// Remove every extractable LoRA tag and collapse the remaining whitespace.
///
/// Tags that [`extract_loras`] would skip are left as written.
pub fn strip_lora_tags(prompt: &str) -> String {
    let stripped = LORA_TAG_RE.replace_all(prompt, |caps: &regex::Captures<'_>| {
        match parse_tag(caps) {
            Some(_) => " ".to_string(),
            None => caps[0].to_string(),
        }
    });
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_tag(caps: &regex::Captures<'_>) -> Option<LoraReference> {
    let name = caps[1].trim();
    let strength: f64 = caps[2].parse().ok()?;
    if name.is_empty() || !strength.is_finite() || strength < 0.0 {
        tracing::debug!(tag = &caps[0], "Skipping malformed LoRA tag");
        return None;
    }
    Some(LoraReference::new(name, strength))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
