//! Hi-res fix (second pass upscale) policy.

use serde::{Deserialize, Serialize};

use crate::params::{keys, parse_or, raw_field};
use crate::types::RawParameters;

/// Upscale model used when the source enables hi-res fix without naming one.
pub const DEFAULT_UPSCALE_MODEL: &str = "ESRGAN_4x";

/// Second-pass sampling steps when the source omits them.
pub const DEFAULT_UPSCALE_STEPS: u32 = 10;

/// Second-pass denoising strength when the source omits it.
pub const DEFAULT_UPSCALE_DENOISING: f64 = 0.5;

/// Upscale factor. Not derived from the source parameters.
pub const UPSCALE_FACTOR: f64 = 2.0;

/// Settings for the decode → upscale → re-encode → re-sample sub-graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleSpec {
    pub model: String,
    pub steps: u32,
    pub denoising: f64,
    pub scale: f64,
}

/// Decide whether a second pass is required and with which settings.
///
/// Either an explicit `hires_fix` flag or a named upscaler is enough to
/// activate it. Each field falls back independently.
pub fn resolve_upscale(raw: &RawParameters) -> Option<UpscaleSpec> {
    let enabled = matches!(raw_field(raw, keys::HIRES_FIX), Some("true" | "True"));
    let upscaler = raw_field(raw, keys::HIRES_UPSCALER);

    if !enabled && upscaler.is_none() {
        return None;
    }

    let denoising: f64 = parse_or(
        raw_field(raw, keys::HIRES_DENOISING),
        DEFAULT_UPSCALE_DENOISING,
    );
    let denoising = if (0.0..=1.0).contains(&denoising) {
        denoising
    } else {
        DEFAULT_UPSCALE_DENOISING
    };

    Some(UpscaleSpec {
        model: upscaler.unwrap_or(DEFAULT_UPSCALE_MODEL).to_string(),
        steps: parse_or(raw_field(raw, keys::HIRES_STEPS), DEFAULT_UPSCALE_STEPS),
        denoising,
        scale: UPSCALE_FACTOR,
    })
}
