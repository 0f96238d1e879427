//! A1111 → ComfyUI conversion façade.
//!
//! Runs LoRA extraction, upscale resolution, normalization, graph building
//! and document assembly for one raw parameter map. [`convert`] never
//! returns an error: failures are reported inside the [`ConversionResult`]
//! so that batch callers can log them and move on.

use serde::{Deserialize, Serialize};

use crate::document::{assemble, WorkflowDocument};
use crate::error::CoreError;
use crate::graph::build_graph;
use crate::lora::{extract_loras, strip_lora_tags, LoraReference};
use crate::params::{keys, normalize, ParameterDefaults, DEFAULT_MODEL, DEFAULT_SIZE};
use crate::types::{NodeId, RawParameters};
use crate::upscale::{resolve_upscale, UpscaleSpec};

/// Caller-supplied conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Remove `<lora:…>` tags from the encoded positive prompt.
    pub strip_lora_tags: bool,
    pub default_model_name: String,
    pub default_canvas_size: String,
    /// Id of the first node in the generated graph.
    pub starting_node_id: NodeId,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            strip_lora_tags: true,
            default_model_name: DEFAULT_MODEL.to_string(),
            default_canvas_size: DEFAULT_SIZE.to_string(),
            starting_node_id: 1,
        }
    }
}

/// Outcome of a single conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loras: Vec<LoraReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upscaler: Option<UpscaleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub original_parameters: RawParameters,
}

impl ConversionResult {
    fn succeeded(
        workflow: WorkflowDocument,
        loras: Vec<LoraReference>,
        upscaler: Option<UpscaleSpec>,
        original_parameters: RawParameters,
    ) -> Self {
        Self {
            success: true,
            workflow: Some(workflow),
            loras,
            upscaler,
            error: None,
            original_parameters,
        }
    }

    fn failed(error: &CoreError, original_parameters: RawParameters) -> Self {
        Self {
            success: false,
            workflow: None,
            loras: Vec::new(),
            upscaler: None,
            error: Some(error.to_string()),
            original_parameters,
        }
    }
}

/// Convert A1111 generation parameters into a ComfyUI workflow document.
pub fn convert(raw: &RawParameters, options: &ConversionOptions) -> ConversionResult {
    match try_convert(raw, options) {
        Ok((workflow, loras, upscaler)) => {
            tracing::debug!(
                workflow_id = %workflow.id,
                nodes = workflow.nodes.len(),
                links = workflow.links.len(),
                loras = loras.len(),
                upscale = upscaler.is_some(),
                "Converted A1111 parameters to ComfyUI workflow",
            );
            ConversionResult::succeeded(workflow, loras, upscaler, raw.clone())
        }
        Err(e) => {
            tracing::warn!(error = %e, "A1111 conversion failed");
            ConversionResult::failed(&e, raw.clone())
        }
    }
}

fn try_convert(
    raw: &RawParameters,
    options: &ConversionOptions,
) -> Result<(WorkflowDocument, Vec<LoraReference>, Option<UpscaleSpec>), CoreError> {
    if options.starting_node_id == 0 {
        return Err(CoreError::Validation(
            "starting_node_id must be at least 1".to_string(),
        ));
    }

    let raw_prompt = raw
        .get(keys::POSITIVE_PROMPT)
        .map(String::as_str)
        .unwrap_or_default();
    let loras = extract_loras(raw_prompt);
    let upscaler = resolve_upscale(raw);

    let mut params = normalize(
        raw,
        ParameterDefaults {
            model: &options.default_model_name,
            size: &options.default_canvas_size,
        },
    );
    if options.strip_lora_tags {
        params.positive_prompt = strip_lora_tags(&params.positive_prompt);
    }
    params.loras = loras.clone();
    params.upscale = upscaler.clone();

    let (nodes, links) = build_graph(&params, options.starting_node_id)?;
    let workflow = assemble(nodes, links)?;
    Ok((workflow, loras, upscaler))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
