//! ComfyUI workflow shape detection and summaries.
//!
//! ComfyUI embeds two JSON documents in its outputs: the UI graph
//! (`workflow`, with `nodes` and `links` arrays) and the API prompt
//! (`prompt`, an object keyed by node id with `class_type` and `inputs`).
//! This module recognises both and extracts a short summary of what they
//! reference.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::node_kinds::class_types;

/// Which of the two ComfyUI document formats a JSON value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowShape {
    /// Front-end graph with `nodes` and `links`.
    UiGraph,
    /// Execution prompt keyed by node id.
    ApiPrompt,
}

/// What a workflow contains, independent of its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub shape: WorkflowShape,
    pub node_count: usize,
    pub link_count: usize,
    /// Distinct class types, in first-seen order.
    pub class_types: Vec<String>,
    /// Checkpoint filenames referenced by checkpoint loaders.
    pub referenced_models: Vec<String>,
    /// LoRA filenames referenced by LoRA loaders.
    pub referenced_loras: Vec<String>,
}

/// Classify a JSON value as one of the ComfyUI document shapes.
pub fn detect_shape(json: &serde_json::Value) -> Option<WorkflowShape> {
    let obj = json.as_object()?;

    if let (Some(nodes), Some(_)) = (
        obj.get("nodes").and_then(|v| v.as_array()),
        obj.get("links").and_then(|v| v.as_array()),
    ) {
        let well_formed = !nodes.is_empty()
            && nodes
                .iter()
                .all(|n| n.get("id").is_some() && n.get("type").and_then(|t| t.as_str()).is_some());
        return well_formed.then_some(WorkflowShape::UiGraph);
    }

    let is_prompt = !obj.is_empty()
        && obj
            .values()
            .all(|node| node.get("class_type").and_then(|v| v.as_str()).is_some());
    is_prompt.then_some(WorkflowShape::ApiPrompt)
}

/// Whether a JSON value is either ComfyUI document shape.
pub fn looks_like_workflow(json: &serde_json::Value) -> bool {
    detect_shape(json).is_some()
}

/// Summarize a UI graph or API prompt.
pub fn summarize(json: &serde_json::Value) -> Result<WorkflowSummary, CoreError> {
    let shape = detect_shape(json).ok_or_else(|| {
        CoreError::Validation("JSON is not a ComfyUI workflow or prompt".to_string())
    })?;

    let mut summary = WorkflowSummary {
        shape,
        node_count: 0,
        link_count: 0,
        class_types: Vec::new(),
        referenced_models: Vec::new(),
        referenced_loras: Vec::new(),
    };

    match shape {
        WorkflowShape::UiGraph => summarize_ui_graph(json, &mut summary),
        WorkflowShape::ApiPrompt => summarize_api_prompt(json, &mut summary),
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn summarize_ui_graph(json: &serde_json::Value, summary: &mut WorkflowSummary) {
    let nodes = json["nodes"].as_array().map(Vec::as_slice).unwrap_or_default();
    summary.node_count = nodes.len();
    summary.link_count = json["links"].as_array().map_or(0, Vec::len);

    for node in nodes {
        let Some(class_type) = node["type"].as_str() else {
            continue;
        };
        push_unique(&mut summary.class_types, class_type);

        // UI graphs only carry widget values positionally; the file name is
        // the first widget for both loader classes.
        let first_widget = node["widgets_values"].get(0).and_then(|v| v.as_str());
        record_reference(summary, class_type, first_widget);
    }
}

fn summarize_api_prompt(json: &serde_json::Value, summary: &mut WorkflowSummary) {
    let Some(obj) = json.as_object() else {
        return;
    };
    summary.node_count = obj.len();

    for node in obj.values() {
        let Some(class_type) = node["class_type"].as_str() else {
            continue;
        };
        push_unique(&mut summary.class_types, class_type);

        // Connections are encoded as `[source_node_id, output_index]`.
        if let Some(inputs) = node["inputs"].as_object() {
            summary.link_count += inputs
                .values()
                .filter(|v| v.as_array().is_some_and(|a| a.len() == 2))
                .count();
        }

        let file_name = match class_type {
            class_types::CHECKPOINT_LOADER => node["inputs"]["ckpt_name"].as_str(),
            class_types::LORA_LOADER => node["inputs"]["lora_name"].as_str(),
            _ => None,
        };
        record_reference(summary, class_type, file_name);
    }
}

fn record_reference(summary: &mut WorkflowSummary, class_type: &str, file_name: Option<&str>) {
    let Some(name) = file_name else {
        return;
    };
    match class_type {
        class_types::CHECKPOINT_LOADER => push_unique(&mut summary.referenced_models, name),
        class_types::LORA_LOADER => push_unique(&mut summary.referenced_loras, name),
        _ => {}
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
