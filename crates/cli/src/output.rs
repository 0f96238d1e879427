//! Per-file reports: rendering and saving.

use std::path::{Path, PathBuf};

use anyhow::Context;
use comfymeta_core::workflow_check::WorkflowSummary;
use comfymeta_core::ConversionResult;
use comfymeta_extract::ExtractedMetadata;
use serde::Serialize;

use crate::args::OutputFormat;

/// Suffixes of the files written by [`save_report`].
pub const WORKFLOW_SUFFIX: &str = "_workflow.json";
pub const PROMPT_SUFFIX: &str = "_prompt.json";
pub const CONVERTED_SUFFIX: &str = "_converted.json";

/// Everything learned about one input file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub metadata: ExtractedMetadata,
    /// Summary of the embedded ComfyUI graph or prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comfyui_summary: Option<WorkflowSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ConversionResult>,
    /// Files written for this input.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub saved: Vec<PathBuf>,
}

/// Render a report for stdout.
pub fn render(report: &FileReport, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(report)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(report)?,
        OutputFormat::Summary => summary_line(report),
    })
}

fn summary_line(report: &FileReport) -> String {
    let meta = &report.metadata;
    let mut parts = vec![format!("{:?}", meta.format).to_lowercase()];

    if let Some(summary) = &report.comfyui_summary {
        parts.push(format!(
            "comfyui {:?} ({} nodes, {} links)",
            summary.shape, summary.node_count, summary.link_count
        ));
    } else if meta.has_comfyui() {
        parts.push("comfyui".to_string());
    }
    if meta.parameters.is_some() {
        parts.push("a1111 parameters".to_string());
    }
    match &report.conversion {
        Some(ConversionResult {
            success: true,
            workflow: Some(workflow),
            loras,
            ..
        }) => parts.push(format!(
            "converted ({} nodes, {} links, {} loras)",
            workflow.nodes.len(),
            workflow.links.len(),
            loras.len()
        )),
        Some(result) => parts.push(format!(
            "conversion failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        )),
        None => {}
    }
    for path in &report.saved {
        parts.push(format!("saved {}", path.display()));
    }

    format!("{}: {}", meta.path.display(), parts.join(", "))
}

/// Write the embedded and converted JSON documents for one input.
///
/// Files go to `output_dir` when given, otherwise next to the input.
pub async fn save_report(report: &FileReport, output_dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let input = &report.metadata.path;
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .context("input has no file name")?;

    let converted = report
        .conversion
        .as_ref()
        .and_then(|c| c.workflow.as_ref())
        .map(serde_json::to_value)
        .transpose()?;
    let documents = [
        (WORKFLOW_SUFFIX, report.metadata.workflow.as_ref()),
        (PROMPT_SUFFIX, report.metadata.prompt.as_ref()),
        (CONVERTED_SUFFIX, converted.as_ref()),
    ];

    if documents.iter().any(|(_, doc)| doc.is_some()) && !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut saved = Vec::new();
    for (suffix, document) in documents {
        let Some(document) = document else {
            continue;
        };
        let path = dir.join(format!("{stem}{suffix}"));
        let body = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "Saved JSON");
        saved.push(path);
    }

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use comfymeta_core::types::RawParameters;
    use comfymeta_core::{convert, ConversionOptions};
    use comfymeta_extract::extractor::classify;
    use comfymeta_extract::{MediaFormat, RawFields};

    use super::*;

    const A1111_TEXT: &str = "a cat <lora:fur:0.5>\nSteps: 20, Sampler: Euler, CFG scale: 7";

    fn report_for(dir: &Path) -> FileReport {
        let fields: RawFields = [("parameters".to_string(), A1111_TEXT.to_string())].into();
        let metadata = classify(&dir.join("cat.png"), MediaFormat::Png, fields).unwrap();
        let raw: RawParameters = metadata.raw_parameters().unwrap();
        let conversion = convert(&raw, &ConversionOptions::default());
        FileReport {
            metadata,
            comfyui_summary: None,
            conversion: Some(conversion),
            saved: Vec::new(),
        }
    }

    #[test]
    fn summary_mentions_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let line = render(&report_for(dir.path()), OutputFormat::Summary).unwrap();
        assert!(line.contains("png"));
        assert!(line.contains("a1111 parameters"));
        assert!(line.contains("converted (8 nodes, 11 links, 1 loras)"), "{line}");
    }

    #[test]
    fn json_output_is_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let line = render(&report_for(dir.path()), OutputFormat::Json).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["conversion"]["success"], true);
        assert_eq!(value["metadata"]["format"], "png");
    }

    #[tokio::test]
    async fn saves_converted_workflow_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_report(&report_for(dir.path()), None).await.unwrap();
        assert_eq!(saved, vec![dir.path().join("cat_converted.json")]);

        let body = std::fs::read_to_string(&saved[0]).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["nodes"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn saves_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out/nested");
        let saved = save_report(&report_for(dir.path()), Some(&out)).await.unwrap();
        assert_eq!(saved, vec![out.join("cat_converted.json")]);
        assert!(saved[0].exists());
    }
}
