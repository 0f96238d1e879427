//! Batch driver: extract, convert, print and save each input in turn.

use std::io::Write;
use std::path::Path;

use comfymeta_core::convert;
use comfymeta_core::workflow_check::summarize;
use comfymeta_extract::extract_file;

use crate::args::RunSettings;
use crate::collect::collect_inputs;
use crate::output::{render, save_report, FileReport};

/// Outcome counts for a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub processed: usize,
    pub failed: usize,
}

impl RunStats {
    /// Process exit code: `1` when any input failed.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed > 0)
    }
}

/// Process every input, writing reports to `out`.
///
/// A failing file is logged, reported on stderr and counted; the batch
/// always runs to the end.
pub async fn run(settings: &RunSettings, out: &mut impl Write) -> RunStats {
    let collected = collect_inputs(&settings.inputs, settings.recursive);
    let mut stats = RunStats::default();

    for (path, reason) in &collected.rejected {
        report_failure(path, reason);
        stats.failed += 1;
    }

    tracing::info!(files = collected.files.len(), "Processing inputs");

    for path in &collected.files {
        match process_file(path, settings).await {
            Ok(report) => {
                let failed = report.conversion.as_ref().is_some_and(|c| !c.success);
                match render(&report, settings.format) {
                    Ok(text) => {
                        if let Err(e) = writeln!(out, "{text}") {
                            tracing::error!(error = %e, "Failed to write report");
                        }
                    }
                    Err(e) => report_failure(path, &format!("{e:#}")),
                }
                stats.processed += 1;
                if failed {
                    stats.failed += 1;
                }
            }
            Err(e) => {
                report_failure(path, &format!("{e:#}"));
                stats.failed += 1;
            }
        }
    }

    tracing::info!(processed = stats.processed, failed = stats.failed, "Done");
    stats
}

async fn process_file(path: &Path, settings: &RunSettings) -> anyhow::Result<FileReport> {
    let metadata = extract_file(path, &settings.extract).await?;

    let comfyui_summary = metadata
        .workflow
        .as_ref()
        .or(metadata.prompt.as_ref())
        .and_then(|json| summarize(json).ok());

    let conversion = if settings.convert {
        match metadata.raw_parameters() {
            Some(raw) => {
                let result = convert(&raw, &settings.conversion);
                if let Some(error) = &result.error {
                    tracing::error!(path = %path.display(), error = %error, "Conversion failed");
                }
                Some(result)
            }
            None => {
                tracing::info!(path = %path.display(), "No A1111 parameters to convert");
                None
            }
        }
    } else {
        None
    };

    let mut report = FileReport {
        metadata,
        comfyui_summary,
        conversion,
        saved: Vec::new(),
    };

    if settings.save {
        report.saved = save_report(&report, settings.output_dir.as_deref()).await?;
    }

    Ok(report)
}

fn report_failure(path: &Path, reason: &str) {
    tracing::error!(path = %path.display(), error = %reason, "Failed to process file");
    eprintln!("error: {}: {reason}", path.display());
}
