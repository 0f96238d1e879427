//! Command-line arguments and their merge with [`CliConfig`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use comfymeta_core::ConversionOptions;
use comfymeta_extract::ExtractConfig;

use crate::config::CliConfig;

/// How each file's report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One compact JSON object per line.
    Json,
    /// Indented JSON.
    Pretty,
    /// One human-readable line per file.
    Summary,
}

/// Extract generation metadata from images and videos and rebuild A1111
/// parameters as ComfyUI workflows.
#[derive(Debug, Parser)]
#[command(name = "comfymeta", version)]
pub struct Args {
    /// Files or directories to process.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Descend into subdirectories.
    #[arg(short, long)]
    pub recursive: bool,

    /// Convert A1111 parameters into a ComfyUI workflow.
    #[arg(short, long)]
    pub convert: bool,

    /// Write extracted and converted JSON next to each input (or to --output-dir).
    #[arg(short, long)]
    pub save: bool,

    /// Directory for saved JSON files.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    pub format: OutputFormat,

    /// Keep `<lora:…>` tags in the converted positive prompt.
    #[arg(long)]
    pub keep_lora_tags: bool,

    /// Id of the first node in converted workflows.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub start_id: Option<u32>,

    /// Checkpoint used when the parameters name none.
    #[arg(long)]
    pub default_model: Option<String>,

    /// Canvas size (`WIDTHxHEIGHT`) used when the parameters give none.
    #[arg(long)]
    pub default_size: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub inputs: Vec<PathBuf>,
    pub recursive: bool,
    pub convert: bool,
    pub save: bool,
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub extract: ExtractConfig,
    pub conversion: ConversionOptions,
}

impl Args {
    /// Merge flags over environment configuration.
    pub fn into_settings(self, config: CliConfig) -> RunSettings {
        RunSettings {
            inputs: self.inputs,
            recursive: self.recursive,
            convert: self.convert,
            save: self.save,
            output_dir: self.output_dir.or(config.output_dir),
            format: self.format,
            extract: ExtractConfig {
                ffprobe_path: config.ffprobe_path,
            },
            conversion: ConversionOptions {
                strip_lora_tags: !self.keep_lora_tags,
                default_model_name: self.default_model.unwrap_or(config.default_model),
                default_canvas_size: self.default_size.unwrap_or(config.default_size),
                starting_node_id: self.start_id.unwrap_or(config.start_id),
            },
        }
    }
}
