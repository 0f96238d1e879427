//! End-to-end batch runs over a temporary directory.

use std::path::{Path, PathBuf};

use comfymeta_cli::args::{OutputFormat, RunSettings};
use comfymeta_cli::runner::run;
use comfymeta_core::ConversionOptions;
use comfymeta_extract::ExtractConfig;

const A1111_TEXT: &str = "a lighthouse at dusk <lora:film_grain:0.4>\n\
    Negative prompt: lowres\n\
    Steps: 24, Sampler: DPM++ SDE, CFG scale: 5.5, Seed: 3, Size: 640x640, \
    Denoising strength: 0.35, Hires upscale: 2, Hires upscaler: 4x-UltraSharp";

fn png_with_text(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, 1, 1);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    for (key, value) in entries {
        encoder.add_text_chunk(key.to_string(), value.to_string()).unwrap();
    }
    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(&[0]).unwrap();
    writer.finish().unwrap();
    out
}

fn settings(inputs: Vec<PathBuf>, format: OutputFormat) -> RunSettings {
    RunSettings {
        inputs,
        recursive: false,
        convert: true,
        save: false,
        output_dir: None,
        format,
        extract: ExtractConfig::default(),
        conversion: ConversionOptions::default(),
    }
}

fn write(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

#[tokio::test]
async fn converts_and_saves_a1111_png() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lighthouse.png", &png_with_text(&[("parameters", A1111_TEXT)]));
    let out_dir = dir.path().join("out");

    let mut settings = settings(vec![dir.path().to_path_buf()], OutputFormat::Json);
    settings.save = true;
    settings.output_dir = Some(out_dir.clone());

    let mut stdout = Vec::new();
    let stats = run(&settings, &mut stdout).await;
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.exit_code(), 0);

    let line = String::from_utf8(stdout).unwrap();
    let report: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(report["conversion"]["success"], true);
    assert_eq!(report["conversion"]["upscaler"]["model"], "4x-UltraSharp");
    assert_eq!(report["conversion"]["loras"][0]["name"], "film_grain");

    let saved = std::fs::read_to_string(out_dir.join("lighthouse_converted.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&saved).unwrap();
    // 7 base + 1 LoRA + 5 upscale
    assert_eq!(doc["nodes"].as_array().unwrap().len(), 13);
    assert_eq!(doc["last_link_id"], 21);
}

#[tokio::test]
async fn saves_embedded_comfyui_documents() {
    let dir = tempfile::tempdir().unwrap();
    let prompt = r#"{"4":{"class_type":"CheckpointLoaderSimple","inputs":{"ckpt_name":"m.safetensors"}}}"#;
    let workflow = r#"{"nodes":[{"id":4,"type":"CheckpointLoaderSimple","widgets_values":["m.safetensors"]}],"links":[]}"#;
    let input = write(
        dir.path(),
        "comfy.png",
        &png_with_text(&[("prompt", prompt), ("workflow", workflow)]),
    );

    let mut settings = settings(vec![input], OutputFormat::Summary);
    settings.save = true;

    let mut stdout = Vec::new();
    let stats = run(&settings, &mut stdout).await;
    assert_eq!(stats.failed, 0);

    let line = String::from_utf8(stdout).unwrap();
    assert!(line.contains("comfyui UiGraph (1 nodes, 0 links)"), "{line}");
    assert!(dir.path().join("comfy_workflow.json").exists());
    assert!(dir.path().join("comfy_prompt.json").exists());
    assert!(!dir.path().join("comfy_converted.json").exists());
}

#[tokio::test]
async fn failures_are_counted_and_the_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.png", &png_with_text(&[("parameters", A1111_TEXT)]));
    let empty = write(dir.path(), "empty.png", &png_with_text(&[("Software", "gimp")]));
    let missing = dir.path().join("missing.png");

    let settings = settings(vec![empty, missing, good], OutputFormat::Summary);
    let mut stdout = Vec::new();
    let stats = run(&settings, &mut stdout).await;

    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.exit_code(), 1);
    assert!(String::from_utf8(stdout).unwrap().contains("good.png"));
}
