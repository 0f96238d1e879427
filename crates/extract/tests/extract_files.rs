//! Extraction from real files on disk.

use std::path::Path;

use assert_matches::assert_matches;
use comfymeta_extract::{extract_file, ExtractConfig, MediaFormat, MetadataError, Severity};

const A1111_TEXT: &str = "portrait <lora:film:0.8>\nNegative prompt: blurry\n\
    Steps: 25, Sampler: Euler a, CFG scale: 6, Seed: 7, Size: 768x512";

/// 1x1 grayscale PNG with `entries` as tEXt chunks and, optionally, one
/// zTXt chunk.
fn png_with_text_and_ztxt(entries: &[(&str, &str)], compressed: Option<(&str, &str)>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, 1, 1);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    for (key, value) in entries {
        encoder.add_text_chunk(key.to_string(), value.to_string()).unwrap();
    }
    if let Some((key, value)) = compressed {
        encoder.add_ztxt_chunk(key.to_string(), value.to_string()).unwrap();
    }
    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(&[0]).unwrap();
    writer.finish().unwrap();
    out
}

fn png_with_text(entries: &[(&str, &str)]) -> Vec<u8> {
    png_with_text_and_ztxt(entries, None)
}

/// Big-endian TIFF whose IFD0 holds a single ImageDescription string.
fn tiff_with_description(text: &str) -> Vec<u8> {
    let mut value = text.as_bytes().to_vec();
    value.push(0);

    let mut out = b"MM".to_vec();
    out.extend_from_slice(&42u16.to_be_bytes());
    out.extend_from_slice(&8u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0x010Eu16.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    // header (8) + count (2) + entry (12) + next IFD (4)
    out.extend_from_slice(&26u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&value);
    out
}

/// Encoded 1x1 JPEG with an APP1 `Exif` segment spliced in after SOI.
fn jpeg_with_tiff(tiff: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut encoded)
        .encode(&[128, 128, 128], 1, 1, image::ExtendedColorType::Rgb8)
        .unwrap();

    let mut out = encoded[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&encoded[2..]);
    out
}

async fn write(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, data).await.unwrap();
    path
}

// -- images --

#[tokio::test]
async fn extracts_a1111_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "a1111.png", &png_with_text(&[("parameters", A1111_TEXT)])).await;

    let meta = extract_file(&path, &ExtractConfig::default()).await.unwrap();
    assert_eq!(meta.format, MediaFormat::Png);
    assert_eq!(meta.parameters.as_deref(), Some(A1111_TEXT));
    let raw = meta.raw_parameters().unwrap();
    assert_eq!(raw["size"], "768x512");
    assert!(!meta.has_comfyui());
}

#[tokio::test]
async fn extracts_comfyui_png() {
    let prompt = r#"{"3":{"class_type":"KSampler","inputs":{"seed":5}}}"#;
    let workflow = r#"{"nodes":[{"id":3,"type":"KSampler"}],"links":[]}"#;
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "comfy.png",
        &png_with_text(&[("prompt", prompt), ("workflow", workflow)]),
    )
    .await;

    let meta = extract_file(&path, &ExtractConfig::default()).await.unwrap();
    assert_eq!(meta.prompt.unwrap()["3"]["class_type"], "KSampler");
    assert_eq!(meta.workflow.unwrap()["nodes"][0]["id"], 3);
}

#[tokio::test]
async fn extracts_compressed_comfyui_workflow() {
    let workflow = r#"{"nodes":[{"id":9,"type":"SaveImage"}],"links":[]}"#;
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "zipped.png",
        &png_with_text_and_ztxt(&[], Some(("workflow", workflow))),
    )
    .await;

    let meta = extract_file(&path, &ExtractConfig::default()).await.unwrap();
    assert_eq!(meta.workflow.unwrap()["nodes"][0]["type"], "SaveImage");
}

#[tokio::test]
async fn extracts_latin1_a1111_png() {
    let text = "caf\u{e9} terrace\nSteps: 20, Sampler: Euler, CFG scale: 7";
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "cafe.png", &png_with_text(&[("parameters", text)])).await;

    let meta = extract_file(&path, &ExtractConfig::default()).await.unwrap();
    let raw = meta.raw_parameters().unwrap();
    assert_eq!(raw["positive_prompt"], "café terrace");
}

#[tokio::test]
async fn extracts_a1111_from_jpeg_exif() {
    let dir = tempfile::tempdir().unwrap();
    let jpeg = jpeg_with_tiff(&tiff_with_description(A1111_TEXT));
    // extension deliberately wrong: detection uses magic bytes
    let path = write(dir.path(), "photo.png", &jpeg).await;

    let meta = extract_file(&path, &ExtractConfig::default()).await.unwrap();
    assert_eq!(meta.format, MediaFormat::Jpeg);
    assert_eq!(meta.fields["ImageDescription"], A1111_TEXT);
    assert_eq!(meta.parameters.as_deref(), Some(A1111_TEXT));
}

// -- failures --

#[tokio::test]
async fn png_without_generation_data_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "plain.png", &png_with_text(&[("Software", "gimp")])).await;

    let err = extract_file(&path, &ExtractConfig::default()).await.unwrap_err();
    assert_matches!(err, MetadataError::MetadataNotFound(_));
    assert_eq!(err.severity(), Severity::Low);
}

#[tokio::test]
async fn unknown_container_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "notes.txt", b"hello world, not an image").await;

    assert_matches!(
        extract_file(&path, &ExtractConfig::default()).await,
        Err(MetadataError::UnsupportedFormat(_))
    );
}

#[tokio::test]
async fn missing_file_is_a_file_access_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract_file(&dir.path().join("gone.png"), &ExtractConfig::default())
        .await
        .unwrap_err();
    assert_matches!(err, MetadataError::FileAccess { .. });
    assert_eq!(err.to_json()["code"], "FILE_ACCESS_ERROR");
}

#[tokio::test]
async fn video_uses_configured_probe_tool() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "clip.mp4", b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00").await;
    let config = ExtractConfig {
        ffprobe_path: "comfymeta-missing-ffprobe".to_string(),
    };

    assert_matches!(
        extract_file(&path, &config).await,
        Err(MetadataError::ExternalCommand { .. })
    );
}
