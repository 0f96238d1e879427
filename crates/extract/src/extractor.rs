//! File-level extraction: container dispatch and content classification.

use std::path::{Path, PathBuf};

use comfymeta_core::a1111::{looks_like_a1111, parse_a1111_parameters};
use comfymeta_core::types::RawParameters;
use comfymeta_core::workflow_check::{detect_shape, WorkflowShape};
use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::error::MetadataError;
use crate::exif::{jpeg_exif, read_tiff_fields, webp_exif};
use crate::format::{MediaFormat, SNIFF_LEN};
use crate::png::read_text_chunks;
use crate::video::probe_tags;
use crate::RawFields;

/// Default name of the probe tool for video containers.
pub const DEFAULT_FFPROBE: &str = "ffprobe";

/// Fields searched for A1111 parameters text, in priority order.
pub const A1111_FIELD_PRIORITY: [&str; 4] = ["parameters", "UserComment", "ImageDescription", "comment"];

/// Keys whose values must hold ComfyUI JSON.
const COMFYUI_KEYS: [&str; 2] = ["workflow", "prompt"];

/// Settings for [`extract_file`].
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Program used to read video container tags.
    pub ffprobe_path: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: DEFAULT_FFPROBE.to_string(),
        }
    }
}

/// Everything found in one file.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedMetadata {
    pub path: PathBuf,
    pub format: MediaFormat,
    /// Raw text fields as stored in the container.
    pub fields: RawFields,
    /// Embedded ComfyUI UI graph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<serde_json::Value>,
    /// Embedded ComfyUI API prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<serde_json::Value>,
    /// A1111 parameters text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
}

impl ExtractedMetadata {
    /// Parsed A1111 parameters, if the file carried any.
    pub fn raw_parameters(&self) -> Option<RawParameters> {
        self.parameters.as_deref().map(parse_a1111_parameters)
    }

    pub fn has_comfyui(&self) -> bool {
        self.workflow.is_some() || self.prompt.is_some()
    }
}

/// Read `path`, detect its container, and classify the metadata it carries.
pub async fn extract_file(path: &Path, config: &ExtractConfig) -> Result<ExtractedMetadata, MetadataError> {
    let file_access = |source: std::io::Error| MetadataError::FileAccess {
        path: path.display().to_string(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(file_access)?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .await
        .map_err(file_access)?;

    let format = MediaFormat::detect(&header, path).ok_or_else(|| {
        MetadataError::UnsupportedFormat(path.display().to_string())
    })?;
    tracing::debug!(path = %path.display(), ?format, "Detected container");

    let fields = if format.is_video() {
        probe_tags(&config.ffprobe_path, path).await?
    } else {
        let data = tokio::fs::read(path).await.map_err(file_access)?;
        read_image_fields(format, &data)?
    };

    classify(path, format, fields)
}

/// Raw text fields of an in-memory image.
pub fn read_image_fields(format: MediaFormat, data: &[u8]) -> Result<RawFields, MetadataError> {
    let tiff = match format {
        MediaFormat::Png => return read_text_chunks(data),
        MediaFormat::Jpeg => jpeg_exif(data),
        MediaFormat::Webp => webp_exif(data),
        other => {
            return Err(MetadataError::Validation(format!(
                "{other:?} is not an image container"
            )))
        }
    };
    match tiff {
        Some(tiff) => read_tiff_fields(&tiff),
        None => Ok(RawFields::new()),
    }
}

/// Sort raw fields into ComfyUI JSON and A1111 text.
pub fn classify(path: &Path, format: MediaFormat, fields: RawFields) -> Result<ExtractedMetadata, MetadataError> {
    let mut workflow = None;
    let mut prompt = None;
    let mut parse_errors = Vec::new();

    for (key, value) in &fields {
        for json in comfyui_candidates(key, value, &mut parse_errors) {
            match detect_shape(&json) {
                Some(WorkflowShape::UiGraph) if workflow.is_none() => workflow = Some(json),
                Some(WorkflowShape::ApiPrompt) if prompt.is_none() => prompt = Some(json),
                _ => {}
            }
        }
    }

    let parameters = A1111_FIELD_PRIORITY
        .iter()
        .filter_map(|name| field(&fields, name))
        .find(|text| looks_like_a1111(text))
        .map(str::to_string);

    if workflow.is_none() && prompt.is_none() && parameters.is_none() {
        return Err(match parse_errors.into_iter().next() {
            Some(message) => MetadataError::Parse(message),
            None => MetadataError::MetadataNotFound(path.display().to_string()),
        });
    }

    tracing::debug!(
        path = %path.display(),
        workflow = workflow.is_some(),
        prompt = prompt.is_some(),
        a1111 = parameters.is_some(),
        "Classified metadata",
    );

    Ok(ExtractedMetadata {
        path: path.to_path_buf(),
        format,
        fields,
        workflow,
        prompt,
        parameters,
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Case-insensitive field lookup.
fn field<'a>(fields: &'a RawFields, name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// JSON documents a field may hold.
///
/// Handles plain JSON values, `workflow:{…}` / `prompt:{…}` prefixed EXIF
/// strings, and wrapper objects with `workflow` / `prompt` members.
fn comfyui_candidates(key: &str, value: &str, errors: &mut Vec<String>) -> Vec<serde_json::Value> {
    let text = value.trim();
    let prefixed = COMFYUI_KEYS
        .iter()
        .find_map(|k| text.strip_prefix(*k).and_then(|rest| rest.strip_prefix(':')));
    let expects_json = prefixed.is_some() || COMFYUI_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k));
    let text = prefixed.unwrap_or(text);

    if !text.starts_with('{') {
        return Vec::new();
    }
    let json: serde_json::Value = match serde_json::from_str(text) {
        Ok(json) => json,
        Err(e) => {
            if expects_json {
                tracing::warn!(field = key, error = %e, "Invalid ComfyUI JSON");
                errors.push(format!("field {key}: {e}"));
            }
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for k in COMFYUI_KEYS {
        match json.get(k) {
            Some(serde_json::Value::String(inner)) => {
                if let Ok(inner) = serde_json::from_str(inner) {
                    found.push(inner);
                }
            }
            Some(inner @ serde_json::Value::Object(_)) => found.push(inner.clone()),
            _ => {}
        }
    }
    found.push(json);
    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    const A1111_TEXT: &str = "a cat\nNegative prompt: dog\nSteps: 20, Sampler: Euler a, CFG scale: 7";

    fn fields(pairs: &[(&str, &str)]) -> RawFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn api_prompt() -> serde_json::Value {
        json!({"3": {"class_type": "KSampler", "inputs": {"seed": 1}}})
    }

    fn ui_graph() -> serde_json::Value {
        json!({"nodes": [{"id": 1, "type": "KSampler"}], "links": []})
    }

    fn classify_fields(pairs: &[(&str, &str)]) -> Result<ExtractedMetadata, MetadataError> {
        classify(Path::new("image.png"), MediaFormat::Png, fields(pairs))
    }

    // -- ComfyUI --

    #[test]
    fn classifies_png_comfyui_chunks() {
        let workflow = ui_graph().to_string();
        let prompt = api_prompt().to_string();
        let meta = classify_fields(&[("workflow", &workflow), ("prompt", &prompt)]).unwrap();
        assert_eq!(meta.workflow, Some(ui_graph()));
        assert_eq!(meta.prompt, Some(api_prompt()));
        assert!(meta.parameters.is_none());
        assert!(meta.has_comfyui());
    }

    #[test]
    fn classifies_prefixed_exif_strings() {
        let make = format!("workflow:{}", ui_graph());
        let model = format!("prompt:{}", api_prompt());
        let meta = classify_fields(&[("Make", &make), ("Model", &model)]).unwrap();
        assert_eq!(meta.workflow, Some(ui_graph()));
        assert_eq!(meta.prompt, Some(api_prompt()));
    }

    #[test]
    fn classifies_by_shape_not_by_key() {
        let swapped = api_prompt().to_string();
        let meta = classify_fields(&[("workflow", &swapped)]).unwrap();
        assert!(meta.workflow.is_none());
        assert_eq!(meta.prompt, Some(api_prompt()));
    }

    #[test]
    fn unwraps_video_comment_wrapper() {
        let comment = json!({"prompt": api_prompt().to_string(), "workflow": ui_graph()}).to_string();
        let meta = classify(Path::new("clip.mp4"), MediaFormat::Mp4, fields(&[("comment", &comment)])).unwrap();
        assert_eq!(meta.prompt, Some(api_prompt()));
        assert_eq!(meta.workflow, Some(ui_graph()));
    }

    #[test]
    fn invalid_comfyui_json_is_a_parse_error() {
        assert_matches!(
            classify_fields(&[("prompt", "{not json")]),
            Err(MetadataError::Parse(_))
        );
    }

    // -- A1111 --

    #[test]
    fn a1111_field_priority() {
        let meta = classify_fields(&[
            ("ImageDescription", "Steps: 1, Sampler: X, CFG scale: 2"),
            ("parameters", A1111_TEXT),
        ])
        .unwrap();
        assert_eq!(meta.parameters.as_deref(), Some(A1111_TEXT));

        let meta = classify_fields(&[("usercomment", A1111_TEXT), ("Software", "gimp")]).unwrap();
        assert_eq!(meta.parameters.as_deref(), Some(A1111_TEXT));
    }

    #[test]
    fn raw_parameters_parses_the_text() {
        let meta = classify_fields(&[("parameters", A1111_TEXT)]).unwrap();
        let raw = meta.raw_parameters().unwrap();
        assert_eq!(raw["positive_prompt"], "a cat");
        assert_eq!(raw["negative_prompt"], "dog");
        assert_eq!(raw["sampler"], "Euler a");
    }

    #[test]
    fn unrelated_fields_are_not_found() {
        assert_matches!(
            classify_fields(&[("Software", "gimp"), ("parameters", "just a caption")]),
            Err(MetadataError::MetadataNotFound(_))
        );
        assert_matches!(classify_fields(&[]), Err(MetadataError::MetadataNotFound(_)));
    }

    // -- containers --

    #[test]
    fn jpeg_without_exif_has_no_fields() {
        let jpeg = crate::exif::tests::encoded_jpeg();
        assert!(read_image_fields(MediaFormat::Jpeg, &jpeg).unwrap().is_empty());
    }

    #[test]
    fn undecodable_jpeg_has_no_fields() {
        let jpeg: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];
        assert!(read_image_fields(MediaFormat::Jpeg, &jpeg).unwrap().is_empty());
    }

    #[test]
    fn reads_user_comment_from_jpeg() {
        use crate::exif::tests::{build_tiff, jpeg_with_exif};

        let mut comment = b"ASCII\0\0\0".to_vec();
        comment.extend_from_slice(A1111_TEXT.as_bytes());
        let jpeg = jpeg_with_exif(&build_tiff(&[], Some(&comment)));
        let fields = read_image_fields(MediaFormat::Jpeg, &jpeg).unwrap();
        assert_eq!(fields["UserComment"], A1111_TEXT);
    }

    #[test]
    fn video_formats_are_not_images() {
        assert_matches!(
            read_image_fields(MediaFormat::Mov, b""),
            Err(MetadataError::Validation(_))
        );
    }
}
