//! Generation metadata extraction from image and video files.
//!
//! Reads PNG text chunks, JPEG / WebP EXIF strings and video container tags,
//! then classifies what it finds as ComfyUI workflow JSON, ComfyUI prompt
//! JSON, or Automatic1111 parameters text.

use std::collections::BTreeMap;

pub mod error;
pub mod exif;
pub mod extractor;
pub mod format;
pub mod png;
pub mod video;

pub use error::{MetadataError, Severity};
pub use extractor::{extract_file, ExtractConfig, ExtractedMetadata};
pub use format::MediaFormat;

/// Raw text fields read from a container, keyed by chunk keyword, EXIF tag
/// name or container tag.
pub type RawFields = BTreeMap<String, String>;
