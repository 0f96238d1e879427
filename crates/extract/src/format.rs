//! Container detection from magic bytes.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The 8-byte signature every PNG file starts with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Bytes needed to recognise every supported container.
pub const SNIFF_LEN: usize = 16;

/// Media containers metadata can be extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Png,
    Jpeg,
    Webp,
    Mp4,
    Webm,
    Mov,
}

impl MediaFormat {
    /// Detect the container from its leading bytes, falling back to the file
    /// extension for video containers whose headers vary.
    pub fn detect(header: &[u8], path: &Path) -> Option<Self> {
        Self::from_magic(header).or_else(|| Self::from_video_extension(path))
    }

    pub fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(&PNG_SIGNATURE) {
            return Some(MediaFormat::Png);
        }
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(MediaFormat::Jpeg);
        }
        if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
            return Some(MediaFormat::Webp);
        }
        if header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Some(MediaFormat::Webm);
        }
        if header.len() >= 12 && &header[4..8] == b"ftyp" {
            return Some(if &header[8..10] == b"qt" {
                MediaFormat::Mov
            } else {
                MediaFormat::Mp4
            });
        }
        None
    }

    fn from_video_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp4" | "m4v" => Some(MediaFormat::Mp4),
            "webm" | "mkv" => Some(MediaFormat::Webm),
            "mov" => Some(MediaFormat::Mov),
            _ => None,
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, MediaFormat::Mp4 | MediaFormat::Webm | MediaFormat::Mov)
    }
}

/// Lower-case file extensions the extractor accepts when walking directories.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "mp4", "m4v", "webm", "mkv", "mov"];

/// Whether `path` has one of [`SUPPORTED_EXTENSIONS`].
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}
