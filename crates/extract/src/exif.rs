//! EXIF text fields from JPEG and WebP containers.
//!
//! The containers are opened with the `image` decoders, which hand back the
//! raw EXIF block. That block is a TIFF structure: a byte-order mark (`II`
//! or `MM`), the magic number 42, and a chain of IFDs whose 12-byte entries
//! are `tag, type, count, value-or-offset`. Only the handful of string tags
//! that generators write prompts into are read.

use std::io::Cursor;

use image::codecs::jpeg::JpegDecoder;
use image::codecs::webp::WebPDecoder;
use image::{ImageDecoder, ImageResult};

use crate::error::MetadataError;
use crate::RawFields;

/// Prefix some writers keep in front of the TIFF structure.
const EXIF_HEADER: &[u8] = b"Exif\0\0";

pub mod tags {
    pub const IMAGE_DESCRIPTION: u16 = 0x010E;
    pub const MAKE: u16 = 0x010F;
    pub const MODEL: u16 = 0x0110;
    pub const EXIF_IFD_POINTER: u16 = 0x8769;
    pub const USER_COMMENT: u16 = 0x9286;
}

/// Field names used for the tags this module reads.
pub mod field_names {
    pub const IMAGE_DESCRIPTION: &str = "ImageDescription";
    pub const MAKE: &str = "Make";
    pub const MODEL: &str = "Model";
    pub const USER_COMMENT: &str = "UserComment";
}

const IFD0_STRING_TAGS: [(u16, &str); 3] = [
    (tags::IMAGE_DESCRIPTION, field_names::IMAGE_DESCRIPTION),
    (tags::MAKE, field_names::MAKE),
    (tags::MODEL, field_names::MODEL),
];

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// TIFF payload of a JPEG's EXIF segment.
///
/// A file the decoder rejects is treated as carrying no EXIF.
pub fn jpeg_exif(data: &[u8]) -> Option<Vec<u8>> {
    let exif = JpegDecoder::new(Cursor::new(data)).and_then(|mut decoder| decoder.exif_metadata());
    tiff_payload("jpeg", exif)
}

/// TIFF payload of a WebP's `EXIF` chunk.
pub fn webp_exif(data: &[u8]) -> Option<Vec<u8>> {
    let exif = WebPDecoder::new(Cursor::new(data)).and_then(|mut decoder| decoder.exif_metadata());
    tiff_payload("webp", exif)
}

fn tiff_payload(container: &str, exif: ImageResult<Option<Vec<u8>>>) -> Option<Vec<u8>> {
    match exif {
        Ok(Some(mut raw)) => {
            if raw.starts_with(EXIF_HEADER) {
                raw.drain(..EXIF_HEADER.len());
            }
            Some(raw)
        }
        Ok(None) => None,
        Err(err) => {
            tracing::debug!(container, error = %err, "Cannot read EXIF block");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// TIFF reader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

/// One raw IFD entry.
struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Offset of the value bytes within the TIFF data.
    value_offset: usize,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Result<Self, MetadataError> {
        let order = match data.get(0..2) {
            Some(b"II") => ByteOrder::Little,
            Some(b"MM") => ByteOrder::Big,
            _ => return Err(MetadataError::Parse("invalid TIFF byte order".to_string())),
        };
        let tiff = Self { data, order };
        if tiff.u16_at(2) != Some(42) {
            return Err(MetadataError::Parse("invalid TIFF magic number".to_string()));
        }
        Ok(tiff)
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset + 2)?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset + 4)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    fn first_ifd(&self) -> Option<usize> {
        self.u32_at(4).map(|o| o as usize)
    }

    fn entries(&self, ifd_offset: usize) -> Vec<Entry> {
        let Some(count) = self.u16_at(ifd_offset) else {
            return Vec::new();
        };
        (0..count as usize)
            .map_while(|i| {
                let at = ifd_offset + 2 + i * 12;
                let tag = self.u16_at(at)?;
                let field_type = self.u16_at(at + 2)?;
                let count = self.u32_at(at + 4)?;
                let size = type_size(field_type).saturating_mul(count as usize);
                let value_offset = if size <= 4 {
                    at + 8
                } else {
                    self.u32_at(at + 8)? as usize
                };
                Some(Entry {
                    tag,
                    field_type,
                    count,
                    value_offset,
                })
            })
            .collect()
    }

    fn bytes(&self, entry: &Entry) -> Option<&'a [u8]> {
        let len = type_size(entry.field_type).checked_mul(entry.count as usize)?;
        self.data
            .get(entry.value_offset..entry.value_offset.checked_add(len)?)
    }
}

/// Byte size of one value of a TIFF field type.
fn type_size(field_type: u16) -> usize {
    match field_type {
        // BYTE, ASCII, SBYTE, UNDEFINED
        1 | 2 | 6 | 7 => 1,
        // SHORT, SSHORT
        3 | 8 => 2,
        // LONG, SLONG, FLOAT, IFD
        4 | 9 | 11 | 13 => 4,
        // RATIONAL, SRATIONAL, DOUBLE
        5 | 10 | 12 => 8,
        _ => 1,
    }
}

/// Read the prompt-bearing string tags from a TIFF structure.
///
/// Empty values are omitted.
pub fn read_tiff_fields(data: &[u8]) -> Result<RawFields, MetadataError> {
    let tiff = Tiff::new(data)?;
    let mut fields = RawFields::new();

    let Some(ifd0) = tiff.first_ifd() else {
        return Ok(fields);
    };

    let mut exif_ifd = None;
    for entry in tiff.entries(ifd0) {
        if entry.tag == tags::EXIF_IFD_POINTER {
            exif_ifd = tiff.u32_at(entry.value_offset).map(|o| o as usize);
            continue;
        }
        let Some(&(_, name)) = IFD0_STRING_TAGS.iter().find(|(tag, _)| *tag == entry.tag) else {
            continue;
        };
        if let Some(value) = tiff.bytes(&entry).map(decode_ascii) {
            insert_non_empty(&mut fields, name, value);
        }
    }

    if let Some(exif_ifd) = exif_ifd {
        let comment = tiff
            .entries(exif_ifd)
            .into_iter()
            .find(|e| e.tag == tags::USER_COMMENT)
            .and_then(|e| tiff.bytes(&e).map(|b| decode_user_comment(b, tiff.order)));
        if let Some(comment) = comment {
            insert_non_empty(&mut fields, field_names::USER_COMMENT, comment);
        }
    }

    Ok(fields)
}

fn insert_non_empty(fields: &mut RawFields, name: &str, value: String) {
    if !value.trim().is_empty() {
        fields.insert(name.to_string(), value);
    }
}

fn decode_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

/// Decode an EXIF UserComment, honouring its 8-byte charset prefix.
fn decode_user_comment(bytes: &[u8], tiff_order: ByteOrder) -> String {
    let (prefix, body) = if bytes.len() >= 8 {
        bytes.split_at(8)
    } else {
        (&bytes[..0], bytes)
    };

    if prefix == b"UNICODE\0" {
        decode_utf16(body, tiff_order)
    } else {
        // ASCII, undefined (all zero) and anything unrecognised
        decode_ascii(body)
    }
}

/// Decode UTF-16 text whose endianness is not declared by a BOM.
///
/// ASCII-range text has a zero in every high byte, so the side with more
/// zeros is the high byte. Ties fall back to the TIFF byte order.
fn decode_utf16(body: &[u8], fallback: ByteOrder) -> String {
    let (body, order) = match body {
        [0xFF, 0xFE, rest @ ..] => (rest, ByteOrder::Little),
        [0xFE, 0xFF, rest @ ..] => (rest, ByteOrder::Big),
        _ => {
            let even_zeros = body.iter().step_by(2).filter(|&&b| b == 0).count();
            let odd_zeros = body.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
            let order = match even_zeros.cmp(&odd_zeros) {
                std::cmp::Ordering::Greater => ByteOrder::Big,
                std::cmp::Ordering::Less => ByteOrder::Little,
                std::cmp::Ordering::Equal => fallback,
            };
            (body, order)
        }
    };

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| match order {
            ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
            ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
        })
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
