//! PNG text chunk reader.
//!
//! Generation metadata lives in the three PNG text chunk kinds: `tEXt`
//! (Latin-1), `zTXt` (deflated Latin-1) and `iTXt` (UTF-8, optionally
//! deflated). Decoding is left to the `png` crate.

use std::io::Cursor;

use png::Info;

use crate::error::MetadataError;
use crate::format::PNG_SIGNATURE;
use crate::RawFields;

/// Collect every text chunk keyword/value pair.
///
/// A file whose header cannot be decoded yields no fields. Chunks that
/// follow the image data are included when the rest of the file is intact;
/// otherwise only the chunks ahead of it are returned.
pub fn read_text_chunks(data: &[u8]) -> Result<RawFields, MetadataError> {
    if !data.starts_with(&PNG_SIGNATURE) {
        return Err(MetadataError::Parse("missing PNG signature".to_string()));
    }

    let mut reader = match png::Decoder::new(Cursor::new(data)).read_info() {
        Ok(reader) => reader,
        Err(err) => {
            tracing::debug!(error = %err, "Unreadable PNG header");
            return Ok(RawFields::new());
        }
    };

    // Skips the image data and reads the remaining chunks up to IEND.
    if let Err(err) = reader.finish() {
        tracing::debug!(error = %err, "PNG truncated after header, keeping leading text chunks");
    }

    Ok(collect_text(reader.info()))
}

fn collect_text(info: &Info<'_>) -> RawFields {
    let mut fields = RawFields::new();

    for chunk in &info.uncompressed_latin1_text {
        insert_keyword(&mut fields, &chunk.keyword, chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        match chunk.get_text() {
            Ok(text) => insert_keyword(&mut fields, &chunk.keyword, text),
            Err(err) => tracing::debug!(keyword = %chunk.keyword, error = %err, "Bad zTXt chunk"),
        }
    }
    for chunk in &info.utf8_text {
        match chunk.get_text() {
            Ok(text) => insert_keyword(&mut fields, &chunk.keyword, text),
            Err(err) => tracing::debug!(keyword = %chunk.keyword, error = %err, "Bad iTXt chunk"),
        }
    }

    fields
}

fn insert_keyword(fields: &mut RawFields, keyword: &str, text: String) {
    if !keyword.is_empty() {
        fields.insert(keyword.to_string(), text);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
