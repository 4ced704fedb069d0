//! Document ↔ chunk conversion.
//!
//! A document is framed as
//!
//! ```text
//! +--------+----------------+-----------------+-------------+
//! | tag u8 | payload_len u32 BE | payload ... | zero padding |
//! +--------+----------------+-----------------+-------------+
//! ```
//!
//! and cut into `CHUNK_SIZE`-byte chunks. Each chunk becomes one field
//! element. The empty binary document is special: it encodes to no chunks at
//! all, and no chunks decode back to it.
//!
//! Decoding is strict. Wrong credentials yield random-looking chunks, and
//! every check below is another chance for those to be rejected as
//! [`StoreError::MalformedDocument`] rather than surface as junk.

use serde_json::Value;

use crate::config::{CHUNK_SIZE, FRAME_HEADER_LENGTH};
use crate::error::{StoreError, StoreResult};

/// One chunk of an encoded document.
pub type Chunk = [u8; CHUNK_SIZE];

const TAG_JSON: u8 = 1;
const TAG_TEXT: u8 = 2;
const TAG_BINARY: u8 = 3;

/// A plaintext stored in one partition.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// A JSON value, stored in compact form.
    Json(Value),
    /// UTF-8 text.
    Text(String),
    /// Arbitrary bytes.
    Binary(Vec<u8>),
}

impl Document {
    /// Short lowercase name of the variant, for logs and the CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// `true` for the document that encodes to zero chunks.
    pub fn is_empty_binary(&self) -> bool {
        matches!(self, Self::Binary(bytes) if bytes.is_empty())
    }
}

/// Number of chunks a frame around `payload_len` bytes occupies.
pub fn chunks_for_payload(payload_len: usize) -> usize {
    (FRAME_HEADER_LENGTH + payload_len).div_ceil(CHUNK_SIZE)
}

/// Frame and chunk a document.
pub fn encode(document: &Document) -> StoreResult<Vec<Chunk>> {
    if document.is_empty_binary() {
        return Ok(Vec::new());
    }

    let (tag, payload) = match document {
        Document::Json(value) => (
            TAG_JSON,
            serde_json::to_vec(value).map_err(|_| StoreError::MalformedDocument)?,
        ),
        Document::Text(text) => (TAG_TEXT, text.as_bytes().to_vec()),
        Document::Binary(bytes) => (TAG_BINARY, bytes.clone()),
    };
    let payload_len = u32::try_from(payload.len()).map_err(|_| StoreError::MalformedDocument)?;

    let mut frame = Vec::with_capacity(chunks_for_payload(payload.len()) * CHUNK_SIZE);
    frame.push(tag);
    frame.extend_from_slice(&payload_len.to_be_bytes());
    frame.extend_from_slice(&payload);
    frame.resize(frame.len().div_ceil(CHUNK_SIZE) * CHUNK_SIZE, 0);

    Ok(frame
        .chunks_exact(CHUNK_SIZE)
        .map(|c| {
            let mut chunk = [0u8; CHUNK_SIZE];
            chunk.copy_from_slice(c);
            chunk
        })
        .collect())
}

/// Reassemble and validate a document from its chunks.
pub fn decode(chunks: &[Chunk]) -> StoreResult<Document> {
    if chunks.is_empty() {
        return Ok(Document::Binary(Vec::new()));
    }

    let frame: Vec<u8> = chunks.iter().flatten().copied().collect();

    let tag = frame[0];
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&frame[1..FRAME_HEADER_LENGTH]);
    let payload_len = u32::from_be_bytes(len_bytes) as usize;

    let frame_end = FRAME_HEADER_LENGTH
        .checked_add(payload_len)
        .ok_or(StoreError::MalformedDocument)?;
    if frame_end > frame.len() || chunks_for_payload(payload_len) != chunks.len() {
        return Err(StoreError::MalformedDocument);
    }
    if frame[frame_end..].iter().any(|&b| b != 0) {
        return Err(StoreError::MalformedDocument);
    }

    let payload = &frame[FRAME_HEADER_LENGTH..frame_end];
    match tag {
        TAG_JSON => serde_json::from_slice(payload)
            .map(Document::Json)
            .map_err(|_| StoreError::MalformedDocument),
        TAG_TEXT => String::from_utf8(payload.to_vec())
            .map(Document::Text)
            .map_err(|_| StoreError::MalformedDocument),
        TAG_BINARY => Ok(Document::Binary(payload.to_vec())),
        _ => Err(StoreError::MalformedDocument),
    }
}
