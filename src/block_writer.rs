use crate::block_format::*;
use crate::common::Tag;
use crate::error::{Error, Result};

/// Encodes `(tag, payload)` into the on-storage block layout.
///
/// The tag must be exactly [`TAG_SIZE`] bytes and the payload at most
/// [`MAX_PAYLOAD`] bytes. Nothing is written anywhere; callers place the
/// returned bytes themselves.
pub fn encode(tag: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let tag = Tag::from_slice(tag)?;
    encode_block(&tag, payload)
}

pub fn encode_block(tag: &Tag, payload: &[u8]) -> Result<Vec<u8>> {
    let n = payload.len();
    if n > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge(n));
    }
    let len = n as u8;

    let mut out = Vec::with_capacity(block_len(n));
    out.extend_from_slice(&MARKER);
    out.extend_from_slice(tag.as_bytes());
    out.push(len);
    out.extend_from_slice(payload);
    out.push(block_checksum(tag.as_bytes(), len, payload));
    Ok(out)
}
