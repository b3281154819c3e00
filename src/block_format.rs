use crate::crc::crc8;

// [marker(4)] [tag(4)] [length(1)] [payload(length)] [checksum(1)]
pub const MARKER: [u8; MARKER_SIZE] = *b"MGGG";
pub const MARKER_SIZE: usize = 4;
pub const TAG_SIZE: usize = 4;
pub const LENGTH_SIZE: usize = 1;
pub const CHECKSUM_SIZE: usize = 1;

pub const TAG_OFFSET: usize = MARKER_SIZE;
pub const LENGTH_OFFSET: usize = TAG_OFFSET + TAG_SIZE;
pub const HEADER_SIZE: usize = MARKER_SIZE + TAG_SIZE + LENGTH_SIZE;

/// The length field is one byte wide.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;
pub const MIN_BLOCK_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;
pub const MAX_BLOCK_SIZE: usize = MIN_BLOCK_SIZE + MAX_PAYLOAD;

/// Total encoded size of a block carrying `payload_len` bytes.
#[inline]
pub const fn block_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + CHECKSUM_SIZE
}

/// Checksum over `tag ++ length ++ payload`; the marker is not covered.
#[inline]
pub fn block_checksum(tag: &[u8], len: u8, payload: &[u8]) -> u8 {
    crc8::extend(crc8::extend(crc8::value(tag), &[len]), payload)
}
