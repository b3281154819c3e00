use crate::common::{Offset, Tag};

/// Everything that can go wrong while reading, writing or locating blocks.
///
/// None of these are fatal: the console reports them and the boot path falls
/// back to the compiled-in configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tag must be exactly 4 bytes, got {0}")]
    InvalidTag(usize),

    #[error("payload of {0} bytes exceeds the 255 byte block limit")]
    PayloadTooLarge(usize),

    #[error("no block with tag [{0}] found")]
    BlockNotFound(Tag),

    #[error("block [{tag}] at [{offset}] failed checksum: stored {stored:#04x}, computed {computed:#04x}")]
    ChecksumMismatch {
        tag: Tag,
        offset: Offset,
        stored: u8,
        computed: u8,
    },

    #[error("block payload of {needed} bytes does not fit a {capacity} byte buffer")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("block truncated: need {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("raw block is {actual} bytes but its length byte describes {described}")]
    LengthMismatch { described: usize, actual: usize },

    #[error("raw block does not start with the block marker")]
    MissingMarker,

    #[error("{len} bytes at [{offset}] fall outside [{start}, {end})")]
    OutOfBounds {
        offset: Offset,
        len: usize,
        start: Offset,
        end: Offset,
    },

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("options parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
