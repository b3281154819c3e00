use log::{debug, warn};

use crate::block_format::*;
use crate::block_reader::{read_block, StoredBlock};
use crate::common::{Offset, Tag};
use crate::error::{Error, Result};
use crate::options::Region;
use crate::storage::Storage;

/// True when the block marker starts at `offset` and fits inside the region.
pub fn at_block_start<S: Storage>(storage: &mut S, region: &Region, offset: Offset) -> Result<bool> {
    if !region.contains(offset, MARKER_SIZE) {
        return Ok(false);
    }
    let mut marker = [0u8; MARKER_SIZE];
    storage.read(offset, &mut marker)?;
    Ok(marker == MARKER)
}

fn tag_matches<S: Storage>(storage: &mut S, region: &Region, offset: Offset, tag: &Tag) -> Result<bool> {
    if !region.contains(offset, TAG_SIZE) {
        return Ok(false);
    }
    let mut found = [0u8; TAG_SIZE];
    storage.read(offset, &mut found)?;
    Ok(&found == tag.as_bytes())
}

/// Finds the first block at or after `start`, optionally with a given tag.
///
/// The scan moves one byte at a time, so blocks of any length are found
/// without an index. A marker that happens to appear inside a payload is
/// matched like any other.
pub fn locate<S: Storage>(
    storage: &mut S,
    region: &Region,
    tag: Option<&Tag>,
    start: Offset,
) -> Result<Option<Offset>> {
    let mut offset = start.max(region.start);
    while offset < region.end {
        if at_block_start(storage, region, offset)? {
            match tag {
                None => return Ok(Some(offset)),
                Some(tag) => {
                    if tag_matches(storage, region, offset + TAG_OFFSET, tag)? {
                        return Ok(Some(offset));
                    }
                }
            }
        }
        offset += 1;
    }
    Ok(None)
}

/// One marker found by [`BlockScan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    Block(StoredBlock),
    Corrupt { offset: Offset, reason: String },
}

/// Walks every block in the region from its start.
///
/// A well-formed block moves the cursor past its last byte. Anything else at
/// a marker (bad checksum, truncated, oversized) moves it by a single byte, so
/// damaged data can never stall the scan.
pub struct BlockScan<'a, S: Storage> {
    storage: &'a mut S,
    region: Region,
    cursor: Offset,
    done: bool,
}

impl<'a, S: Storage> BlockScan<'a, S> {
    pub fn new(storage: &'a mut S, region: Region) -> Self {
        Self {
            storage,
            cursor: region.start,
            region,
            done: false,
        }
    }
}

impl<S: Storage> Iterator for BlockScan<'_, S> {
    type Item = Result<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let found = match locate(self.storage, &self.region, None, self.cursor) {
            Ok(Some(found)) => found,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        match read_block(self.storage, &self.region, found, MAX_PAYLOAD) {
            Ok(block) if block.is_valid() => {
                debug!("block [{}] at {} len {}", block.tag, found, block.span().len);
                self.cursor = block.span().end();
                Some(Ok(ScanEntry::Block(block)))
            }
            Ok(block) => {
                warn!("block [{}] at {} failed checksum", block.tag, found);
                self.cursor = found + 1;
                Some(Ok(ScanEntry::Corrupt {
                    offset: found,
                    reason: format!("block [{}] failed checksum", block.tag),
                }))
            }
            Err(e @ (Error::Truncated { .. } | Error::BufferTooSmall { .. } | Error::MissingMarker)) => {
                warn!("unreadable block at {}: {}", found, e);
                self.cursor = found + 1;
                Some(Ok(ScanEntry::Corrupt {
                    offset: found,
                    reason: e.to_string(),
                }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
