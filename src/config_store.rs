use log::{debug, info, warn};

use crate::block_format::*;
use crate::block_reader::{read_block, StoredBlock};
use crate::block_writer::encode_block;
use crate::common::{BlockSpan, Offset, Tag};
use crate::error::{Error, Result};
use crate::locator::{locate, BlockScan};
use crate::options::Region;
use crate::storage::Storage;

/// Saves and loads tagged config blocks inside one region of a storage device.
pub struct ConfigStore<S: Storage> {
    storage: S,
    region: Region,
}

impl<S: Storage> ConfigStore<S> {
    pub fn new(storage: S, region: Region) -> Result<Self> {
        if region.is_empty() || region.end > storage.capacity() {
            return Err(Error::OutOfBounds {
                offset: region.start,
                len: region.len(),
                start: 0,
                end: storage.capacity(),
            });
        }
        Ok(Self { storage, region })
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    pub fn locate(&mut self, tag: Option<&Tag>, start: Offset) -> Result<Option<Offset>> {
        locate(&mut self.storage, &self.region, tag, start)
    }

    pub fn read_block_at(&mut self, offset: Offset, max_payload: usize) -> Result<StoredBlock> {
        read_block(&mut self.storage, &self.region, offset, max_payload)
    }

    /// Writes `payload` as a block tagged `tag`.
    ///
    /// With `position` the block goes exactly there. Without it the first
    /// existing block with the same tag is overwritten in place, and
    /// [`Error::BlockNotFound`] is returned when there is none.
    pub fn save(&mut self, tag: &Tag, payload: &[u8], position: Option<Offset>) -> Result<BlockSpan> {
        let bytes = encode_block(tag, payload)?;

        let start = match position {
            Some(at) => {
                info!("writing block [{}] at {}", tag, at);
                at
            }
            None => {
                let at = self
                    .locate(Some(tag), self.region.start)?
                    .ok_or(Error::BlockNotFound(*tag))?;
                info!("block [{}] found at {}", tag, at);
                self.warn_on_resize(tag, at, payload.len())?;
                at
            }
        };

        self.region.check(start, bytes.len())?;
        self.storage.write(start, &bytes)?;
        debug!("wrote {} bytes for block [{}] at {}", bytes.len(), tag, start);

        Ok(BlockSpan {
            start,
            len: bytes.len(),
        })
    }

    // A rewrite with a different length shifts the checksum byte and may
    // run into whatever block follows. It is still carried out.
    fn warn_on_resize(&mut self, tag: &Tag, at: Offset, new_len: usize) -> Result<()> {
        if !self.region.contains(at, HEADER_SIZE) {
            return Ok(());
        }
        let old_len = self.storage.read_byte(at + LENGTH_OFFSET)? as usize;
        if old_len != new_len {
            warn!(
                "rewriting block [{}] at {} with {} bytes over {} bytes; a following block may be overwritten",
                tag, at, new_len, old_len
            );
        }
        Ok(())
    }

    /// Loads the first block tagged `tag` into `buf` and returns the payload length.
    ///
    /// `buf` is only written when the block is found and passes its checksum,
    /// so on any error the caller's defaults are still intact.
    pub fn load(&mut self, tag: &Tag, buf: &mut [u8]) -> Result<usize> {
        let at = self
            .locate(Some(tag), self.region.start)?
            .ok_or(Error::BlockNotFound(*tag))?;

        let block = self.read_block_at(at, buf.len())?.into_checked()?;
        let n = block.payload.len();
        buf[..n].copy_from_slice(&block.payload);
        debug!("loaded {} bytes from block [{}] at {}", n, tag, at);
        Ok(n)
    }

    /// Fills the whole region with the filler byte, destroying every block.
    pub fn erase(&mut self) -> Result<()> {
        info!(
            "erasing [{}, {}) with {:#04x}",
            self.region.start, self.region.end, self.region.filler
        );
        self.storage
            .fill(self.region.start..self.region.end, self.region.filler)
    }

    pub fn read_bytes(&mut self, offset: Offset, count: usize) -> Result<Vec<u8>> {
        self.region.check(offset, count)?;
        let mut buf = vec![0u8; count];
        self.storage.read(offset, &mut buf)?;
        Ok(buf)
    }

    pub fn blocks(&mut self) -> BlockScan<'_, S> {
        BlockScan::new(&mut self.storage, self.region)
    }
}
