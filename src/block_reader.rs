use crate::block_format::*;
use crate::common::{BlockSpan, Offset, Tag};
use crate::error::{Error, Result};
use crate::options::Region;
use crate::storage::Storage;

/// A block decoded from a raw byte slice. The payload borrows from the input.
///
/// A checksum mismatch does not make decoding fail: the block comes back with
/// `is_valid() == false` so callers can still report which tag was damaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock<'a> {
    pub tag: Tag,
    pub payload: &'a [u8],
    pub stored_checksum: u8,
    pub computed_checksum: u8,
}

impl DecodedBlock<'_> {
    pub fn is_valid(&self) -> bool {
        self.stored_checksum == self.computed_checksum
    }

    /// Total encoded length of the block.
    pub fn len(&self) -> usize {
        block_len(self.payload.len())
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Decodes the block held in `raw`, which must be exactly one encoded block.
///
/// `max_payload` is the capacity the caller can accept; a stored length above
/// it fails with [`Error::BufferTooSmall`] before any payload byte is looked at.
/// A length byte describing fewer bytes than `raw` holds fails with
/// [`Error::LengthMismatch`], so a damaged length can never pass a payload
/// byte off as the checksum.
pub fn decode(raw: &[u8], max_payload: usize) -> Result<DecodedBlock<'_>> {
    if raw.len() < HEADER_SIZE {
        return Err(Error::Truncated {
            needed: HEADER_SIZE,
            available: raw.len(),
        });
    }
    if raw[..MARKER_SIZE] != MARKER {
        return Err(Error::MissingMarker);
    }

    let tag = Tag::from_slice(&raw[TAG_OFFSET..TAG_OFFSET + TAG_SIZE])?;
    let len = raw[LENGTH_OFFSET];
    let n = len as usize;
    if n > max_payload {
        return Err(Error::BufferTooSmall {
            needed: n,
            capacity: max_payload,
        });
    }

    let total = block_len(n);
    if raw.len() < total {
        return Err(Error::Truncated {
            needed: total,
            available: raw.len(),
        });
    }
    if raw.len() != total {
        return Err(Error::LengthMismatch {
            described: total,
            actual: raw.len(),
        });
    }

    let payload = &raw[HEADER_SIZE..HEADER_SIZE + n];
    Ok(DecodedBlock {
        tag,
        payload,
        stored_checksum: raw[HEADER_SIZE + n],
        computed_checksum: block_checksum(tag.as_bytes(), len, payload),
    })
}

/// A block read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlock {
    pub offset: Offset,
    pub tag: Tag,
    pub payload: Vec<u8>,
    pub stored_checksum: u8,
    pub computed_checksum: u8,
}

impl StoredBlock {
    pub fn is_valid(&self) -> bool {
        self.stored_checksum == self.computed_checksum
    }

    pub fn span(&self) -> BlockSpan {
        BlockSpan {
            start: self.offset,
            len: block_len(self.payload.len()),
        }
    }

    /// Converts a damaged block into the error load reports for it.
    pub fn into_checked(self) -> Result<StoredBlock> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::ChecksumMismatch {
                tag: self.tag,
                offset: self.offset,
                stored: self.stored_checksum,
                computed: self.computed_checksum,
            })
        }
    }
}

/// Reads and decodes the block starting at `offset`.
///
/// The header is read first; the rest of the block is only read once its
/// length is known to fit both `max_payload` and the region.
///
/// Storage carries no outer length, so the extent of the block is whatever its
/// length byte says. A corrupted length that points at a byte which happens to
/// equal the checksum of the shortened block (about 1 in 256) reads back as valid.
pub fn read_block<S: Storage>(
    storage: &mut S,
    region: &Region,
    offset: Offset,
    max_payload: usize,
) -> Result<StoredBlock> {
    let available = region.end.saturating_sub(offset);
    if !region.contains(offset, HEADER_SIZE) {
        return Err(Error::Truncated {
            needed: HEADER_SIZE,
            available,
        });
    }

    let mut raw = vec![0u8; MAX_BLOCK_SIZE];
    storage.read(offset, &mut raw[..HEADER_SIZE])?;
    if raw[..MARKER_SIZE] != MARKER {
        return Err(Error::MissingMarker);
    }

    let n = raw[LENGTH_OFFSET] as usize;
    if n > max_payload {
        return Err(Error::BufferTooSmall {
            needed: n,
            capacity: max_payload,
        });
    }
    let total = block_len(n);
    if !region.contains(offset, total) {
        return Err(Error::Truncated {
            needed: total,
            available,
        });
    }
    storage.read(offset + HEADER_SIZE, &mut raw[HEADER_SIZE..total])?;

    let block = decode(&raw[..total], max_payload)?;
    Ok(StoredBlock {
        offset,
        tag: block.tag,
        payload: block.payload.to_vec(),
        stored_checksum: block.stored_checksum,
        computed_checksum: block.computed_checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_writer::encode;
    use crate::crc::crc8;
    use crate::storage::MemStorage;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn decodes_what_was_encoded() {
        let raw = encode(b"CFG1", &[0x01, 0x02]).unwrap();
        let block = decode(&raw, 2).unwrap();
        assert_eq!(block.tag, Tag::new(*b"CFG1"));
        assert_eq!(block.payload, &[0x01, 0x02]);
        assert!(block.is_valid());
        assert_eq!(block.len(), raw.len());
    }

    #[test]
    fn random_blocks_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x4d47_4747);
        for _ in 0..64 {
            let tag: [u8; TAG_SIZE] = rng.random();
            let n = rng.random_range(0..=MAX_PAYLOAD);
            let mut payload = vec![0u8; n];
            rng.fill(&mut payload[..]);

            let raw = encode(&tag, &payload).unwrap();
            let block = decode(&raw, MAX_PAYLOAD).unwrap();
            assert_eq!(block.tag.as_bytes(), &tag);
            assert_eq!(block.payload, &payload[..]);
            assert!(block.is_valid());
        }
    }

    #[test]
    fn any_bit_flip_after_marker_is_detected() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut payload = vec![0u8; 24];
        rng.fill(&mut payload[..]);
        let raw = encode(b"MBT1", &payload).unwrap();

        for byte in TAG_OFFSET..raw.len() {
            for bit in 0..8 {
                let mut bad = raw.clone();
                bad[byte] ^= 1 << bit;
                let accepted = match decode(&bad, MAX_PAYLOAD) {
                    Ok(block) => block.is_valid(),
                    Err(_) => false,
                };
                assert!(!accepted, "byte {} bit {}", byte, bit);
            }
        }
    }

    #[test]
    fn flipped_length_is_never_accepted() {
        let raw = encode(b"CFG1", &[0x01, 0x02]).unwrap();

        // 2 -> 130: longer than the caller's buffer
        let mut bad = raw.clone();
        bad[LENGTH_OFFSET] ^= 0x80;
        assert!(matches!(
            decode(&bad, 2),
            Err(Error::BufferTooSmall { needed: 130, capacity: 2 })
        ));

        // 2 -> 3: fits the buffer but runs past the end of the raw bytes
        let mut bad = raw.clone();
        bad[LENGTH_OFFSET] ^= 0x01;
        assert!(matches!(decode(&bad, 16), Err(Error::Truncated { .. })));
    }

    #[test]
    fn shortened_length_cannot_borrow_a_payload_byte_as_checksum() {
        // the first payload byte is exactly the checksum of an empty CFG1 block
        let lure = crc8::value(b"CFG1\x00");
        let raw = encode(b"CFG1", &[lure, 0x55]).unwrap();

        let mut bad = raw.clone();
        bad[LENGTH_OFFSET] ^= 0x02;
        assert!(matches!(
            decode(&bad, MAX_PAYLOAD),
            Err(Error::LengthMismatch { described: 10, actual: 12 })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut raw = encode(b"CFG1", &[0x01]).unwrap();
        raw.push(b'X');
        assert!(matches!(
            decode(&raw, MAX_PAYLOAD),
            Err(Error::LengthMismatch { described: 11, actual: 12 })
        ));
    }

    #[test]
    fn checksum_mismatch_keeps_tag() {
        let mut raw = encode(b"CFG1", &[0x01, 0x02]).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let block = decode(&raw, 2).unwrap();
        assert!(!block.is_valid());
        assert_eq!(block.tag.to_string(), "CFG1");
    }

    #[test]
    fn rejects_missing_marker_and_short_input() {
        let mut raw = encode(b"CFG1", &[0x01]).unwrap();
        assert!(matches!(decode(&raw[..5], 1), Err(Error::Truncated { needed: 9, available: 5 })));
        raw[0] = b'N';
        assert!(matches!(decode(&raw, 1), Err(Error::MissingMarker)));
    }

    #[test]
    fn reads_block_from_storage() {
        let mut mem = MemStorage::new(64, b'X');
        let raw = encode(b"CFG1", &[0x01, 0x02]).unwrap();
        mem.write(20, &raw).unwrap();

        let region = Region::new(0, 64);
        let block = read_block(&mut mem, &region, 20, MAX_PAYLOAD).unwrap();
        assert_eq!(block.offset, 20);
        assert_eq!(block.payload, vec![0x01, 0x02]);
        assert_eq!(block.span(), BlockSpan { start: 20, len: 12 });
        assert!(block.into_checked().is_ok());
    }

    #[test]
    fn block_running_past_region_end_is_truncated() {
        let mut mem = MemStorage::new(64, b'X');
        let raw = encode(b"CFG1", &[0xAA; 8]).unwrap();
        mem.write(40, &raw).unwrap();

        // the block ends at 58, past a region that stops at 50
        let region = Region::new(0, 50);
        assert!(matches!(
            read_block(&mut mem, &region, 40, MAX_PAYLOAD),
            Err(Error::Truncated { needed: 18, available: 10 })
        ));
        assert!(matches!(
            read_block(&mut mem, &region, 45, MAX_PAYLOAD),
            Err(Error::Truncated { needed: 9, .. })
        ));
    }

    #[test]
    fn corrupt_stored_block_reports_checksum_mismatch() {
        let mut mem = MemStorage::new(64, b'X');
        mem.write(0, &encode(b"CFG1", &[0x01, 0x02]).unwrap()).unwrap();
        mem.as_bytes_mut()[10] ^= 0x04;

        let block = read_block(&mut mem, &Region::new(0, 64), 0, MAX_PAYLOAD).unwrap();
        assert!(!block.is_valid());
        assert!(matches!(
            block.into_checked(),
            Err(Error::ChecksumMismatch { offset: 0, .. })
        ));
    }
}
