use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

use log::debug;

use crate::common::Offset;
use crate::error::{Error, Result};

/// Byte addressable, power-cycle durable memory of fixed capacity.
///
/// A successful write is assumed durable; there is no separate flush. The
/// range methods have byte-by-byte default implementations so a device only
/// has to provide `read_byte` and `write_byte`.
pub trait Storage {
    fn capacity(&self) -> usize;

    fn read_byte(&mut self, offset: Offset) -> Result<u8>;

    fn write_byte(&mut self, offset: Offset, byte: u8) -> Result<()>;

    fn read(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()> {
        check_range(self.capacity(), offset, buf.len())?;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.read_byte(offset + i)?;
        }
        Ok(())
    }

    fn write(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        check_range(self.capacity(), offset, bytes.len())?;
        for (i, &b) in bytes.iter().enumerate() {
            self.write_byte(offset + i, b)?;
        }
        Ok(())
    }

    fn fill(&mut self, range: Range<Offset>, byte: u8) -> Result<()> {
        check_range(self.capacity(), range.start, range.len())?;
        for offset in range {
            self.write_byte(offset, byte)?;
        }
        Ok(())
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }
    fn read_byte(&mut self, offset: Offset) -> Result<u8> {
        (**self).read_byte(offset)
    }
    fn write_byte(&mut self, offset: Offset, byte: u8) -> Result<()> {
        (**self).write_byte(offset, byte)
    }
    fn read(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()> {
        (**self).read(offset, buf)
    }
    fn write(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        (**self).write(offset, bytes)
    }
    fn fill(&mut self, range: Range<Offset>, byte: u8) -> Result<()> {
        (**self).fill(range, byte)
    }
}

fn check_range(capacity: usize, offset: Offset, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(Error::OutOfBounds {
            offset,
            len,
            start: 0,
            end: capacity,
        }),
    }
}

/// In-memory storage, used by tests and as a RAM-backed device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemStorage {
    bytes: Vec<u8>,
}

impl MemStorage {
    pub fn new(capacity: usize, filler: u8) -> Self {
        Self {
            bytes: vec![filler; capacity],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Direct access for corruption injection in tests.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Storage for MemStorage {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read_byte(&mut self, offset: Offset) -> Result<u8> {
        check_range(self.bytes.len(), offset, 1)?;
        Ok(self.bytes[offset])
    }

    fn write_byte(&mut self, offset: Offset, byte: u8) -> Result<()> {
        check_range(self.bytes.len(), offset, 1)?;
        self.bytes[offset] = byte;
        Ok(())
    }

    fn read(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()> {
        check_range(self.bytes.len(), offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        check_range(self.bytes.len(), offset, bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn fill(&mut self, range: Range<Offset>, byte: u8) -> Result<()> {
        check_range(self.bytes.len(), range.start, range.len())?;
        self.bytes[range].fill(byte);
        Ok(())
    }
}

/// A storage image kept in a regular file, for running the console on a host.
pub struct FileStorage {
    file: File,
    capacity: usize,
}

impl FileStorage {
    /// Opens (or creates) an image of `capacity` bytes. A missing or short
    /// file is padded with `filler` so unwritten space never looks like a block.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize, filler: u8) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let existing = file.metadata()?.len() as usize;
        if existing < capacity {
            debug!(
                "padding image {} from {} to {} bytes",
                path.as_ref().display(),
                existing,
                capacity
            );
            file.seek(SeekFrom::Start(existing as u64))?;
            file.write_all(&vec![filler; capacity - existing])?;
            file.sync_data()?;
        }

        Ok(Self { file, capacity })
    }
}

impl Storage for FileStorage {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_byte(&mut self, offset: Offset) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read(offset, &mut b)?;
        Ok(b[0])
    }

    fn write_byte(&mut self, offset: Offset, byte: u8) -> Result<()> {
        self.write(offset, &[byte])
    }

    fn read(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()> {
        check_range(self.capacity, offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        check_range(self.capacity, offset, bytes.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(bytes)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn fill(&mut self, range: Range<Offset>, byte: u8) -> Result<()> {
        let bytes = vec![byte; range.len()];
        self.write(range.start, &bytes)
    }
}
