use std::fmt;

use crate::block_format::TAG_SIZE;
use crate::error::{Error, Result};

pub type Offset = usize;

/// Four byte block identifier, compared byte for byte.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Tag([u8; TAG_SIZE]);

impl Tag {
    pub const fn new(bytes: [u8; TAG_SIZE]) -> Self {
        Tag(bytes)
    }

    /// Fails with [`Error::InvalidTag`] unless `bytes` is exactly four bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; TAG_SIZE] = bytes
            .try_into()
            .map_err(|_| Error::InvalidTag(bytes.len()))?;
        Ok(Tag(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Tag {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Tag::from_slice(bytes)
    }
}

impl TryFrom<&str> for Tag {
    type Error = Error;

    fn try_from(text: &str) -> Result<Self> {
        Tag::from_slice(text.as_bytes())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(\"{}\")", self)
    }
}

/// Where a block sits in storage: start offset and total encoded length.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub start: Offset,
    pub len: usize,
}

impl BlockSpan {
    pub fn end(&self) -> Offset {
        self.start + self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_requires_four_bytes() {
        assert!(Tag::try_from("CFG1").is_ok());
        assert!(matches!(Tag::try_from("CFG"), Err(Error::InvalidTag(3))));
        assert!(matches!(Tag::try_from("CFG12"), Err(Error::InvalidTag(5))));
        assert!(matches!(Tag::from_slice(&[]), Err(Error::InvalidTag(0))));
    }

    #[test]
    fn tag_display_masks_unprintable_bytes() {
        let tag = Tag::new([b'A', 0x00, b'b', 0xFF]);
        assert_eq!(tag.to_string(), "A.b.");
        assert_eq!(format!("{:?}", Tag::new(*b"CFG1")), "Tag(\"CFG1\")");
    }

    #[test]
    fn span_end() {
        let span = BlockSpan { start: 10, len: 12 };
        assert_eq!(span.end(), 22);
    }
}
