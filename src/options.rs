use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::Offset;
use crate::error::{Error, Result};
use crate::line::DEFAULT_LINE_CAPACITY;

pub const DEFAULT_SELECT_PERIOD_MS: u32 = 5_000;
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 500;
pub const DEFAULT_REGION_START: Offset = 0;
pub const DEFAULT_REGION_END: Offset = 1024;
pub const DEFAULT_FILLER: u8 = b'X';

/// The part of the device that holds blocks, and the byte erase fills it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    pub start: Offset,
    pub end: Offset,
    /// Written in JSON as a one character string (`"X"`) or a number (`255`).
    #[serde(with = "filler_byte")]
    pub filler: u8,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            start: DEFAULT_REGION_START,
            end: DEFAULT_REGION_END,
            filler: DEFAULT_FILLER,
        }
    }
}

impl Region {
    pub fn new(start: Offset, end: Offset) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    pub fn with_filler(self, filler: u8) -> Self {
        Self { filler, ..self }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, offset: Offset, len: usize) -> bool {
        offset >= self.start && offset.checked_add(len).map_or(false, |end| end <= self.end)
    }

    /// Fails with [`Error::OutOfBounds`] unless `offset .. offset+len` lies inside the region.
    pub fn check(&self, offset: Offset, len: usize) -> Result<()> {
        if self.contains(offset, len) {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                offset,
                len,
                start: self.start,
                end: self.end,
            })
        }
    }
}

mod filler_byte {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Byte(u8),
        Char(String),
    }

    pub fn serialize<S: Serializer>(filler: &u8, s: S) -> Result<S::Ok, S::Error> {
        if filler.is_ascii_graphic() {
            s.serialize_char(*filler as char)
        } else {
            s.serialize_u8(*filler)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Byte(b) => Ok(b),
            Repr::Char(text) => match text.as_bytes() {
                [b] => Ok(*b),
                _ => Err(D::Error::custom(format!(
                    "filler must be one ASCII character or a byte value, got {:?}",
                    text
                ))),
            },
        }
    }
}

/// Console and region settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// How long the startup gate waits for the user to ask for config mode.
    pub select_period_ms: u32,
    /// Cadence of the startup gate.
    pub poll_interval_ms: u32,
    /// Characters kept per input line; the rest of a longer line is dropped.
    pub line_capacity: usize,
    pub region: Region,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            select_period_ms: DEFAULT_SELECT_PERIOD_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            line_capacity: DEFAULT_LINE_CAPACITY,
            region: Region::default(),
        }
    }
}

impl Options {
    pub fn from_json(text: &str) -> Result<Self> {
        let options: Options = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidOptions("poll_interval_ms must be positive".into()));
        }
        if self.line_capacity == 0 {
            return Err(Error::InvalidOptions("line_capacity must be positive".into()));
        }
        if self.region.is_empty() {
            return Err(Error::InvalidOptions(format!(
                "region [{}, {}) is empty",
                self.region.start, self.region.end
            )));
        }
        Ok(())
    }

    /// Number of polls the startup gate makes before giving up.
    pub fn startup_cycles(&self) -> u32 {
        self.select_period_ms / self.poll_interval_ms.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = Options::default();
        assert_eq!(o.region, Region::new(0, 1024));
        assert_eq!(o.region.filler, b'X');
        assert_eq!(o.startup_cycles(), 10);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let o = Options::from_json(r#"{ "select_period_ms": 2000, "region": { "end": 64 } }"#)
            .unwrap();
        assert_eq!(o.select_period_ms, 2000);
        assert_eq!(o.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(o.region, Region::new(0, 64));
        assert_eq!(o.startup_cycles(), 4);
    }

    #[test]
    fn rejects_bad_options() {
        assert!(matches!(
            Options::from_json(r#"{ "poll_interval_ms": 0 }"#),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            Options::from_json(r#"{ "region": { "start": 10, "end": 10 } }"#),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(Options::from_json("{ nope"), Err(Error::Json(_))));
    }

    #[test]
    fn filler_as_character_or_byte() {
        let o = Options::from_json(r##"{ "region": { "filler": "#" } }"##).unwrap();
        assert_eq!(o.region.filler, b'#');
        let o = Options::from_json(r#"{ "region": { "filler": 255 } }"#).unwrap();
        assert_eq!(o.region.filler, 0xFF);

        assert!(matches!(
            Options::from_json(r#"{ "region": { "filler": "XY" } }"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            Options::from_json(r#"{ "region": { "filler": "é" } }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn filler_written_back_as_character() {
        let json = serde_json::to_string(&Region::default()).unwrap();
        assert!(json.contains(r#""filler":"X""#), "{}", json);
        let json = serde_json::to_string(&Region::default().with_filler(0)).unwrap();
        assert!(json.contains(r#""filler":0"#), "{}", json);
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back.filler, 0);
    }

    #[test]
    fn region_bounds() {
        let r = Region::new(16, 64);
        assert!(r.contains(16, 48));
        assert!(!r.contains(15, 1));
        assert!(!r.contains(60, 5));
        assert!(!r.contains(usize::MAX, 2));
        assert!(matches!(
            r.check(60, 5),
            Err(Error::OutOfBounds { offset: 60, len: 5, start: 16, end: 64 })
        ));
    }
}
