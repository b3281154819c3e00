pub mod block_format;
pub mod block_reader;
pub mod block_writer;
pub mod command;
pub mod common;
pub mod config_store;
pub mod console;
pub mod crc;
pub mod error;
pub mod io;
pub mod line;
pub mod locator;
pub mod options;
pub mod storage;

pub use block_reader::decode;
pub use block_writer::encode;
pub use common::{BlockSpan, Offset, Tag};
pub use config_store::ConfigStore;
pub use console::{ConfigItems, Console, ConsoleState, StartupOutcome};
pub use error::{Error, Result};
pub use io::{Delay, LineIo, StdDelay};
pub use options::{Options, Region};
pub use storage::{FileStorage, MemStorage, Storage};
