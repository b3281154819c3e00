use log::{debug, error, info, warn};

use crate::command::Command;
use crate::common::{Offset, Tag};
use crate::config_store::ConfigStore;
use crate::error::{Error, Result};
use crate::io::{Delay, LineIo};
use crate::line::LineReader;
use crate::locator::ScanEntry;
use crate::options::Options;
use crate::storage::Storage;

/// Pause between polls while the interactive loop waits for input.
const IDLE_POLL_MS: u32 = 10;

/// Bytes per line of a raw dump.
const DUMP_ROW: usize = 16;

/// Hooks into the caller's typed configuration.
///
/// The console never interprets the config bytes; it hands them to these
/// methods. Every method is optional.
pub trait ConfigItems {
    /// Lists the items `set_config_item` understands.
    fn print_item_help(&mut self, _out: &mut dyn LineIo) {}

    fn print_config(&mut self, _config: &[u8], _out: &mut dyn LineIo) {}

    fn set_config_item(&mut self, _config: &mut [u8], _key: &str, _value: &str, _out: &mut dyn LineIo) {}
}

/// No callbacks at all.
impl ConfigItems for () {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConsoleState {
    /// Collecting characters of the next line.
    Idle,
    /// A full line is being executed.
    Dispatching,
    Exited,
}

/// How the startup gate ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Nobody asked for config mode before the window ran out.
    Elapsed,
    /// `Q` during the window.
    Skipped,
    /// `C` during the window, followed by an interactive session.
    Configured,
}

pub struct Console<S: Storage, IO: LineIo, D: Delay> {
    store: ConfigStore<S>,
    io: IO,
    delay: D,
    options: Options,
    line: LineReader,
    state: ConsoleState,
}

impl<S: Storage, IO: LineIo, D: Delay> Console<S, IO, D> {
    pub fn new(store: ConfigStore<S>, io: IO, delay: D, options: Options) -> Self {
        Self {
            store,
            io,
            delay,
            line: LineReader::new(options.line_capacity),
            options,
            state: ConsoleState::Idle,
        }
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<S> {
        &mut self.store
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn into_parts(self) -> (ConfigStore<S>, IO, D) {
        (self.store, self.io, self.delay)
    }

    /// Boot-time entry point.
    ///
    /// Loads the stored config over `config` (keeping the caller's defaults if
    /// that fails), shows it, then gives the user `select_period_ms` to type
    /// `C` for the interactive console or `Q` to carry on at once. Always
    /// returns; only a malformed `tag` is reported as an error, and that is
    /// caught before storage is touched.
    pub fn init_config(
        &mut self,
        tag: &[u8],
        config: &mut [u8],
        items: &mut dyn ConfigItems,
    ) -> Result<StartupOutcome> {
        let tag = match Tag::from_slice(tag) {
            Ok(tag) => tag,
            Err(e) => {
                error!("config tag rejected: {}", e);
                self.say(&format!("ERROR - {}", e));
                return Err(e);
            }
        };

        self.say(&format!("Starting up in [{}] ms", self.options.select_period_ms));
        self.say("Using config");
        self.load_config(&tag, config);
        items.print_config(config, &mut self.io);

        self.say("Press 'C' and 'Enter' to enter config mode or 'Q' to continue immediately");

        let mut outcome = StartupOutcome::Elapsed;
        for _ in 0..self.options.startup_cycles() {
            self.say(".");
            self.delay.delay_ms(self.options.poll_interval_ms);

            match self.poll_line().as_deref() {
                Some("C") => {
                    outcome = StartupOutcome::Configured;
                    break;
                }
                Some("Q") => {
                    outcome = StartupOutcome::Skipped;
                    break;
                }
                Some(other) => debug!("ignoring [{}] during startup", other),
                None => {}
            }
        }

        if outcome == StartupOutcome::Configured {
            self.say("Entering manual config mode");
            self.run(&tag, config, items);
        }

        info!("startup gate finished: {:?}", outcome);
        self.say("Continuing startup");
        Ok(outcome)
    }

    /// Interactive loop; returns once the user quits.
    pub fn run(&mut self, tag: &Tag, config: &mut [u8], items: &mut dyn ConfigItems) {
        self.state = ConsoleState::Idle;
        self.line.clear();
        self.say("Config mode entered");
        self.print_command_help(items);

        while self.state != ConsoleState::Exited {
            match self.io.try_read_char() {
                Some(ch) => {
                    self.handle_char(ch, tag, config, items);
                }
                None => self.delay.delay_ms(IDLE_POLL_MS),
            }
        }
    }

    /// Feeds one input character and runs the command it completes, if any.
    pub fn handle_char(
        &mut self,
        ch: char,
        tag: &Tag,
        config: &mut [u8],
        items: &mut dyn ConfigItems,
    ) -> ConsoleState {
        if self.state == ConsoleState::Exited {
            return self.state;
        }
        if let Some(line) = self.line.push(ch) {
            self.state = ConsoleState::Dispatching;
            self.state = self.dispatch(Command::parse(&line), tag, config, items);
        }
        self.state
    }

    /// Runs one command and returns the state the console ends up in.
    pub fn dispatch(
        &mut self,
        command: Command,
        tag: &Tag,
        config: &mut [u8],
        items: &mut dyn ConfigItems,
    ) -> ConsoleState {
        debug!("dispatching {:?}", command);
        if command.touches_storage() {
            info!("{:?} modifies storage region {:?}", command, self.store.region());
        }
        match command {
            Command::Help => self.print_command_help(items),
            Command::Quit => {
                self.say("Exiting interactive config mode");
                return ConsoleState::Exited;
            }
            Command::DumpBlocks => {
                self.say("Dumping config blocks");
                self.dump_blocks();
                self.say("Done");
            }
            Command::Print => items.print_config(config, &mut self.io),
            Command::Write { position } => self.write_config(tag, config, position),
            Command::Read => self.load_config(tag, config),
            Command::Erase => {
                self.say("Erasing all config");
                match self.store.erase() {
                    Ok(()) => self.say("Done"),
                    Err(e) => self.report("Erase failed", &e),
                }
            }
            Command::DumpRaw { offset, count } => {
                self.say("Dumping storage contents");
                self.dump_bytes(offset, count);
                self.say("Done");
            }
            Command::Set { key, value } => {
                self.say(&format!("Setting item [{}] to [{}]", key, value));
                items.set_config_item(config, &key, &value, &mut self.io);
            }
            Command::Malformed { line, usage } => {
                self.say(&format!("Bad arguments [{}], expected {}", line, usage));
            }
            Command::Unknown(line) => {
                self.say(&format!("Unknown command [{}]", line));
            }
        }
        ConsoleState::Idle
    }

    // Drains whatever input is waiting; stops at the first complete line.
    fn poll_line(&mut self) -> Option<String> {
        while let Some(ch) = self.io.try_read_char() {
            if let Some(line) = self.line.push(ch) {
                return Some(line);
            }
        }
        None
    }

    fn say(&mut self, msg: &str) {
        self.io.write_line(msg);
        self.io.flush();
    }

    fn report(&mut self, what: &str, e: &Error) {
        warn!("{}: {}", what, e);
        self.say(&format!("ERROR - {}: {}", what, e));
    }

    fn print_command_help(&mut self, items: &mut dyn ConfigItems) {
        self.say("Commands are");
        self.say("S:K,V   = Set item K to value V");
        self.say("---------------------------------------------");
        self.say("Item Id : Item Name : Value");
        items.print_item_help(&mut self.io);
        self.say("---------------------------------------------");
        self.say("P       = Print config");
        self.say("W:P     = Write config to storage, optionally at pos P");
        self.say("R       = Read config from storage");
        self.say("H       = Print this help text");
        self.say("E       = Erase all config in storage");
        self.say("C       = Dump all config blocks to console");
        self.say("D:P,N   = Dump N bytes from storage at pos P to console");
        self.say("Q       = Quit");
        self.say("---------------------------------------------");
    }

    fn load_config(&mut self, tag: &Tag, config: &mut [u8]) {
        self.say("Reading config from storage");
        match self.store.load(tag, config) {
            Ok(n) => {
                info!("loaded {} config bytes from block [{}]", n, tag);
                self.say("Successfully read config from storage");
            }
            Err(e) => {
                warn!("config load failed: {}", e);
                self.say(&format!("Failed to read config from storage ({}). Using default config.", e));
            }
        }
    }

    fn write_config(&mut self, tag: &Tag, config: &[u8], position: Option<Offset>) {
        self.say("Writing config to storage");
        match self.store.save(tag, config, position) {
            Ok(span) => self.say(&format!(
                "Successfully wrote config to storage at [{}] length [{}]",
                span.start, span.len
            )),
            Err(e) => self.report("Failed to write config to storage", &e),
        }
    }

    fn dump_blocks(&mut self) {
        let mut lines = Vec::new();
        let mut failure = None;
        for entry in self.store.blocks() {
            match entry {
                Ok(ScanEntry::Block(block)) => lines.push(format!(
                    "Block with tag [{}] found at location [{}] length [{}] with contents [{}]",
                    block.tag,
                    block.offset,
                    block.span().len,
                    hex(&block.payload, "")
                )),
                Ok(ScanEntry::Corrupt { offset, reason }) => {
                    lines.push(format!("Skipping bad block at location [{}]: {}", offset, reason))
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        for line in &lines {
            self.say(line);
        }
        if let Some(e) = failure {
            self.report("Block scan failed", &e);
        }
    }

    fn dump_bytes(&mut self, offset: Offset, count: usize) {
        match self.store.read_bytes(offset, count) {
            Ok(bytes) => {
                for (i, row) in bytes.chunks(DUMP_ROW).enumerate() {
                    self.say(&format!("{:04}: {}", offset + i * DUMP_ROW, hex(row, " ")));
                }
            }
            Err(e) => self.report("Dump failed", &e),
        }
    }
}

fn hex(bytes: &[u8], sep: &str) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(sep)
}
