use std::env;
use std::io::{self as stdio, BufRead, Write};
use std::process;
use std::sync::mpsc::{self, Receiver, SendError, Sender, TryRecvError};
use std::thread;

use log::{error, info};

use eeconfig::{ConfigItems, ConfigStore, Console, FileStorage, LineIo, Options, StdDelay};

const DEFAULT_IMAGE: &str = "eeprom.img";
const DEFAULT_TAG: &str = "NODE";

/// Command line parameters
#[derive(Debug, Clone, Default)]
struct CmdLineParams {
    /// `-image` _file_ - storage image
    image: Option<String>,
    /// `-config` _file_ - options json
    config: Option<String>,
    /// `-period` _ms_ - override the startup window
    period_ms: Option<u32>,
    /// `-tag` _xxxx_ - block tag for the node config
    tag: Option<String>,
}

impl CmdLineParams {
    fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let cmdl = CmdLineParams::default();
        args.into_iter()
            .fold((cmdl, "state"), |(cmdl, state), arg| match state {
                "state" => match arg.as_str() {
                    "-image" => (cmdl, "-image"),
                    "-config" => (cmdl, "-config"),
                    "-period" => (cmdl, "-period"),
                    "-tag" => (cmdl, "-tag"),
                    _ => (cmdl, state),
                },
                "-image" => (CmdLineParams { image: Some(arg), ..cmdl }, "state"),
                "-config" => (CmdLineParams { config: Some(arg), ..cmdl }, "state"),
                "-period" => (CmdLineParams { period_ms: arg.parse().ok(), ..cmdl }, "state"),
                "-tag" => (CmdLineParams { tag: Some(arg), ..cmdl }, "state"),
                _ => (cmdl, state),
            })
            .0
    }

    fn apply(&self, options: Options) -> Options {
        Options {
            select_period_ms: self.period_ms.unwrap_or(options.select_period_ms),
            ..options
        }
    }
}

/// Stdin/stdout transport. A reader thread feeds characters through a
/// channel so `try_read_char` never blocks.
struct StdConsole {
    rx: Receiver<char>,
    out: stdio::Stdout,
}

impl StdConsole {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if forward_lines(stdio::stdin().lock(), &tx).is_err() {
                return;
            }
            // stdin closed: quit config mode so the run can still finish
            for ch in "\rQ\r".chars() {
                let _ = tx.send(ch);
            }
        });
        Self {
            rx,
            out: stdio::stdout(),
        }
    }
}

/// Sends every character read from `input` to the console, one line at a
/// time. Lines are decoded as UTF-8 (invalid sequences become U+FFFD) and the
/// terminal's `\n` is turned into the `\r` the console commits on.
///
/// Fails once the receiving side is gone.
fn forward_lines<R: BufRead>(mut input: R, tx: &Sender<char>) -> std::result::Result<(), SendError<char>> {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match input.read_until(b'\n', &mut raw) {
            Ok(0) | Err(_) => return Ok(()),
            Ok(_) => {}
        }
        for ch in String::from_utf8_lossy(&raw).chars() {
            let ch = if ch == '\n' { '\r' } else { ch };
            tx.send(ch)?;
        }
    }
}

impl LineIo for StdConsole {
    fn try_read_char(&mut self) -> Option<char> {
        match self.rx.try_recv() {
            Ok(ch) => Some(ch),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn write_line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

/// Sample config of a radio node: two ids and a four character name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeConfig {
    rfm_node_id: i16,
    rfm_network_id: i16,
    node_id: [u8; 4],
}

impl NodeConfig {
    const LEN: usize = 8;

    fn to_bytes(self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..2].copy_from_slice(&self.rfm_node_id.to_le_bytes());
        out[2..4].copy_from_slice(&self.rfm_network_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.node_id);
        out
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut b = [0u8; Self::LEN];
        let n = bytes.len().min(Self::LEN);
        b[..n].copy_from_slice(&bytes[..n]);
        Self {
            rfm_node_id: i16::from_le_bytes([b[0], b[1]]),
            rfm_network_id: i16::from_le_bytes([b[2], b[3]]),
            node_id: [b[4], b[5], b[6], b[7]],
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rfm_node_id: 1,
            rfm_network_id: 100,
            node_id: *b"N001",
        }
    }
}

struct NodeItems;

impl ConfigItems for NodeItems {
    fn print_item_help(&mut self, out: &mut dyn LineIo) {
        out.write_line("1 : RFM node id    : -32768..32767");
        out.write_line("2 : RFM network id : -32768..32767");
        out.write_line("3 : Node id        : 4 characters");
    }

    fn print_config(&mut self, config: &[u8], out: &mut dyn LineIo) {
        let c = NodeConfig::from_bytes(config);
        out.write_line(&format!("1 : RFM node id    : {}", c.rfm_node_id));
        out.write_line(&format!("2 : RFM network id : {}", c.rfm_network_id));
        out.write_line(&format!("3 : Node id        : {}", String::from_utf8_lossy(&c.node_id)));
    }

    fn set_config_item(&mut self, config: &mut [u8], key: &str, value: &str, out: &mut dyn LineIo) {
        let mut c = NodeConfig::from_bytes(config);
        let applied = match key {
            "1" => value.parse::<i16>().map(|v| c.rfm_node_id = v).is_ok(),
            "2" => value.parse::<i16>().map(|v| c.rfm_network_id = v).is_ok(),
            "3" => match <[u8; 4]>::try_from(value.as_bytes()) {
                Ok(id) => {
                    c.node_id = id;
                    true
                }
                Err(_) => false,
            },
            _ => {
                out.write_line(&format!("Unknown item [{}]", key));
                return;
            }
        };
        if applied {
            let n = config.len().min(NodeConfig::LEN);
            config[..n].copy_from_slice(&c.to_bytes()[..n]);
        } else {
            out.write_line(&format!("Invalid value [{}] for item [{}]", value, key));
        }
    }
}

fn run() -> eeconfig::Result<()> {
    let params = CmdLineParams::from_args(env::args().skip(1));
    let options = match &params.config {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };
    let options = params.apply(options);
    options.validate()?;

    let image = params.image.as_deref().unwrap_or(DEFAULT_IMAGE);
    let tag = params.tag.as_deref().unwrap_or(DEFAULT_TAG);
    info!("using image {} with region {:?}", image, options.region);

    let storage = FileStorage::open(image, options.region.end, options.region.filler)?;
    let store = ConfigStore::new(storage, options.region)?;
    let mut console = Console::new(store, StdConsole::spawn(), StdDelay, options);

    let mut config = NodeConfig::default().to_bytes();
    let outcome = console.init_config(tag.as_bytes(), &mut config, &mut NodeItems)?;
    let node = NodeConfig::from_bytes(&config);
    info!("startup gate {:?}, running with {:?}", outcome, node);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("eeconfig: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_line_fold() {
        let args = ["-image", "a.img", "-period", "250", "-tag", "CFG1", "-bogus"]
            .iter()
            .map(|s| s.to_string());
        let p = CmdLineParams::from_args(args);
        assert_eq!(p.image.as_deref(), Some("a.img"));
        assert_eq!(p.period_ms, Some(250));
        assert_eq!(p.tag.as_deref(), Some("CFG1"));
        assert_eq!(p.config, None);
        assert_eq!(p.apply(Options::default()).select_period_ms, 250);
    }

    #[test]
    fn node_config_bytes() {
        let c = NodeConfig {
            rfm_node_id: -2,
            rfm_network_id: 300,
            node_id: *b"ABCD",
        };
        assert_eq!(NodeConfig::from_bytes(&c.to_bytes()), c);
    }

    #[test]
    fn stdin_lines_keep_multibyte_characters() {
        let (tx, rx) = mpsc::channel();
        let input = stdio::Cursor::new("S:3,Nø1\nQ\n".as_bytes().to_vec());
        forward_lines(input, &tx).unwrap();
        drop(tx);
        let sent: String = rx.iter().collect();
        assert_eq!(sent, "S:3,Nø1\rQ\r");
    }

    #[test]
    fn stdin_invalid_utf8_is_replaced() {
        let (tx, rx) = mpsc::channel();
        forward_lines(&b"P\xff\n"[..], &tx).unwrap();
        drop(tx);
        assert_eq!(rx.iter().collect::<String>(), "P\u{fffd}\r");
    }

    struct Sink(Vec<String>);

    impl LineIo for Sink {
        fn try_read_char(&mut self) -> Option<char> {
            None
        }
        fn write_line(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
        fn flush(&mut self) {}
    }

    #[test]
    fn node_items_set_by_key() {
        let mut config = NodeConfig::default().to_bytes();
        let mut out = Sink(Vec::new());
        NodeItems.set_config_item(&mut config, "1", "42", &mut out);
        NodeItems.set_config_item(&mut config, "3", "GW01", &mut out);
        NodeItems.set_config_item(&mut config, "2", "big", &mut out);
        NodeItems.set_config_item(&mut config, "9", "1", &mut out);

        let c = NodeConfig::from_bytes(&config);
        assert_eq!(c.rfm_node_id, 42);
        assert_eq!(c.rfm_network_id, 100);
        assert_eq!(&c.node_id, b"GW01");
        assert_eq!(out.0, vec!["Invalid value [big] for item [2]", "Unknown item [9]"]);
    }
}
