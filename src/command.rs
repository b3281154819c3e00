use crate::common::Offset;
use crate::line::{parse_number, take_field};

/// A console command parsed from one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    DumpBlocks,
    Print,
    Write { position: Option<Offset> },
    Read,
    Erase,
    DumpRaw { offset: Offset, count: usize },
    Set { key: String, value: String },
    /// Right command letter, wrong arguments.
    Malformed { line: String, usage: &'static str },
    Unknown(String),
}

pub const WRITE_USAGE: &str = "W or W:P";
pub const DUMP_USAGE: &str = "D:P,N";
pub const SET_USAGE: &str = "S:K,V";

impl Command {
    /// `H`, `R`, `D`, `W` and `S` are matched on their first letter; `Q`, `C`,
    /// `E` and `P` only as the whole line.
    pub fn parse(line: &str) -> Command {
        match line {
            "Q" => return Command::Quit,
            "C" => return Command::DumpBlocks,
            "E" => return Command::Erase,
            "P" => return Command::Print,
            _ => {}
        }

        match line.chars().next() {
            Some('H') => Command::Help,
            Some('D') => parse_dump(line),
            Some('W') => parse_write(line),
            Some('R') => Command::Read,
            Some('S') => parse_set(line),
            _ => Command::Unknown(line.to_string()),
        }
    }

    /// Whether running the command can change what is in storage.
    pub fn touches_storage(&self) -> bool {
        matches!(self, Command::Write { .. } | Command::Erase)
    }
}

fn malformed(line: &str, usage: &'static str) -> Command {
    Command::Malformed {
        line: line.to_string(),
        usage,
    }
}

fn args(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, args)| args)
}

fn parse_dump(line: &str) -> Command {
    let Some(mut rest) = args(line) else {
        return malformed(line, DUMP_USAGE);
    };
    let offset = parse_number(take_field(&mut rest, ','));
    let count = parse_number(take_field(&mut rest, ','));
    match (offset, count) {
        (Some(offset), Some(count)) => Command::DumpRaw { offset, count },
        _ => malformed(line, DUMP_USAGE),
    }
}

fn parse_write(line: &str) -> Command {
    if line == "W" {
        return Command::Write { position: None };
    }
    match args(line) {
        Some(pos) if pos.trim().is_empty() => Command::Write { position: None },
        Some(pos) => match parse_number(pos) {
            Some(position) => Command::Write {
                position: Some(position),
            },
            None => malformed(line, WRITE_USAGE),
        },
        None => malformed(line, WRITE_USAGE),
    }
}

fn parse_set(line: &str) -> Command {
    let Some(mut rest) = args(line) else {
        return malformed(line, SET_USAGE);
    };
    let key = take_field(&mut rest, ',');
    let value = take_field(&mut rest, ',');
    if key.is_empty() {
        return malformed(line, SET_USAGE);
    }
    Command::Set {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_raw_arguments() {
        assert_eq!(Command::parse("D:10,5"), Command::DumpRaw { offset: 10, count: 5 });
        assert_eq!(Command::parse("D:0,1024"), Command::DumpRaw { offset: 0, count: 1024 });
        assert!(matches!(Command::parse("D:10"), Command::Malformed { usage: DUMP_USAGE, .. }));
        assert!(matches!(Command::parse("D"), Command::Malformed { .. }));
    }

    #[test]
    fn set_arguments() {
        assert_eq!(
            Command::parse("S:KEY,VAL"),
            Command::Set { key: "KEY".into(), value: "VAL".into() }
        );
        assert_eq!(
            Command::parse("S:1,"),
            Command::Set { key: "1".into(), value: "".into() }
        );
        assert!(matches!(Command::parse("S:,5"), Command::Malformed { usage: SET_USAGE, .. }));
        assert!(matches!(Command::parse("S"), Command::Malformed { .. }));
    }

    #[test]
    fn write_with_and_without_position() {
        assert_eq!(Command::parse("W"), Command::Write { position: None });
        assert_eq!(Command::parse("W:"), Command::Write { position: None });
        assert_eq!(Command::parse("W:100"), Command::Write { position: Some(100) });
        assert!(matches!(Command::parse("W:x"), Command::Malformed { usage: WRITE_USAGE, .. }));
        assert!(matches!(Command::parse("WRITE"), Command::Malformed { .. }));
    }

    #[test]
    fn single_letter_commands() {
        assert_eq!(Command::parse("Q"), Command::Quit);
        assert_eq!(Command::parse("C"), Command::DumpBlocks);
        assert_eq!(Command::parse("E"), Command::Erase);
        assert_eq!(Command::parse("P"), Command::Print);
        assert_eq!(Command::parse("H"), Command::Help);
        assert_eq!(Command::parse("HELP"), Command::Help);
        assert_eq!(Command::parse("R"), Command::Read);
    }

    #[test]
    fn exact_commands_do_not_match_prefixes() {
        assert_eq!(Command::parse("QUIT"), Command::Unknown("QUIT".into()));
        assert_eq!(Command::parse("Erase"), Command::Unknown("Erase".into()));
        assert_eq!(Command::parse("Z"), Command::Unknown("Z".into()));
        assert_eq!(Command::parse("q"), Command::Unknown("q".into()));
    }

    #[test]
    fn only_write_and_erase_touch_storage() {
        assert!(Command::parse("W").touches_storage());
        assert!(Command::parse("E").touches_storage());
        assert!(!Command::parse("Z").touches_storage());
        assert!(!Command::parse("D:0,4").touches_storage());
    }
}
