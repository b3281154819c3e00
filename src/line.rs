/// Visible characters kept per console line.
pub const DEFAULT_LINE_CAPACITY: usize = 31;

/// Accumulates characters polled one at a time into whole lines.
///
/// `\r` commits the line, `\n` is ignored so both CR and CRLF terminals work.
/// Characters past the capacity are dropped without complaint.
#[derive(Debug, Clone)]
pub struct LineReader {
    buffer: String,
    len: usize,
    capacity: usize,
}

impl LineReader {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
            len: 0,
            capacity,
        }
    }

    /// Feeds one character. Returns the line when `ch` completes a non-empty one.
    pub fn push(&mut self, ch: char) -> Option<String> {
        match ch {
            '\n' => None,
            '\r' => {
                if self.len == 0 {
                    return None;
                }
                self.len = 0;
                Some(std::mem::take(&mut self.buffer))
            }
            _ => {
                if self.len < self.capacity {
                    self.buffer.push(ch);
                    self.len += 1;
                }
                None
            }
        }
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.len = 0;
    }
}

/// Splits the next field off `rest` at `sep`, consuming the separator.
/// Without a separator the whole remainder is the field.
pub fn take_field<'a>(rest: &mut &'a str, sep: char) -> &'a str {
    match rest.split_once(sep) {
        Some((field, tail)) => {
            *rest = tail;
            field
        }
        None => std::mem::take(rest),
    }
}

/// Reads a decimal number the lenient way: leading whitespace is skipped and
/// digits are taken up to the first non-digit. `None` when there are no
/// digits or the value overflows.
pub fn parse_number(field: &str) -> Option<usize> {
    let field = field.trim_start();
    let field = field.strip_prefix('+').unwrap_or(field);
    let end = field
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(field.len());
    if end == 0 {
        return None;
    }
    field[..end].parse().ok()
}
