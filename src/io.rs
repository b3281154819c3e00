use std::thread;
use std::time::Duration;

/// Character transport the console talks over.
pub trait LineIo {
    /// Non-blocking poll for the next input character.
    fn try_read_char(&mut self) -> Option<char>;

    fn write_line(&mut self, text: &str);

    fn flush(&mut self);
}

impl<T: LineIo + ?Sized> LineIo for &mut T {
    fn try_read_char(&mut self) -> Option<char> {
        (**self).try_read_char()
    }
    fn write_line(&mut self, text: &str) {
        (**self).write_line(text)
    }
    fn flush(&mut self) {
        (**self).flush()
    }
}

/// Blocking pause used between polls.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}
