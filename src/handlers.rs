//! Input and output capabilities injected into an [`ExecutionContext`](crate::ExecutionContext).

use std::io::{self, Read, Write};

/// Receives every byte written by an Output instruction.
pub trait OutputHandler {
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}

/// Supplies bytes to Input instructions. `None` means end of input.
pub trait InputHandler {
    fn read_byte(&mut self) -> Option<u8>;
}

impl<F> OutputHandler for F
where
    F: FnMut(u8) -> io::Result<()>,
{
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self(byte)
    }
}

impl<F> InputHandler for F
where
    F: FnMut() -> Option<u8>,
{
    fn read_byte(&mut self) -> Option<u8> {
        self()
    }
}

/// Writes each byte to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOutput;

impl OutputHandler for StdoutOutput {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        io::stdout().lock().write_all(&[byte])
    }
}

/// Reads bytes from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinInput {
    line_mode: bool,
}

impl StdinInput {
    /// One byte of stdin per Input instruction.
    pub fn raw() -> Self {
        Self { line_mode: false }
    }

    /// Take the first byte of a line and drop the rest of it, so an interactive
    /// user answers each Input with one line.
    pub fn line() -> Self {
        Self { line_mode: true }
    }

    pub fn is_line_mode(&self) -> bool {
        self.line_mode
    }
}

impl InputHandler for StdinInput {
    fn read_byte(&mut self) -> Option<u8> {
        // Prompts written without a newline must be visible before we block.
        let _ = io::stdout().flush();
        let mut stdin = io::stdin().lock();
        let first = next_byte(&mut stdin)?;
        if self.line_mode && first != b'\n' {
            while let Some(byte) = next_byte(&mut stdin) {
                if byte == b'\n' {
                    break;
                }
            }
        }
        Some(first)
    }
}

fn next_byte<R: Read>(reader: &mut R) -> Option<u8> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return None,
            Ok(_) => return Some(buf[0]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // A broken stdin is indistinguishable from end of input for a program.
            Err(_) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn closures_are_handlers() {
        let mut written = Vec::new();
        {
            let mut sink = |b: u8| -> io::Result<()> {
                written.push(b);
                Ok(())
            };
            sink.write_byte(b'x').unwrap();
        }
        assert_eq!(written, b"x");

        let mut bytes = vec![2u8, 1];
        let mut source = move || bytes.pop();
        assert_eq!(source.read_byte(), Some(1));
        assert_eq!(source.read_byte(), Some(2));
        assert_eq!(source.read_byte(), None);
    }

    #[test]
    fn next_byte_reports_eof() {
        let mut cursor = Cursor::new(b"A".to_vec());
        assert_eq!(next_byte(&mut cursor), Some(b'A'));
        assert_eq!(next_byte(&mut cursor), None);
    }
}
