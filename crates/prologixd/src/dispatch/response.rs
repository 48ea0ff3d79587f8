//! Writes replies back to Prologix clients.

use std::io::Write;

use super::errors::DispatchError;
use super::table::Reply;

/// Writer for the line-oriented client protocol.
///
/// Text replies and errors end with `\n`; instrument data passes through
/// untouched. Every write flushes so a waiting client sees the answer at once.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Creates a new response writer wrapping the given output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one text line.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn write_line(&mut self, line: &str) -> Result<(), DispatchError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes instrument bytes verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn write_data(&mut self, data: &[u8]) -> Result<(), DispatchError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes `Error: <message>`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_error(&mut self, error: &DispatchError) -> Result<(), DispatchError> {
        self.write_line(&format!("Error: {error}"))
    }

    pub(crate) fn write_reply(&mut self, reply: Reply) -> Result<(), DispatchError> {
        match reply {
            Reply::Silent => Ok(()),
            Reply::Line(line) => self.write_line(&line),
            Reply::Lines(lines) => lines.iter().try_for_each(|line| self.write_line(line)),
            Reply::Data(data) => self.write_data(&data),
        }
    }
}
