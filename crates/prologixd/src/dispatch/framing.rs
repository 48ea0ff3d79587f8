//! Splits the client byte stream into Prologix lines.
//!
//! Lines end at an unescaped CR or LF. ESC (0x1B) makes the following byte
//! literal and is itself dropped, which is how clients send CR, LF, ESC and `+`
//! inside instrument data. A line is a command only when its first two bytes
//! are unescaped `+` characters.

use super::errors::DispatchError;

/// Largest line accepted from a client.
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

const ESC: u8 = 0x1B;

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    /// Text following the `++` prefix.
    Command(String),
    /// Bytes for the addressed instrument with escapes removed.
    Data(Vec<u8>),
}

/// Incremental line decoder. Escape state survives across reads.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    line: Vec<u8>,
    escaped: bool,
    plain_plus: usize,
}

impl LineDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Consumes `chunk`, appending every completed line to `frames`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::LineTooLong`] once the pending line exceeds
    /// [`MAX_LINE_BYTES`].
    pub(crate) fn feed(&mut self, chunk: &[u8], frames: &mut Vec<Frame>) -> Result<(), DispatchError> {
        for &byte in chunk {
            if self.escaped {
                self.escaped = false;
                self.push(byte, false)?;
                continue;
            }
            match byte {
                ESC => self.escaped = true,
                b'\r' | b'\n' => frames.extend(self.take_line()),
                _ => self.push(byte, true)?,
            }
        }
        Ok(())
    }

    /// Flushes a trailing line left when the client closes mid-line.
    pub(crate) fn finish(&mut self) -> Option<Frame> {
        self.escaped = false;
        self.take_line()
    }

    fn push(&mut self, byte: u8, plain: bool) -> Result<(), DispatchError> {
        if plain && byte == b'+' && self.plain_plus == self.line.len() {
            self.plain_plus += 1;
        }
        self.line.push(byte);
        if self.line.len() > MAX_LINE_BYTES {
            let size = self.line.len();
            self.line.clear();
            self.plain_plus = 0;
            return Err(DispatchError::line_too_long(size, MAX_LINE_BYTES));
        }
        Ok(())
    }

    fn take_line(&mut self) -> Option<Frame> {
        let line = std::mem::take(&mut self.line);
        let is_command = self.plain_plus >= 2;
        self.plain_plus = 0;
        if line.is_empty() {
            return None;
        }
        if is_command {
            let text = String::from_utf8_lossy(line.get(2..).unwrap_or_default());
            Some(Frame::Command(text.trim().to_owned()))
        } else {
            Some(Frame::Data(line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode(input: &[u8]) -> Vec<Frame> {
        let mut decoder = LineDecoder::new();
        let mut frames = Vec::new();
        decoder.feed(input, &mut frames).expect("feed");
        frames.extend(decoder.finish());
        frames
    }

    #[rstest]
    #[case(b"++addr 5\n", Frame::Command("addr 5".into()))]
    #[case(b"++READ eoi\r\n", Frame::Command("READ eoi".into()))]
    #[case(b"*IDN?\n", Frame::Data(b"*IDN?".to_vec()))]
    #[case(b"+1.0E+00\n", Frame::Data(b"+1.0E+00".to_vec()))]
    #[case(b"\x1B+\x1B+clr\n", Frame::Data(b"++clr".to_vec()))]
    #[case(b"+\x1B+x\n", Frame::Data(b"++x".to_vec()))]
    #[case(b"DATA\x1B\r\x1B\n\x1B\x1B\n", Frame::Data(b"DATA\r\n\x1B".to_vec()))]
    fn classifies_lines(#[case] input: &[u8], #[case] expected: Frame) {
        assert_eq!(decode(input), vec![expected]);
    }

    #[test]
    fn skips_empty_lines_between_terminators() {
        let frames = decode(b"\r\n\r\n++ver\r\n\nVOLT?\r\n");
        assert_eq!(
            frames,
            vec![Frame::Command("ver".into()), Frame::Data(b"VOLT?".to_vec())]
        );
    }

    #[test]
    fn escape_state_spans_chunks() {
        let mut decoder = LineDecoder::new();
        let mut frames = Vec::new();
        decoder.feed(b"A\x1B", &mut frames).expect("first chunk");
        decoder.feed(b"\nB\n", &mut frames).expect("second chunk");
        assert_eq!(frames, vec![Frame::Data(b"A\nB".to_vec())]);
    }

    #[test]
    fn trailing_partial_line_is_flushed() {
        assert_eq!(decode(b"++auto 1"), vec![Frame::Command("auto 1".into())]);
    }

    #[test]
    fn rejects_lines_over_the_limit() {
        let mut decoder = LineDecoder::new();
        let mut frames = Vec::new();
        let long = vec![b'x'; MAX_LINE_BYTES + 1];
        let error = decoder.feed(&long, &mut frames).expect_err("too long");
        assert!(matches!(error, DispatchError::LineTooLong { .. }));
    }
}
