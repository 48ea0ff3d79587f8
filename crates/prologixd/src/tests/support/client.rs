//! Minimal Prologix client speaking to a loopback listener.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

pub struct TestClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let writer = TcpStream::connect(addr).expect("connect to emulator");
        writer
            .set_read_timeout(Some(REPLY_TIMEOUT))
            .expect("set read timeout");
        let reader = BufReader::new(writer.try_clone().expect("clone stream"));
        Self { writer, reader }
    }

    /// Sends `line` followed by LF.
    pub fn send(&mut self, line: &[u8]) {
        self.writer.write_all(line).expect("write line");
        self.writer.write_all(b"\n").expect("write terminator");
        self.writer.flush().expect("flush");
    }

    /// Writes `bytes` as-is, ignoring write failures.
    pub fn send_unchecked(&mut self, bytes: &[u8]) {
        let _ = self.writer.write_all(bytes);
        let _ = self.writer.flush();
    }

    /// Receives one reply line without its terminator.
    pub fn receive(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read reply");
        line.trim_end_matches(['\r', '\n']).to_owned()
    }

    /// Sends `line` and returns the reply.
    pub fn query(&mut self, line: &str) -> String {
        self.send(line.as_bytes());
        self.receive()
    }

    /// Whether nothing arrives within a short window.
    pub fn is_silent(&mut self) -> bool {
        self.reader
            .get_ref()
            .set_read_timeout(Some(SILENCE_WINDOW))
            .expect("shorten read timeout");
        let mut line = String::new();
        let silent = match self.reader.read_line(&mut line) {
            Ok(_) => false,
            Err(error) => matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
        };
        self.reader
            .get_ref()
            .set_read_timeout(Some(REPLY_TIMEOUT))
            .expect("restore read timeout");
        silent
    }

    /// Whether the server has closed the connection.
    pub fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        loop {
            match self.reader.read_line(&mut line) {
                Ok(0) => return true,
                Ok(_) => line.clear(),
                Err(_) => return false,
            }
        }
    }
}
