//! Backend that relays bus operations to a real Prologix GPIB-Ethernet
//! controller.
//!
//! The upstream controller is driven with auto-read off, no EOS terminator
//! and EOI on, so the bytes we forward reach the instrument unchanged. Data is
//! escaped with ESC so embedded CR, LF, ESC and `+` are not taken as framing.
//! Responses are framed by LF unless the caller asks for a stop character.
//! Bytes left over from an earlier reply are discarded before every send so
//! that one malformed answer cannot shift all later ones.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::{debug, info};

use crate::BUS_TARGET;
use crate::address::GpibAddress;
use crate::backend::{GpibBackend, ReadOutcome, ReadTermination};
use crate::error::BusError;

const ESC: u8 = 0x1B;
const MIN_CONTROLLER_TIMEOUT_MS: u64 = 1;
const MAX_CONTROLLER_TIMEOUT_MS: u64 = 3000;
const SOCKET_MARGIN: Duration = Duration::from_millis(500);
const DRAIN_CHUNK: usize = 512;

/// Escapes CR, LF, ESC and `+` for transmission to a Prologix controller.
#[must_use]
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(data.len() + 4);
    for byte in data {
        if matches!(*byte, b'\r' | b'\n' | ESC | b'+') {
            escaped.push(ESC);
        }
        escaped.push(*byte);
    }
    escaped
}

/// Connection to an upstream controller.
#[derive(Debug)]
pub struct PrologixUpstream {
    peer: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    addressed: Option<GpibAddress>,
    eoi: Option<bool>,
    controller_timeout_ms: Option<u64>,
}

impl PrologixUpstream {
    /// Connects to `host:port` and puts the controller into a known state.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Io`] when the controller is unreachable.
    pub fn connect(host: &str, port: u16, read_timeout: Duration) -> Result<Self, BusError> {
        let writer = TcpStream::connect((host, port))?;
        writer.set_nodelay(true)?;
        let reader = BufReader::new(writer.try_clone()?);
        let mut upstream = Self {
            peer: format!("{host}:{port}"),
            reader,
            writer,
            addressed: None,
            eoi: None,
            controller_timeout_ms: None,
        };
        upstream.setup(read_timeout)?;
        info!(
            target: BUS_TARGET,
            peer = %upstream.peer,
            "connected to upstream Prologix controller"
        );
        Ok(upstream)
    }

    /// Address of the upstream controller.
    #[must_use]
    pub fn peer(&self) -> &str {
        self.peer.as_str()
    }

    fn setup(&mut self, read_timeout: Duration) -> Result<(), BusError> {
        self.command("++mode 1")?;
        self.command("++auto 0")?;
        self.sync_timeout(read_timeout)?;
        self.command("++eos 3")?;
        self.command("++eot_enable 0")?;
        self.sync_eoi(true)
    }

    fn command(&mut self, line: &str) -> Result<(), BusError> {
        debug!(target: BUS_TARGET, peer = %self.peer, command = line, "upstream command");
        self.send(line.as_bytes())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), BusError> {
        self.discard_stale()?;
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload);
        frame.push(b'\n');
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Drops buffered and already-arrived bytes nobody asked for.
    fn discard_stale(&mut self) -> Result<(), BusError> {
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        let socket = self.reader.get_mut();
        socket.set_nonblocking(true)?;
        let mut chunk = [0_u8; DRAIN_CHUNK];
        let mut drained = buffered;
        let outcome = loop {
            match socket.read(&mut chunk) {
                Ok(0) => break Ok(()),
                Ok(count) => drained += count,
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) if error.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(error) => break Err(error),
            }
        };
        socket.set_nonblocking(false)?;
        if drained > 0 {
            debug!(
                target: BUS_TARGET,
                peer = %self.peer,
                bytes = drained,
                "discarded stale upstream bytes"
            );
        }
        outcome.map_err(BusError::from)
    }

    fn select(&mut self, address: GpibAddress) -> Result<(), BusError> {
        if self.addressed != Some(address) {
            self.command(&format!("++addr {address}"))?;
            self.addressed = Some(address);
        }
        Ok(())
    }

    fn sync_eoi(&mut self, eoi: bool) -> Result<(), BusError> {
        if self.eoi != Some(eoi) {
            self.command(if eoi { "++eoi 1" } else { "++eoi 0" })?;
            self.eoi = Some(eoi);
        }
        Ok(())
    }

    fn sync_timeout(&mut self, timeout: Duration) -> Result<(), BusError> {
        let millis = u64::try_from(timeout.as_millis())
            .unwrap_or(MAX_CONTROLLER_TIMEOUT_MS)
            .clamp(MIN_CONTROLLER_TIMEOUT_MS, MAX_CONTROLLER_TIMEOUT_MS);
        if self.controller_timeout_ms != Some(millis) {
            self.command(&format!("++read_tmo_ms {millis}"))?;
            self.controller_timeout_ms = Some(millis);
        }
        // The controller gives up first; the socket only guards against a
        // silent peer.
        self.reader
            .get_ref()
            .set_read_timeout(Some(Duration::from_millis(millis) + SOCKET_MARGIN))?;
        Ok(())
    }

    /// Reads up to and including `stop`, or until the socket times out when
    /// `stop` is `None`. A timeout with nothing received is an error.
    fn receive(&mut self, stop: Option<u8>) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        let outcome = match stop {
            Some(byte) => self.reader.read_until(byte, &mut data),
            None => self.reader.read_to_end(&mut data),
        };
        match outcome {
            Ok(0) => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "upstream controller closed the connection",
            )),
            Ok(_) => Ok(data),
            Err(error) if is_timeout(&error) && !data.is_empty() => Ok(data),
            Err(error) => Err(error),
        }
    }

    fn receive_from(
        &mut self,
        address: GpibAddress,
        stop: Option<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        self.receive(stop).map_err(|error| {
            if is_timeout(&error) {
                BusError::Timeout { address, timeout }
            } else {
                BusError::from(error)
            }
        })
    }

    fn reply_line(&mut self) -> Result<String, BusError> {
        let line = self.receive(Some(b'\n'))?;
        Ok(String::from_utf8_lossy(&line).trim().to_owned())
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

impl GpibBackend for PrologixUpstream {
    fn name(&self) -> &'static str {
        "prologix"
    }

    fn open(&mut self, address: GpibAddress) -> Result<(), BusError> {
        debug!(target: BUS_TARGET, peer = %self.peer, %address, "upstream session opened");
        Ok(())
    }

    fn close(&mut self, address: GpibAddress) {
        debug!(target: BUS_TARGET, peer = %self.peer, %address, "upstream session closed");
    }

    fn write(
        &mut self,
        address: GpibAddress,
        data: &[u8],
        eoi: bool,
        _timeout: Duration,
    ) -> Result<(), BusError> {
        self.select(address)?;
        self.sync_eoi(eoi)?;
        self.send(&escape(data))
    }

    fn read(
        &mut self,
        address: GpibAddress,
        termination: ReadTermination,
        timeout: Duration,
    ) -> Result<ReadOutcome, BusError> {
        self.select(address)?;
        self.sync_timeout(timeout)?;
        match termination {
            ReadTermination::Eoi => {
                self.command("++read eoi")?;
                let data = self.receive_from(address, Some(b'\n'), timeout)?;
                let eoi = data.last() == Some(&b'\n');
                Ok(ReadOutcome::new(data, eoi))
            }
            ReadTermination::Char(stop) => {
                self.command(&format!("++read {stop}"))?;
                let data = self.receive_from(address, Some(stop), timeout)?;
                Ok(ReadOutcome::new(data, false))
            }
            ReadTermination::Timeout => {
                self.command("++read")?;
                let data = self.receive_from(address, None, timeout)?;
                Ok(ReadOutcome::new(data, false))
            }
        }
    }

    fn clear(&mut self, address: GpibAddress) -> Result<(), BusError> {
        self.select(address)?;
        self.command("++clr")
    }

    fn trigger(&mut self, addresses: &[GpibAddress]) -> Result<(), BusError> {
        let list: Vec<String> = addresses.iter().map(ToString::to_string).collect();
        self.command(&format!("++trg {}", list.join(" ")))
    }

    fn serial_poll(&mut self, address: GpibAddress, timeout: Duration) -> Result<u8, BusError> {
        self.sync_timeout(timeout)?;
        self.command(&format!("++spoll {address}"))?;
        let reply = self.reply_line()?;
        reply
            .parse()
            .map_err(|_| BusError::protocol(format!("serial poll returned '{reply}'")))
    }

    fn service_request(&mut self) -> Result<bool, BusError> {
        self.command("++srq")?;
        match self.reply_line()?.as_str() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(BusError::protocol(format!("SRQ query returned '{other}'"))),
        }
    }

    fn interface_clear(&mut self) -> Result<(), BusError> {
        self.command("++ifc")
    }

    fn go_to_local(&mut self, address: GpibAddress) -> Result<(), BusError> {
        self.select(address)?;
        self.command("++loc")
    }

    fn local_lockout(&mut self, address: GpibAddress) -> Result<(), BusError> {
        self.select(address)?;
        self.command("++llo")
    }
}
