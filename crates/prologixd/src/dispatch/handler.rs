//! Connection handler that serves the Prologix protocol.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use gpib_bus::GpibBus;

use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::client::{ClientConnection, ClientDefaults};
use super::errors::DispatchError;
use super::framing::{Frame, LineDecoder};
use super::response::ResponseWriter;
use super::table;

const READ_CHUNK: usize = 4096;
const DRAIN_WINDOW: Duration = Duration::from_millis(250);
const DRAIN_DEADLINE: Duration = Duration::from_secs(2);

/// Serves each connection until the client disconnects.
#[derive(Debug)]
pub struct DispatchConnectionHandler {
    bus: Arc<GpibBus>,
    defaults: ClientDefaults,
}

impl DispatchConnectionHandler {
    /// Creates a handler sharing `bus` between all clients.
    pub(crate) fn new(bus: Arc<GpibBus>, defaults: ClientDefaults) -> Self {
        Self { bus, defaults }
    }

    fn serve(&self, mut stream: ConnectionStream) {
        let peer = stream.peer();
        let mut client = ClientConnection::new(Arc::clone(&self.bus), self.defaults);
        match serve_lines(&mut stream, &mut client) {
            Ok(()) => info!(target: DISPATCH_TARGET, %peer, "client disconnected"),
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %peer, %error, "closing client connection");
                if !matches!(error, DispatchError::Io(_)) {
                    close_with_error(&mut stream, &error);
                }
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.serve(stream);
    }
}

/// Reads and answers lines until end of stream or a fatal error.
fn serve_lines(
    stream: &mut ConnectionStream,
    client: &mut ClientConnection,
) -> Result<(), DispatchError> {
    let mut decoder = LineDecoder::new();
    let mut frames = Vec::new();
    let mut chunk = [0_u8; READ_CHUNK];
    loop {
        let bytes_read = read_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            frames.extend(decoder.finish());
            return process_frames(stream, client, &mut frames);
        }
        // Complete lines read before an over-long one are still answered.
        let fed = decoder.feed(chunk.get(..bytes_read).unwrap_or_default(), &mut frames);
        process_frames(stream, client, &mut frames)?;
        fed?;
    }
}

fn process_frames(
    stream: &mut ConnectionStream,
    client: &mut ClientConnection,
    frames: &mut Vec<Frame>,
) -> Result<(), DispatchError> {
    let peer = stream.peer();
    let mut writer = ResponseWriter::new(stream);
    for frame in frames.drain(..) {
        let outcome = match frame {
            Frame::Command(text) => {
                debug!(target: DISPATCH_TARGET, %peer, command = %text, "command");
                table::execute(client, &text)
            }
            Frame::Data(data) => {
                debug!(target: DISPATCH_TARGET, %peer, bytes = data.len(), "instrument data");
                client.send_data(&data).map(|response| {
                    response.map_or(table::Reply::Silent, table::Reply::Data)
                })
            }
        };
        match outcome {
            Ok(reply) => writer.write_reply(reply)?,
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                debug!(target: DISPATCH_TARGET, %peer, %error, "command failed");
                writer.write_error(&error)?;
            }
        }
    }
    Ok(())
}

/// Sends the final error line and closes the connection without discarding
/// it: unread client bytes would otherwise make the close a reset.
fn close_with_error(stream: &mut ConnectionStream, error: &DispatchError) {
    let peer = stream.peer();
    if let Err(write_error) = ResponseWriter::new(&mut *stream).write_error(error) {
        debug!(target: DISPATCH_TARGET, %peer, error = %write_error, "final error line not sent");
        return;
    }
    if let Err(shutdown_error) = stream.shutdown_write() {
        debug!(target: DISPATCH_TARGET, %peer, error = %shutdown_error, "half-close failed");
        return;
    }
    if let Err(drain_error) = drain_input(stream) {
        debug!(target: DISPATCH_TARGET, %peer, error = %drain_error, "stopped draining client input");
    }
}

/// Discards client input until the client goes quiet, closes, or the
/// deadline passes.
fn drain_input(stream: &mut ConnectionStream) -> io::Result<()> {
    stream.set_read_timeout(Some(DRAIN_WINDOW))?;
    let deadline = Instant::now() + DRAIN_DEADLINE;
    let mut chunk = [0_u8; READ_CHUNK];
    while Instant::now() < deadline {
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Reads from the stream, retrying on interrupts.
fn read_with_retry(stream: &mut ConnectionStream, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
