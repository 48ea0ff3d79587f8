//! Handler double that records which peers were handed over.

use std::net::SocketAddr;
use std::sync::Mutex;

use super::{ConnectionHandler, ConnectionStream};

#[derive(Default)]
pub(crate) struct RecordingHandler {
    peers: Mutex<Vec<SocketAddr>>,
}

impl RecordingHandler {
    pub(crate) fn peers(&self) -> Vec<SocketAddr> {
        let mut peers = self.peers.lock().expect("peers lock").clone();
        peers.sort();
        peers
    }

    pub(crate) fn handled(&self) -> usize {
        self.peers.lock().expect("peers lock").len()
    }
}

impl ConnectionHandler for RecordingHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.peers.lock().expect("peers lock").push(stream.peer());
    }
}
