//! Connection acceptor
//!
//! Binds nothing itself: the caller hands over a bound `TcpListener` and
//! `run` accepts forever. Each accepted socket is split, given a writer
//! task and a registry entry, greeted with a welcome line, and handed to
//! its own handler task. A failed accept is logged and the loop carries
//! on; nothing short of process shutdown stops it.

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::handler::SessionHandler;
use crate::registry::Registry;
use crate::router::Router;
use crate::session::Session;
use crate::types::SessionId;

/// Outbound line buffer per connection; a recipient further behind than
/// this starts dropping lines rather than stalling senders
const OUTBOUND_BUFFER: usize = 32;

/// The relay server: one registry, one router, one accept loop
#[derive(Debug)]
pub struct RelayServer {
    registry: Registry,
    router: Router,
}

impl RelayServer {
    /// Create a server with an empty registry
    pub fn new() -> Self {
        let registry = Registry::new();
        let router = Router::new(registry.clone());
        Self { registry, router }
    }

    /// The shared session registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Accept connections forever.
    ///
    /// One failed accept never terminates the loop.
    pub async fn run(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Accepted from {addr}");
                    self.start_session(stream, addr.to_string());
                }
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                }
            }
        }
    }

    /// Wire up one accepted connection and spawn its tasks.
    fn start_session(&self, stream: TcpStream, peer: String) {
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(write_lines(write_half, outbound_rx));

        let session = Session::new(SessionId::new(), peer, outbound_tx);

        // Registry membership precedes having a handle: anonymous
        // connections count toward the room size, as the welcome line shows.
        let total = self.registry.add(session.clone());
        let welcome = if total == 1 {
            "Welcome! you're the first one here".to_string()
        } else {
            format!("Welcome! you're the latest of {total} users.")
        };
        self.router.notify(&session, &welcome);

        let handler = SessionHandler::new(session, self.registry.clone(), self.router.clone());
        tokio::spawn(handler.run(read_half));
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer task: drain queued display lines onto the socket.
///
/// Ends when the channel closes (session removed, all senders dropped) or
/// the peer stops accepting writes; either way the write half shuts down
/// here and nowhere else.
async fn write_lines(mut write_half: OwnedWriteHalf, mut outbound_rx: mpsc::Receiver<String>) {
    while let Some(mut line) = outbound_rx.recv().await {
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            debug!("write failed, ending writer task: {e}");
            break;
        }
    }
    let _ = write_half.shutdown().await;
}
