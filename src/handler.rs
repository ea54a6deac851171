//! Session handler
//!
//! The per-connection read loop and protocol state machine. One handler
//! task owns the read half of each connection, decodes one frame per line,
//! and drives registry mutations and routing. Whatever ends the loop
//! (QUIT, EOF, I/O fault), the same bookkeeping runs: the session leaves
//! the registry and the remaining room is told its new size.

use std::ops::ControlFlow;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

use crate::error::RelayError;
use crate::protocol::{self, Frame, SERVER_ID};
use crate::registry::Registry;
use crate::router::Router;
use crate::session::{Session, SessionState};

/// Protocol state machine for one connection
pub struct SessionHandler {
    session: Session,
    state: SessionState,
    login: Option<String>,
    registry: Registry,
    router: Router,
}

impl SessionHandler {
    /// Create a handler for a freshly registered session
    pub fn new(session: Session, registry: Registry, router: Router) -> Self {
        Self {
            session,
            state: SessionState::Unauthenticated,
            login: None,
            registry,
            router,
        }
    }

    /// Drive the connection until QUIT, EOF, or an I/O fault.
    ///
    /// A fault is fatal to this session only: it is logged here and the
    /// exit bookkeeping runs exactly as for a clean QUIT, minus the
    /// goodbye broadcast.
    pub async fn run<R: AsyncRead + Unpin>(mut self, reader: R) {
        if let Err(e) = self.read_loop(reader).await {
            warn!("connection fault for {}: {e}", self.display_name());
        }
        self.finish();
    }

    async fn read_loop<R: AsyncRead + Unpin>(&mut self, reader: R) -> Result<(), RelayError> {
        let mut reader = BufReader::new(reader);
        let mut buf = String::new();
        loop {
            buf.clear();
            if reader.read_line(&mut buf).await? == 0 {
                // EOF: an implicit QUIT without the goodbye broadcast.
                info!("{} disconnected", self.display_name());
                return Ok(());
            }
            let line = buf.trim_end_matches(['\r', '\n']);
            match protocol::decode(line) {
                Ok(frame) => {
                    if self.dispatch(frame).is_break() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    // Malformed frame: tell the sender, keep the connection.
                    warn!("decode error from {}: {e}", self.display_name());
                    self.router.notify(&self.session, &e.to_string());
                }
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) -> ControlFlow<()> {
        match frame {
            Frame::Login(name) => self.on_login(name),
            Frame::Broadcast(text) => self.on_broadcast(&text),
            Frame::Private { recipient, body } => self.on_private(&recipient, &body),
            Frame::Quit => {
                self.on_quit();
                return ControlFlow::Break(());
            }
            Frame::Unknown { tag, .. } => {
                warn!("unknown cmd {tag:?} from {}", self.display_name());
            }
        }
        ControlFlow::Continue(())
    }

    fn on_login(&mut self, name: String) {
        if self.state == SessionState::LoggedIn {
            // The wire format would let a second LOGIN silently rebind the
            // handle and break unicast routing. Refuse it.
            warn!("duplicate LOGIN from {}, ignored", self.display_name());
            return;
        }
        if name.is_empty() {
            info!("LOGIN INVALID from {}", self.session.peer);
            self.router
                .notify(&self.session, &format!("LOGIN {name} invalid"));
            return;
        }
        match self.registry.bind_handle(self.session.id, &name) {
            Ok(total) => {
                self.login = Some(name.clone());
                self.state = SessionState::LoggedIn;
                self.router.broadcast(
                    SERVER_ID,
                    &format!("{name} joins us, for a total of {total} users"),
                );
            }
            Err(e) => {
                info!("LOGIN rejected for {}: {e}", self.session.peer);
                self.router.notify(&self.session, &e.to_string());
            }
        }
    }

    fn on_broadcast(&self, text: &str) {
        match &self.login {
            Some(handle) => self.router.broadcast(handle, text),
            // Pre-login broadcasts are dropped without a reply.
            None => info!("broadcast before login from {}", self.session.peer),
        }
    }

    fn on_private(&self, recipient: &str, body: &str) {
        if self.state != SessionState::LoggedIn {
            self.router
                .notify(&self.session, &RelayError::LoginRequired.to_string());
            return;
        }
        let sender = self.login.as_deref().unwrap_or(&self.session.peer);
        info!("MESG: {sender} --> {recipient}");
        if let Err(e) = self.router.unicast(sender, recipient, body) {
            self.router.notify(&self.session, &e.to_string());
        }
    }

    fn on_quit(&self) {
        // The quitter is still registered, so it hears its own goodbye.
        self.router
            .broadcast(SERVER_ID, &format!("Goodbye to {}", self.display_name()));
    }

    /// Exit bookkeeping, shared by every way out of the loop.
    fn finish(&mut self) {
        self.state = SessionState::Closed;
        let remaining = self.registry.remove(self.session.id);
        match remaining {
            0 => info!("room is empty, I'm so lonely I could cry..."),
            1 => self
                .router
                .broadcast(SERVER_ID, "Hey, you're talking to yourself again"),
            n => self
                .router
                .broadcast(SERVER_ID, &format!("There are now {n} users")),
        }
    }

    fn display_name(&self) -> &str {
        self.login.as_deref().unwrap_or(&self.session.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;
    use tokio::sync::mpsc;

    fn setup(registry: &Registry) -> (SessionHandler, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        let session = Session::new(SessionId::new(), "peer".to_string(), tx);
        registry.add(session.clone());
        let handler = SessionHandler::new(session, registry.clone(), Router::new(registry.clone()));
        (handler, rx)
    }

    #[tokio::test]
    async fn test_login_registers_and_announces() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Login("alice".to_string()));

        assert_eq!(handler.state, SessionState::LoggedIn);
        assert!(registry.lookup_by_handle("alice").is_some());
        assert_eq!(
            rx.recv().await.unwrap(),
            "Server: alice joins us, for a total of 1 users"
        );
    }

    #[tokio::test]
    async fn test_login_empty_name_rejected() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Login(String::new()));

        assert_eq!(handler.state, SessionState::Unauthenticated);
        assert_eq!(registry.len(), 1); // still just the anonymous entry
        assert_eq!(rx.recv().await.unwrap(), "Server: LOGIN  invalid");
    }

    #[tokio::test]
    async fn test_second_login_ignored() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Login("alice".to_string()));
        let _ = rx.recv().await; // join notice
        handler.dispatch(Frame::Login("mallory".to_string()));

        assert!(registry.lookup_by_handle("alice").is_some());
        assert!(registry.lookup_by_handle("mallory").is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_login_duplicate_handle_rejected() {
        let registry = Registry::new();
        let (mut first, mut rx_first) = setup(&registry);
        let (mut second, mut rx_second) = setup(&registry);

        first.dispatch(Frame::Login("alice".to_string()));
        let _ = rx_first.recv().await;
        let _ = rx_second.recv().await; // both saw the join notice

        second.dispatch(Frame::Login("alice".to_string()));

        assert_eq!(second.state, SessionState::Unauthenticated);
        assert_eq!(
            rx_second.recv().await.unwrap(),
            "Server: alice is already taken"
        );
        assert!(rx_first.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_before_login_is_silent() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Broadcast("hello?".to_string()));

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_echoes_to_sender() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Login("alice".to_string()));
        let _ = rx.recv().await;
        handler.dispatch(Frame::Broadcast("hello room".to_string()));

        assert_eq!(rx.recv().await.unwrap(), "alice: hello room");
    }

    #[tokio::test]
    async fn test_private_before_login() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Private {
            recipient: "bob".to_string(),
            body: "hi".to_string(),
        });

        assert_eq!(rx.recv().await.unwrap(), "Server: please login first");
    }

    #[tokio::test]
    async fn test_private_to_unknown_recipient() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Login("alice".to_string()));
        let _ = rx.recv().await;
        handler.dispatch(Frame::Private {
            recipient: "bob".to_string(),
            body: "hi".to_string(),
        });

        assert_eq!(rx.recv().await.unwrap(), "Server: bob not logged in");
    }

    #[tokio::test]
    async fn test_private_delivery() {
        let registry = Registry::new();
        let (mut alice, mut rx_alice) = setup(&registry);
        let (mut bob, mut rx_bob) = setup(&registry);

        alice.dispatch(Frame::Login("alice".to_string()));
        bob.dispatch(Frame::Login("bob".to_string()));
        // Drain the two join notices each side saw.
        for _ in 0..2 {
            let _ = rx_alice.recv().await;
            let _ = rx_bob.recv().await;
        }

        alice.dispatch(Frame::Private {
            recipient: "bob".to_string(),
            body: "hi".to_string(),
        });

        assert_eq!(rx_bob.recv().await.unwrap(), "<*alice*>: hi");
        assert!(rx_alice.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_quit_broadcasts_goodbye_then_flow_breaks() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        handler.dispatch(Frame::Login("alice".to_string()));
        let _ = rx.recv().await;

        let flow = handler.dispatch(Frame::Quit);
        assert!(flow.is_break());
        assert_eq!(rx.recv().await.unwrap(), "Server: Goodbye to alice");
    }

    #[tokio::test]
    async fn test_finish_removes_and_notifies_remaining() {
        let registry = Registry::new();
        let (mut alice, mut rx_alice) = setup(&registry);
        let (mut bob, mut rx_bob) = setup(&registry);

        alice.dispatch(Frame::Login("alice".to_string()));
        bob.dispatch(Frame::Login("bob".to_string()));
        for _ in 0..2 {
            let _ = rx_alice.recv().await;
            let _ = rx_bob.recv().await;
        }

        alice.finish();

        assert!(registry.lookup_by_handle("alice").is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            rx_bob.recv().await.unwrap(),
            "Server: Hey, you're talking to yourself again"
        );
        // The departing session is already out of the registry.
        assert!(rx_alice.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_frame_ignored() {
        let registry = Registry::new();
        let (mut handler, mut rx) = setup(&registry);

        let flow = handler.dispatch(Frame::Unknown {
            tag: 'Z',
            payload: "???".to_string(),
        });

        assert!(flow.is_continue());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_handles_eof_and_bad_lines() {
        let registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(32);
        let session = Session::new(SessionId::new(), "peer".to_string(), tx);
        registry.add(session.clone());
        let handler =
            SessionHandler::new(session, registry.clone(), Router::new(registry.clone()));

        // LOGIN, malformed PRIVATE, then EOF.
        let script: &[u8] = b"Aalice\nBnoseparator\n";
        handler.run(script).await;

        assert_eq!(
            rx.recv().await.unwrap(),
            "Server: alice joins us, for a total of 1 users"
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            "Server: private message missing '|' separator"
        );
        assert_eq!(registry.len(), 0);
    }
}
