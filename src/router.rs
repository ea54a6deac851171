//! Message router
//!
//! Broadcast and unicast delivery over the registry. A line is encoded
//! once, the registry is snapshotted, and delivery happens outside the
//! registry lock. Delivery to any single session is best effort: a failed
//! send is logged and never aborts delivery to the remaining recipients,
//! and never propagates to the sender. A dead recipient removes itself
//! when its own handler loop exits.

use tracing::{debug, info};

use crate::error::RelayError;
use crate::protocol;
use crate::registry::Registry;
use crate::session::Session;

/// Stateless fan-out over a shared registry, cheap to clone
#[derive(Debug, Clone)]
pub struct Router {
    registry: Registry,
}

impl Router {
    /// Create a router over the given registry
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Deliver `sender: text` to every registered session.
    ///
    /// The recipient set is the registry snapshot at call time; whoever is
    /// registered when the broadcast starts gets a copy, including the
    /// sender itself.
    pub fn broadcast(&self, sender: &str, text: &str) {
        let line = protocol::display_line(sender, text);
        info!("broadcasting {line}");
        for session in self.registry.snapshot() {
            self.deliver(&session, line.clone());
        }
    }

    /// Deliver `<*sender*>: text` to exactly one session, found by handle.
    pub fn unicast(&self, sender: &str, target: &str, text: &str) -> Result<(), RelayError> {
        let session = self
            .registry
            .lookup_by_handle(target)
            .ok_or_else(|| RelayError::RecipientNotFound(target.to_string()))?;
        self.deliver(&session, protocol::private_display_line(sender, text));
        Ok(())
    }

    /// Send a server-tagged line directly to one session.
    ///
    /// Used for welcome lines and error replies that must not reach the
    /// rest of the room.
    pub fn notify(&self, session: &Session, text: &str) {
        self.deliver(session, protocol::display_line(protocol::SERVER_ID, text));
    }

    fn deliver(&self, session: &Session, line: String) {
        if let Err(e) = session.send(line) {
            debug!("dropping line to {}: {e}", session.display_name());
        }
    }
}
