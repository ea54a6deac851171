//! Client registry
//!
//! The shared, lock-guarded collection of live sessions. All mutation and
//! all size/lookup queries go through one mutex, so a "total users" count
//! reported to clients is always consistent with the registry at the
//! instant of the report. Fan-out for broadcasts works on a `snapshot()`
//! copy taken under the lock and delivered after it is released, so a slow
//! recipient socket can never stall registry mutations.
//!
//! Sessions are stored in insertion order; a session is registered at
//! accept time, before it has a handle, and anonymous sessions count
//! toward the room size. The lock is a std mutex and is never held across
//! an await point.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::RelayError;
use crate::session::Session;
use crate::types::SessionId;

/// Shared session registry, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Vec<Session>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Session>> {
        // Poisoning would mean a panic inside one of these short critical
        // sections; there is no state worth salvaging past that.
        self.inner.lock().expect("registry mutex poisoned")
    }

    /// Insert a freshly accepted session (no handle yet).
    ///
    /// Returns the new registry size, used for the welcome line.
    pub fn add(&self, session: Session) -> usize {
        let mut sessions = self.lock();
        sessions.push(session);
        sessions.len()
    }

    /// Bind a login handle to an already-registered session.
    ///
    /// Rejects the bind if another live session already holds the handle,
    /// so unicast routing stays unambiguous. Returns the registry size
    /// observed under the same lock as the bind.
    pub fn bind_handle(&self, id: SessionId, name: &str) -> Result<usize, RelayError> {
        let mut sessions = self.lock();
        if sessions
            .iter()
            .any(|s| s.id != id && s.handle.as_deref() == Some(name))
        {
            return Err(RelayError::HandleTaken(name.to_string()));
        }
        if let Some(session) = sessions.iter_mut().find(|s| s.id == id) {
            session.handle = Some(name.to_string());
        }
        Ok(sessions.len())
    }

    /// Remove a session and return the number of sessions left.
    ///
    /// Idempotent: removing an absent id just reports the current size.
    pub fn remove(&self, id: SessionId) -> usize {
        let mut sessions = self.lock();
        sessions.retain(|s| s.id != id);
        sessions.len()
    }

    /// Find the session bound to a handle, if any
    pub fn lookup_by_handle(&self, name: &str) -> Option<Session> {
        self.lock()
            .iter()
            .find(|s| s.handle.as_deref() == Some(name))
            .cloned()
    }

    /// Defensive copy of the current sessions, in insertion order.
    ///
    /// Callers iterate this copy outside the lock.
    pub fn snapshot(&self) -> Vec<Session> {
        self.lock().clone()
    }

    /// Number of registered sessions (anonymous ones included)
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no sessions are registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
