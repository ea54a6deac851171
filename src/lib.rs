//! Line-Protocol Broadcast Chat Relay Library
//!
//! An in-memory, connection-oriented broadcast relay built on tokio.
//! Clients speak a one-character-tag, newline-delimited text protocol:
//! `A<name>` logs in, `D<text>` broadcasts to the room, `B<recipient>|<body>`
//! sends a private message, `C` quits.
//!
//! # Features
//! - Line-based wire codec with explicit decode errors
//! - Login handles as unicast routing keys, rejected when already taken
//! - Broadcast fan-out over a snapshot, so slow readers never stall the room
//! - Room-size notices on join, quit, and dropped connections
//! - Per-connection fault isolation: one broken socket never affects the rest
//!
//! # Architecture
//! One task per connection read loop plus one writer task per connection:
//! - `Registry` is the single shared resource, a mutex-guarded session list
//! - `SessionHandler` runs each connection's protocol state machine
//! - `Router` fans lines out via each session's outbound channel
//! - The registry lock is never held across an await point
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_relay::RelayServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     RelayServer::new().run(listener).await;
//! }
//! ```

pub mod error;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use error::{DecodeError, RelayError, SendError};
pub use handler::SessionHandler;
pub use protocol::Frame;
pub use registry::Registry;
pub use router::Router;
pub use server::RelayServer;
pub use session::{Session, SessionState};
pub use types::SessionId;
