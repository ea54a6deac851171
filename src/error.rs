//! Error types for the relay server
//!
//! Defines protocol decode errors, relay-level errors, and message send
//! errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Wire decode errors
///
/// A decode error is always recovered locally: the error text is sent back
/// to the offending session and the connection stays open.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A line with no command tag at all
    #[error("empty command line")]
    EmptyLine,

    /// PRIVATE payload without the '|' separator between recipient and body
    #[error("private message missing '|' separator")]
    MissingSeparator,
}

/// Relay-level errors
///
/// Covers both fatal per-session errors (the handler loop exits) and
/// business errors (an informative line goes back to the sender).
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection fault (fatal to this one session only)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame on the wire
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// LOGIN with a handle another live session already holds
    #[error("{0} is already taken")]
    HandleTaken(String),

    /// Unicast target handle not present in the registry
    #[error("{0} not logged in")]
    RecipientNotFound(String),

    /// Message sent from a session that has not logged in yet
    #[error("please login first")]
    LoginRequired,
}

/// Message send errors
///
/// Occurs when delivering a line into a session's outbound channel fails.
/// Delivery is best effort; these are logged, never propagated to the
/// broadcaster.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound buffer is full (slow or stalled recipient)
    #[error("Channel full")]
    ChannelFull,
}
