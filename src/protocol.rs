//! Wire protocol codec
//!
//! One frame per newline-terminated UTF-8 line. The first character of a
//! line is the command tag; the remainder is the payload. Server-to-client
//! lines are plain `sender: text` display lines, with private messages
//! wrapping the sender in `<*...*>` brackets.
//!
//! Payloads are not escaped: an embedded newline or tag character inside a
//! message is passed through as-is. Known limitation of the format.

use crate::error::DecodeError;

/// Command tag: log in under a handle
pub const CMD_LOGIN: char = 'A';

/// Command tag: private message, payload is `recipient|body`
pub const CMD_PRIVATE: char = 'B';

/// Command tag: leave the server
pub const CMD_QUIT: char = 'C';

/// Command tag: broadcast to the whole room
pub const CMD_BCAST: char = 'D';

/// Separator between recipient and body in a PRIVATE payload
pub const SEPARATOR: char = '|';

/// Display identity used for all server-originated lines
pub const SERVER_ID: &str = "Server";

/// Separator between the sender display name and the message text
pub const SEP: &str = ": ";

/// One decoded protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// LOGIN with the requested handle (may be empty; the handler rejects it)
    Login(String),
    /// PRIVATE message to a single named recipient
    Private { recipient: String, body: String },
    /// QUIT, no payload
    Quit,
    /// BROADCAST to everyone in the room
    Broadcast(String),
    /// Unrecognized tag, carried so the caller can log and ignore it
    Unknown { tag: char, payload: String },
}

/// Decode one line (already stripped of its newline) into a frame.
///
/// An unknown command tag is not an error: it decodes to `Frame::Unknown`.
/// A PRIVATE payload missing its `'|'` separator is rejected rather than
/// silently treated as an empty-bodied message.
pub fn decode(line: &str) -> Result<Frame, DecodeError> {
    let mut chars = line.chars();
    let tag = chars.next().ok_or(DecodeError::EmptyLine)?;
    let payload = chars.as_str();

    match tag {
        CMD_LOGIN => Ok(Frame::Login(payload.to_string())),
        CMD_PRIVATE => {
            // Split on the first separator only; the body may contain more.
            let (recipient, body) = payload
                .split_once(SEPARATOR)
                .ok_or(DecodeError::MissingSeparator)?;
            Ok(Frame::Private {
                recipient: recipient.to_string(),
                body: body.to_string(),
            })
        }
        CMD_QUIT => Ok(Frame::Quit),
        CMD_BCAST => Ok(Frame::Broadcast(payload.to_string())),
        _ => Ok(Frame::Unknown {
            tag,
            payload: payload.to_string(),
        }),
    }
}

/// Format a display line as sent to clients: `sender: text`
pub fn display_line(sender: &str, text: &str) -> String {
    format!("{sender}{SEP}{text}")
}

/// Format a private display line: `<*sender*>: text`
///
/// The brackets let recipients tell a private message from a room message.
pub fn private_display_line(sender: &str, text: &str) -> String {
    format!("<*{sender}*>{SEP}{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_login() {
        assert_eq!(decode("Aalice"), Ok(Frame::Login("alice".to_string())));
    }

    #[test]
    fn test_decode_login_empty_name() {
        // Empty handle is a valid frame; rejecting it is the handler's job.
        assert_eq!(decode("A"), Ok(Frame::Login(String::new())));
    }

    #[test]
    fn test_decode_private() {
        assert_eq!(
            decode("Bbob|hi there"),
            Ok(Frame::Private {
                recipient: "bob".to_string(),
                body: "hi there".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_private_splits_on_first_separator() {
        assert_eq!(
            decode("Bbob|a|b|c"),
            Ok(Frame::Private {
                recipient: "bob".to_string(),
                body: "a|b|c".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_private_missing_separator() {
        assert_eq!(decode("Bbob hi"), Err(DecodeError::MissingSeparator));
    }

    #[test]
    fn test_decode_quit_and_broadcast() {
        assert_eq!(decode("C"), Ok(Frame::Quit));
        assert_eq!(
            decode("Dhello room"),
            Ok(Frame::Broadcast("hello room".to_string()))
        );
    }

    #[test]
    fn test_decode_unknown_tag() {
        assert_eq!(
            decode("Zwhatever"),
            Ok(Frame::Unknown {
                tag: 'Z',
                payload: "whatever".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_empty_line() {
        assert_eq!(decode(""), Err(DecodeError::EmptyLine));
    }

    #[test]
    fn test_display_line() {
        assert_eq!(display_line("alice", "hello"), "alice: hello");
        assert_eq!(display_line(SERVER_ID, "welcome"), "Server: welcome");
    }

    #[test]
    fn test_private_display_line() {
        assert_eq!(private_display_line("alice", "psst"), "<*alice*>: psst");
    }
}
