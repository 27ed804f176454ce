//! STOMP 1.2 frame encoding and decoding.
//!
//! A frame is `COMMAND\n(header:value\n)*\nbody\0`. A bare end-of-line
//! between frames is a heartbeat. One WebSocket text message may carry
//! several frames.

use std::fmt;
use std::str::FromStr;

use donorlink_core::error::AppError;

/// Frame terminator.
pub const NUL: char = '\0';

/// STOMP commands used by this client, in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client opens the session.
    Connect,
    /// Server accepts the session.
    Connected,
    /// Client subscribes to a destination.
    Subscribe,
    /// Client cancels a subscription.
    Unsubscribe,
    /// Client ends the session.
    Disconnect,
    /// Server delivers a message.
    Message,
    /// Server acknowledges a receipt request.
    Receipt,
    /// Server reports an error; the connection closes after it.
    Error,
}

impl Command {
    /// Return the command as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are sent without escaping.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" | "STOMP" => Ok(Self::Connect),
            "CONNECTED" => Ok(Self::Connected),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "DISCONNECT" => Ok(Self::Disconnect),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(AppError::validation(format!("Unknown STOMP command: {other}"))),
        }
    }
}

/// One STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The command.
    pub command: Command,
    /// Headers in wire order. On repeats the first occurrence wins.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
}

/// A decoded unit from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A heartbeat (bare end-of-line).
    Heartbeat,
    /// A full frame.
    Frame(Frame),
}

impl Frame {
    /// A frame with no headers and no body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to wire text, including the terminating NUL.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }

    /// Parse one frame (without its trailing NUL).
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        let (head, body) = match raw.find("\n\n") {
            Some(idx) => (&raw[..idx], &raw[idx + 2..]),
            None => match raw.find("\r\n\r\n") {
                Some(idx) => (&raw[..idx], &raw[idx + 4..]),
                None => (raw, ""),
            },
        };

        let mut lines = head.lines();
        let command: Command = lines
            .next()
            .map(|l| l.trim_end_matches('\r'))
            .ok_or_else(|| AppError::validation("Empty STOMP frame"))?
            .parse()?;

        let unescape = command.escapes_headers();
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| AppError::validation(format!("Malformed STOMP header: {line}")))?;
            if unescape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = Self {
            command,
            headers,
            body: String::new(),
        };
        frame.body = match frame.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
            Some(len) if len <= body.len() && body.is_char_boundary(len) => body[..len].to_string(),
            _ => body.to_string(),
        };
        Ok(frame)
    }
}

/// Split one WebSocket text message into heartbeats and frames.
///
/// Malformed frames come back as errors in place so the caller can drop
/// them without losing the rest of the message.
pub fn decode(text: &str) -> Vec<Result<Decoded, AppError>> {
    let mut out = Vec::new();
    let mut rest = text;
    loop {
        let trimmed = rest.trim_start_matches(['\r', '\n']);
        let heartbeats = rest[..rest.len() - trimmed.len()]
            .chars()
            .filter(|c| *c == '\n')
            .count();
        out.extend(std::iter::repeat_with(|| Ok(Decoded::Heartbeat)).take(heartbeats));
        if trimmed.is_empty() {
            break;
        }
        match trimmed.find(NUL) {
            Some(end) => {
                out.push(Frame::parse(&trimmed[..end]).map(Decoded::Frame));
                rest = &trimmed[end + 1..];
            }
            None => {
                out.push(Err(AppError::validation("Unterminated STOMP frame")));
                break;
            }
        }
    }
    out
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, AppError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(AppError::validation(format!(
                    "Invalid STOMP header escape: \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_subscribe_escapes_headers() {
        let frame = Frame::new(Command::Subscribe)
            .header("id", "sub-0")
            .header("destination", "/user/a:b/queue/notifications");
        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-0\ndestination:/user/a\\cb/queue/notifications\n\n\0"
        );
    }

    #[test]
    fn test_connect_headers_are_not_escaped() {
        let frame = Frame::new(Command::Connect).header("host", "localhost:8080");
        assert_eq!(frame.encode(), "CONNECT\nhost:localhost:8080\n\n\0");
    }

    #[test]
    fn test_parse_message_with_content_length() {
        let raw = "MESSAGE\ndestination:/user/u/queue/notifications\ncontent-length:2\nsubscription:sub-0\n\n{}";
        let frame = Frame::parse(raw).unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.body, "{}");
    }

    #[test]
    fn test_decode_mixed_heartbeats_and_frames() {
        let text = "\nCONNECTED\nversion:1.2\nheart-beat:4000,4000\n\n\0\nMESSAGE\ndestination:/x\n\n{\"a\":1}\0";
        let decoded = decode(text);
        assert_eq!(decoded.len(), 4);
        assert!(matches!(decoded[0], Ok(Decoded::Heartbeat)));
        assert!(matches!(&decoded[1], Ok(Decoded::Frame(f)) if f.command == Command::Connected));
        assert!(matches!(decoded[2], Ok(Decoded::Heartbeat)));
        assert!(matches!(&decoded[3], Ok(Decoded::Frame(f)) if f.body == "{\"a\":1}"));
    }

    #[test]
    fn test_bare_newline_is_heartbeat() {
        for text in ["\n", "\r\n"] {
            let decoded = decode(text);
            assert_eq!(decoded.len(), 1);
            assert!(matches!(decoded[0], Ok(Decoded::Heartbeat)));
        }
    }

    #[test]
    fn test_malformed_frames_are_reported_in_place() {
        let decoded = decode("BOGUS\n\n\0MESSAGE\n\nok\0");
        assert!(decoded[0].is_err());
        assert!(matches!(&decoded[1], Ok(Decoded::Frame(f)) if f.body == "ok"));
    }

    #[test]
    fn test_header_roundtrip_of_special_characters() {
        let frame = Frame::new(Command::Message).header("note", "a:b\\c\nd");
        let encoded = frame.encode();
        let parsed = Frame::parse(encoded.trim_end_matches(NUL)).unwrap();
        assert_eq!(parsed.get("note"), Some("a:b\\c\nd"));
    }
}
