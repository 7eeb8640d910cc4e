//! Minimal STOMP 1.2 frame codec.
//!
//! The harness only exercises a fixed subset of the protocol: CONNECT /
//! SUBSCRIBE / SEND / DISCONNECT outbound, CONNECTED / MESSAGE / ERROR
//! inbound, plus the bare-LF heartbeat. Anything else the broker sends is a
//! decode error that callers report and skip.

use thiserror::Error;

/// Well-known header names used by the harness.
pub const HDR_DESTINATION: &str = "destination";
pub const HDR_SUBSCRIPTION: &str = "subscription";
pub const HDR_MESSAGE: &str = "message";
pub const HDR_ID: &str = "id";

/// The outgoing heartbeat payload: a single LF.
pub const HEARTBEAT: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("malformed header line: {0}")]
    BadHeader(String),
    #[error("invalid header escape sequence")]
    BadEscape,
    #[error("frame missing NUL terminator")]
    MissingNul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Send,
    Disconnect,
    Message,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Send => "SEND",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONNECT" => Some(Command::Connect),
            "CONNECTED" => Some(Command::Connected),
            "SUBSCRIBE" => Some(Command::Subscribe),
            "SEND" => Some(Command::Send),
            "DISCONNECT" => Some(Command::Disconnect),
            "MESSAGE" => Some(Command::Message),
            "ERROR" => Some(Command::Error),
            _ => None,
        }
    }
}

/// A single STOMP frame: command, ordered header list, body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the named header, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame with symmetric heartbeat negotiation.
    pub fn connect(heartbeat_ms: u32) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("heart-beat", format!("{heartbeat_ms},{heartbeat_ms}"))
    }

    pub fn subscribe(id: impl Into<String>, destination: impl Into<String>) -> Self {
        Frame::new(Command::Subscribe)
            .header(HDR_ID, id)
            .header(HDR_DESTINATION, destination)
    }

    pub fn send_json(destination: impl Into<String>, body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .header(HDR_DESTINATION, destination)
            .header("content-type", "application/json")
            .body(body)
    }

    /// Serialize to the wire format: command line, header lines, blank line,
    /// body, NUL.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            out.push_str(&escape(name));
            out.push(':');
            out.push_str(&escape(value));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse a raw websocket text payload. Returns `None` for a heartbeat
    /// (one or more bare EOLs).
    pub fn decode(raw: &str) -> Result<Option<Frame>, FrameError> {
        if raw.is_empty() {
            return Err(FrameError::Empty);
        }
        if raw.trim_matches(['\r', '\n']).is_empty() {
            return Ok(None);
        }

        let data = match raw.find('\0') {
            // Anything after the NUL is padding (some servers append an EOL).
            Some(idx) => &raw[..idx],
            None => return Err(FrameError::MissingNul),
        };

        // The head ends at whichever separator comes first; a bare "\n\n"
        // later in a CRLF frame belongs to the body.
        let lf = data.find("\n\n");
        let crlf = data.find("\r\n\r\n");
        let (head, body) = match (lf, crlf) {
            (Some(l), Some(c)) if c < l => (&data[..c], &data[c + 4..]),
            (Some(l), _) => (&data[..l], &data[l + 2..]),
            (None, Some(c)) => (&data[..c], &data[c + 4..]),
            (None, None) => (data, ""),
        };

        let mut lines = head.lines();
        let command_line = lines.next().ok_or(FrameError::Empty)?.trim_end_matches('\r');
        let command = Command::parse(command_line)
            .ok_or_else(|| FrameError::UnknownCommand(command_line.to_string()))?;

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::BadHeader(line.to_string()))?;
            headers.push((unescape(name)?, unescape(value)?));
        }

        Ok(Some(Frame {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::BadEscape),
        }
    }
    Ok(out)
}
