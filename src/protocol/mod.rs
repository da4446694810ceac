// Wire protocol shared by every hop: a single-line text request and a
// single-line JSON response per connection.

use std::fmt;
use std::io;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;


/// Maximum bytes read for a single request on any hop.
pub const MAX_REQUEST_BYTES: usize = 1024;

pub const METRICS_COMMAND: &str = "METRICS";

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `METRICS`: a metrics snapshot query.
    Metrics,
    /// `GET <resource>/<key>`: a document read.
    Get { resource: String, key: String },
}

/// Rejection reasons for an unusable request line. `WrongMethod` maps to
/// `WRONG_METHOD: <verb>` on the wire, everything else to `BAD_REQUEST`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty request line")]
    Empty,
    #[error("request line is not valid utf-8")]
    InvalidUtf8,
    #[error("expected '<verb> <resource>/<key>'")]
    Malformed,
    #[error("{0} is not currently supported")]
    WrongMethod(String),
    #[error("missing '/' between resource and key")]
    MissingSlash,
    #[error("resource and key must be non-empty")]
    EmptyComponent,
}

impl Request {
    /// Parses a raw request as read off the socket.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, ParseError> {
        let line = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;
        Self::parse(line)
    }

    /// Parses a request line. The verb check runs after tokenization, so a
    /// line that does not split into a verb and a path is `Malformed` even
    /// when its first token is not `GET`.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        if line == METRICS_COMMAND {
            return Ok(Self::Metrics);
        }

        let mut tokens = line.split_whitespace();
        let (verb, path) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(verb), Some(path), None) => (verb, path),
            _ => return Err(ParseError::Malformed),
        };
        if verb != "GET" {
            return Err(ParseError::WrongMethod(verb.to_string()));
        }

        // The path splits at the first '/'; the key may contain more.
        let (resource, key) = path.split_once('/').ok_or(ParseError::MissingSlash)?;
        if resource.is_empty() || key.is_empty() {
            return Err(ParseError::EmptyComponent);
        }

        Ok(Self::Get {
            resource: resource.to_string(),
            key: key.to_string(),
        })
    }

    /// The canonical cache key `<resource>/<key>`; `None` for `METRICS`.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            Self::Metrics => None,
            Self::Get { resource, key } => Some(format!("{}/{}", resource, key)),
        }
    }

    /// Renders the request back into its wire form, newline included.
    pub fn to_line(&self) -> String {
        match self {
            Self::Metrics => format!("{}\n", METRICS_COMMAND),
            Self::Get { resource, key } => format!("GET {}/{}\n", resource, key),
        }
    }
}

/// Status vocabulary carried in every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    WrongMethod(String),
    BadRequest,
    OriginFailure,
    ProxyUnreachable,
    ProxyError,
    ClientConnectionError,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::NotFound => f.write_str("NOT_FOUND"),
            Status::WrongMethod(verb) => write!(f, "WRONG_METHOD: {}", verb),
            Status::BadRequest => f.write_str("BAD_REQUEST"),
            Status::OriginFailure => f.write_str("ORIGIN_FAILURE"),
            Status::ProxyUnreachable => f.write_str("PROXY_UNREACHABLE"),
            Status::ProxyError => f.write_str("PROXY_ERROR"),
            Status::ClientConnectionError => f.write_str("CLIENT_CONNECTION_ERROR"),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The one-line JSON response envelope. Only proxy responses carry the
/// `cache_hit` and `node` fields.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub status: Status,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<u16>,
}

impl Response {
    /// An origin or balancer response: status and data only.
    pub fn new(status: Status, data: Value) -> Self {
        Self {
            status,
            data,
            cache_hit: None,
            node: None,
        }
    }

    /// A proxy response, stamped with the hit flag and the node port.
    pub fn proxied(status: Status, data: Value, cache_hit: bool, node: u16) -> Self {
        Self {
            status,
            data,
            cache_hit: Some(cache_hit),
            node: Some(node),
        }
    }

    /// Serializes into the newline-terminated wire form.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Reads one request off an accepted connection: a single read of up to
/// [`MAX_REQUEST_BYTES`]. Returns `None` when the peer closed without
/// sending anything.
pub async fn read_request(stream: &mut TcpStream) -> io::Result<Option<Vec<u8>>> {
    let mut buf = [0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(buf[..n].to_vec()))
}

/// Writes a response followed by its trailing newline.
pub async fn write_response(stream: &mut TcpStream, response: &Response) -> io::Result<()> {
    let line = response
        .to_line()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    stream.write_all(line.as_bytes()).await
}

/// Performs a one-shot exchange with a peer: connect, send one request
/// line, read one newline-terminated line back. The connection is closed
/// before returning. Returns the response line with the newline trimmed.
pub async fn exchange(addr: &str, request_line: &str) -> io::Result<String> {
    let stream = TcpStream::connect(addr).await?;
    let (read_half, mut write_half) = stream.into_split();

    write_half.write_all(request_line.as_bytes()).await?;

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed without responding",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
