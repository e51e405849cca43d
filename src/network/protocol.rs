//! RethinkDB Wire Protocol Implementation
//!
//! Implements the JSON driver protocol: the connection handshake, the
//! token-tagged frames and the request/response payload shapes.
//!
//! # Frames
//!
//! Both directions use the same framing:
//!
//! ```text
//! +----------------+----------------+--------------------+
//! | token: u64 LE  | length: u32 LE | JSON payload       |
//! +----------------+----------------+--------------------+
//! ```
//!
//! Requests carry `[query_type, term, {global_optargs}]`; responses carry
//! either `[response_type, result, {response_options}]` or the object form
//! `{"t": response_type, "r": [...], "b": [...], "p": ..., "e": ...}`.

use crate::error::{Error, Result};
use crate::reql::{Datum, ErrorType, QueryType, ResponseType, Term};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Handshake magic of the protocol version this driver speaks
pub const VERSION_V0_4: u32 = 0x400c2d20;

/// Wire encoding magic
pub const PROTOCOL_JSON: u32 = 0x7e6970c7;

/// Acknowledgement the server sends for an accepted handshake.
pub const HANDSHAKE_SUCCESS: &str = "SUCCESS";

/// Size limits
pub const MAX_MESSAGE_SIZE: u32 = 256 * 1024 * 1024; // 256 MB
pub const MAX_AUTH_KEY_SIZE: u32 = 4096;
pub const MAX_ACK_SIZE: usize = 1024;

/// Protocol version negotiated in the handshake.
///
/// V0_4 is the first version whose servers interleave responses of
/// concurrent queries, which the connection's token routing relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V0_4,
}

impl ProtocolVersion {
    pub fn from_magic(magic: u32) -> Result<Self> {
        match magic {
            VERSION_V0_4 => Ok(ProtocolVersion::V0_4),
            _ => Err(Error::Handshake(format!(
                "unsupported protocol version: 0x{:x}",
                magic
            ))),
        }
    }

    pub fn to_magic(self) -> u32 {
        match self {
            ProtocolVersion::V0_4 => VERSION_V0_4,
        }
    }
}

/// Handshake state
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub version: ProtocolVersion,
    pub auth_key: Option<String>,
}

impl Handshake {
    /// Perform client-side handshake.
    ///
    /// Writes version magic, auth key and protocol magic, then reads the
    /// null-terminated acknowledgement. Anything other than `SUCCESS` is
    /// returned as [`Error::Handshake`] carrying the server's text.
    pub async fn connect<T>(
        stream: &mut T,
        auth_key: Option<&str>,
        version: ProtocolVersion,
    ) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let key = auth_key.unwrap_or("");
        if key.len() > MAX_AUTH_KEY_SIZE as usize {
            return Err(Error::Handshake(format!(
                "auth key too long: {} bytes",
                key.len()
            )));
        }

        let mut header = Vec::with_capacity(12 + key.len());
        header.extend_from_slice(&version.to_magic().to_le_bytes());
        header.extend_from_slice(&(key.len() as u32).to_le_bytes());
        header.extend_from_slice(key.as_bytes());
        header.extend_from_slice(&PROTOCOL_JSON.to_le_bytes());
        stream.write_all(&header).await?;
        stream.flush().await?;

        let ack = read_ack(stream).await?;
        if ack != HANDSHAKE_SUCCESS {
            tracing::warn!(ack = %ack, "Server rejected handshake");
            return Err(Error::Handshake(ack));
        }

        tracing::debug!(?version, "Client handshake complete");
        Ok(Handshake {
            version,
            auth_key: auth_key.map(str::to_string),
        })
    }

    /// Read a client's handshake header (server side).
    pub async fn read_request<T>(stream: &mut T) -> Result<Self>
    where
        T: AsyncRead + Unpin,
    {
        let version = ProtocolVersion::from_magic(stream.read_u32_le().await?)?;

        let key_len = stream.read_u32_le().await?;
        if key_len > MAX_AUTH_KEY_SIZE {
            return Err(Error::Handshake(format!("auth key too long: {} bytes", key_len)));
        }
        let mut key_bytes = vec![0u8; key_len as usize];
        stream.read_exact(&mut key_bytes).await?;
        let auth_key = String::from_utf8(key_bytes)
            .map_err(|e| Error::Handshake(format!("auth key is not UTF-8: {}", e)))?;

        let protocol = stream.read_u32_le().await?;
        if protocol != PROTOCOL_JSON {
            return Err(Error::Handshake(format!(
                "unsupported wire protocol: 0x{:x}",
                protocol
            )));
        }

        Ok(Handshake {
            version,
            auth_key: (!auth_key.is_empty()).then_some(auth_key),
        })
    }

    /// Send a null-terminated acknowledgement (server side).
    pub async fn write_ack<T>(stream: &mut T, message: &str) -> Result<()>
    where
        T: AsyncWrite + Unpin,
    {
        stream.write_all(message.as_bytes()).await?;
        stream.write_all(b"\0").await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read a handshake and accept it (server side).
    pub async fn accept<T>(stream: &mut T) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let handshake = Self::read_request(stream).await?;
        Self::write_ack(stream, HANDSHAKE_SUCCESS).await?;
        Ok(handshake)
    }
}

async fn read_ack<T>(stream: &mut T) -> Result<String>
where
    T: AsyncRead + Unpin,
{
    let mut response = Vec::new();
    loop {
        let byte = match stream.read_u8().await {
            Ok(byte) => byte,
            // Some servers close right after a rejection without a terminator.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && !response.is_empty() => break,
            Err(e) => return Err(e.into()),
        };
        if byte == 0 || byte == b'\n' {
            break;
        }
        response.push(byte);
        if response.len() > MAX_ACK_SIZE {
            return Err(Error::Handshake("handshake response too long".to_string()));
        }
    }
    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// Query message with token
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMessage {
    pub token: u64,
    pub query: Value,
}

impl QueryMessage {
    /// START a query: `[1, term, {global_optargs}]`.
    pub fn start(token: u64, term: &Term, global_optargs: &Map<String, Value>) -> Self {
        Self {
            token,
            query: Value::Array(vec![
                Value::from(QueryType::Start.code()),
                term.to_json(),
                Value::Object(global_optargs.clone()),
            ]),
        }
    }

    /// A bare `[query_type]` request (CONTINUE, STOP, NOREPLY_WAIT, SERVER_INFO).
    pub fn control(token: u64, query_type: QueryType) -> Self {
        Self {
            token,
            query: Value::Array(vec![Value::from(query_type.code())]),
        }
    }

    pub fn query_type(&self) -> Option<QueryType> {
        self.query
            .get(0)
            .and_then(Value::as_u64)
            .and_then(|code| QueryType::try_from(code).ok())
    }

    /// The START term, parsed back into a tree.
    pub fn term(&self) -> Result<Option<Term>> {
        self.query.get(1).map(Term::from_json).transpose()
    }
}

/// Response message
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    pub token: u64,
    pub response: Value,
}

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub response_type: ResponseType,
    /// The atom, the array of rows, or the error message.
    pub result: Datum,
    pub backtrace: Option<Datum>,
    pub profile: Option<Datum>,
    pub error_type: Option<ErrorType>,
}

impl Response {
    /// Decode either payload shape.
    pub fn from_json(payload: Value) -> Result<Self> {
        match payload {
            Value::Array(items) => Self::from_array(items),
            Value::Object(obj) => Self::from_object(obj),
            other => Err(Error::Protocol(format!("malformed response payload: {}", other))),
        }
    }

    fn from_array(items: Vec<Value>) -> Result<Self> {
        let mut items = items.into_iter();
        let response_type = parse_response_type(items.next().as_ref())?;
        let result = items.next().unwrap_or(Value::Null);
        let options = match items.next() {
            Some(Value::Object(obj)) => obj,
            _ => Map::new(),
        };

        let result = match response_type {
            ResponseType::SuccessSequence | ResponseType::SuccessPartial => match result {
                Value::Array(_) => Datum::from_json(result),
                other => {
                    return Err(Error::Protocol(format!(
                        "{:?} result must be an array, got {}",
                        response_type, other
                    )))
                }
            },
            t if t.is_error() => Datum::String(error_message(result)),
            _ => Datum::from_json(result),
        };

        Ok(Self::with_options(response_type, result, &options))
    }

    fn from_object(obj: Map<String, Value>) -> Result<Self> {
        let response_type = parse_response_type(obj.get("t"))?;
        let rows = match obj.get("r") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };

        let result = match response_type {
            ResponseType::SuccessSequence | ResponseType::SuccessPartial => {
                Datum::from_json(Value::Array(rows))
            }
            t if t.is_error() => {
                Datum::String(error_message(rows.into_iter().next().unwrap_or(Value::Null)))
            }
            _ => rows
                .into_iter()
                .next()
                .map(Datum::from_json)
                .unwrap_or(Datum::Null),
        };

        Ok(Self::with_options(response_type, result, &obj))
    }

    fn with_options(response_type: ResponseType, result: Datum, options: &Map<String, Value>) -> Self {
        Self {
            response_type,
            result,
            backtrace: options.get("b").cloned().map(Datum::from_json),
            profile: options.get("p").cloned().map(Datum::from_json),
            error_type: options
                .get("e")
                .and_then(Value::as_u64)
                .and_then(ErrorType::from_code),
        }
    }

    /// Convert an error response into the matching [`Error`].
    pub fn into_error(self) -> Option<Error> {
        let message = match &self.result {
            Datum::String(s) => s.clone(),
            other => other.to_string(),
        };
        let trace = self.backtrace;
        match self.response_type {
            ResponseType::ClientError => Some(Error::Client { message, trace }),
            ResponseType::CompileError => Some(Error::Compile { message, trace }),
            ResponseType::RuntimeError => Some(Error::Runtime {
                message,
                trace,
                error_type: self.error_type,
            }),
            _ => None,
        }
    }

    /// Rows of a sequence response.
    pub fn into_rows(self) -> Vec<Datum> {
        match self.result {
            Datum::Array(rows) => rows,
            Datum::Null => Vec::new(),
            other => vec![other],
        }
    }
}

fn parse_response_type(value: Option<&Value>) -> Result<ResponseType> {
    let code = value
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Protocol("response is missing its type".to_string()))?;
    ResponseType::try_from(code)
        .map_err(|code| Error::Protocol(format!("unknown response type: {}", code)))
}

fn error_message(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .next()
            .map(error_message)
            .unwrap_or_default(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn write_frame<T>(stream: &mut T, token: u64, payload: &Value) -> Result<()>
where
    T: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(payload)?;
    if body.len() > MAX_MESSAGE_SIZE as usize {
        return Err(Error::Protocol(format!(
            "Message too large: {} bytes (max: {})",
            body.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    // One buffer, one write: frames of concurrent callers never interleave.
    let mut frame = Vec::with_capacity(12 + body.len());
    frame.extend_from_slice(&token.to_le_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame<T>(stream: &mut T) -> Result<(u64, Value)>
where
    T: AsyncRead + Unpin,
{
    let token = stream.read_u64_le().await?;
    let size = stream.read_u32_le().await?;

    if size > MAX_MESSAGE_SIZE {
        return Err(Error::Protocol(format!(
            "Message too large: {} bytes (max: {})",
            size, MAX_MESSAGE_SIZE
        )));
    }

    let mut buffer = vec![0u8; size as usize];
    stream.read_exact(&mut buffer).await?;
    let payload: Value = serde_json::from_slice(&buffer)?;
    Ok((token, payload))
}

/// Write a query message to the stream (client side)
pub async fn write_query<T>(stream: &mut T, msg: &QueryMessage) -> Result<()>
where
    T: AsyncWrite + Unpin,
{
    write_frame(stream, msg.token, &msg.query).await
}

/// Read a response message from the stream (client side)
pub async fn read_response<T>(stream: &mut T) -> Result<ResponseMessage>
where
    T: AsyncRead + Unpin,
{
    let (token, response) = read_frame(stream).await?;
    Ok(ResponseMessage { token, response })
}

/// Read a query message from the stream (server side)
pub async fn read_query<T>(stream: &mut T) -> Result<QueryMessage>
where
    T: AsyncRead + Unpin,
{
    let (token, query) = read_frame(stream).await?;
    Ok(QueryMessage { token, query })
}

/// Write a response message to the stream (server side)
pub async fn write_response<T>(stream: &mut T, msg: &ResponseMessage) -> Result<()>
where
    T: AsyncWrite + Unpin,
{
    write_frame(stream, msg.token, &msg.response).await
}
