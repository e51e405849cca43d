//! Client connection for the RethinkDB protocol.
//!
//! Handles the complete lifecycle of a driver connection:
//!
//! 1. **Handshake**: protocol version and authentication key
//! 2. **Query Loop**: tokens are allocated per query, frames are queued to a
//!    writer task that always writes them whole, and a reader task hands each
//!    response frame to the caller waiting on its token
//! 3. **Shutdown**: `close()` or a dropped transport fails every waiter with
//!    `ConnectionClosed`
//!
//! # Query Types
//!
//! - **START**: Execute a new query
//! - **CONTINUE**: Fetch more results for a cursor
//! - **STOP**: Abandon a cursor
//! - **NOREPLY_WAIT**: Wait for all noreply queries to complete
//! - **SERVER_INFO**: Get server information
//!
//! # Architecture
//!
//! ```text
//! run() ──► token ──► waiter table ──► mpsc ──► writer task ──► server
//!                          ▲                                        │
//!                          └──────── reader task ◄──── frame ◄──────┘
//! ```

use super::config::ConnectionConfig;
use super::cursor::Cursor;
use super::protocol::{
    read_response, write_query, Handshake, ProtocolVersion, QueryMessage, Response,
    ResponseMessage,
};
use crate::error::{Error, Result};
use crate::reql::{Datum, QueryType, ResponseType, Term};
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Waiter = oneshot::Sender<Result<Response>>;

/// Frames waiting for the writer task.
const WRITE_QUEUE_CAPACITY: usize = 256;

/// Per-run options, sent as the START query's global optargs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Database for unqualified `table()` calls; overrides the connection default
    pub db: Option<String>,
    /// Do not wait for a response
    pub noreply: bool,
    /// "hard" or "soft"
    pub durability: Option<String>,
    /// "single", "majority" or "outdated"
    pub read_mode: Option<String>,
    /// Ask the server for a query profile
    pub profile: bool,
    pub array_limit: Option<u64>,
    /// "native" or "raw"; raw leaves TIME pseudo types undecoded
    pub time_format: Option<String>,
    pub binary_format: Option<String>,
    pub group_format: Option<String>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    pub fn noreply(mut self, noreply: bool) -> Self {
        self.noreply = noreply;
        self
    }

    pub fn durability(mut self, durability: impl Into<String>) -> Self {
        self.durability = Some(durability.into());
        self
    }

    pub fn read_mode(mut self, mode: impl Into<String>) -> Self {
        self.read_mode = Some(mode.into());
        self
    }

    pub fn profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn array_limit(mut self, limit: u64) -> Self {
        self.array_limit = Some(limit);
        self
    }

    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Some(format.into());
        self
    }

    pub fn binary_format(mut self, format: impl Into<String>) -> Self {
        self.binary_format = Some(format.into());
        self
    }

    pub fn group_format(mut self, format: impl Into<String>) -> Self {
        self.group_format = Some(format.into());
        self
    }

    fn to_optargs(&self, default_db: Option<&str>) -> Map<String, Value> {
        let mut optargs = Map::new();
        if let Some(db) = self.db.as_deref().or(default_db) {
            optargs.insert("db".to_string(), Term::db(db).to_json());
        }
        if self.noreply {
            optargs.insert("noreply".to_string(), Value::Bool(true));
        }
        if let Some(durability) = &self.durability {
            optargs.insert("durability".to_string(), Value::from(durability.as_str()));
        }
        if let Some(mode) = &self.read_mode {
            optargs.insert("read_mode".to_string(), Value::from(mode.as_str()));
        }
        if self.profile {
            optargs.insert("profile".to_string(), Value::Bool(true));
        }
        if let Some(limit) = self.array_limit {
            optargs.insert("array_limit".to_string(), Value::from(limit));
        }
        let formats = [
            ("time_format", &self.time_format),
            ("binary_format", &self.binary_format),
            ("group_format", &self.group_format),
        ];
        for (key, format) in formats {
            if let Some(format) = format {
                optargs.insert(key.to_string(), Value::from(format.as_str()));
            }
        }
        optargs
    }
}

/// Outcome of a `run`.
#[derive(Debug)]
pub enum QueryResult {
    /// SUCCESS_ATOM: a single value
    Atom(Datum),
    /// SUCCESS_SEQUENCE: every row, no continuation
    Sequence(Vec<Datum>),
    /// SUCCESS_PARTIAL: the first batch; more are fetched on demand
    Cursor(Cursor),
    /// noreply runs and WAIT_COMPLETE
    Empty,
}

impl QueryResult {
    pub fn into_atom(self) -> Option<Datum> {
        match self {
            QueryResult::Atom(datum) => Some(datum),
            _ => None,
        }
    }

    /// Every row, draining a cursor if needed. An atom is returned as-is
    /// when it is an array and as a one-element list otherwise.
    pub async fn into_vec(self) -> Result<Vec<Datum>> {
        match self {
            QueryResult::Atom(Datum::Array(rows)) => Ok(rows),
            QueryResult::Atom(datum) => Ok(vec![datum]),
            QueryResult::Sequence(rows) => Ok(rows),
            QueryResult::Cursor(cursor) => cursor.collect_all().await,
            QueryResult::Empty => Ok(Vec::new()),
        }
    }
}

/// State shared with the reader task.
#[derive(Default)]
struct Waiters {
    pending: SyncMutex<HashMap<u64, Waiter>>,
    closed: AtomicBool,
}

impl Waiters {
    /// Register a waiter; refused once closed or while the token is in use.
    fn register(&self, token: u64) -> Result<oneshot::Receiver<Result<Response>>> {
        let mut pending = self.pending.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        if pending.contains_key(&token) {
            return Err(Error::Protocol(format!("token {} already outstanding", token)));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(token, tx);
        Ok(rx)
    }

    fn remove(&self, token: u64) -> Option<Waiter> {
        self.pending.lock().remove(&token)
    }

    fn dispatch(&self, msg: ResponseMessage) {
        let Some(waiter) = self.remove(msg.token) else {
            tracing::warn!(token = msg.token, "Discarding response for token with no waiter");
            return;
        };
        let response = Response::from_json(msg.response);
        tracing::debug!(
            token = msg.token,
            response_type = ?response.as_ref().map(|r| r.response_type).ok(),
            "Received response"
        );
        // The caller may have given up; nothing to do then.
        let _ = waiter.send(response);
    }

    fn fail_all(&self) {
        let drained: Vec<Waiter> = {
            let mut pending = self.pending.lock();
            self.closed.store(true, Ordering::SeqCst);
            pending.drain().map(|(_, waiter)| waiter).collect()
        };
        for waiter in drained {
            let _ = waiter.send(Err(Error::ConnectionClosed));
        }
    }
}

/// Deregisters a token when its request finishes or is dropped mid-flight.
struct PendingGuard<'a> {
    waiters: &'a Waiters,
    token: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.waiters.remove(self.token);
    }
}

/// Work for the writer task.
enum Outbound {
    Frame {
        query: QueryMessage,
        written: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

struct Inner {
    handshake: Handshake,
    outbound: mpsc::Sender<Outbound>,
    waiters: Arc<Waiters>,
    next_token: AtomicU64,
    default_db: RwLock<Option<String>>,
    reader: SyncMutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

/// A connection to the server. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("version", &self.inner.handshake.version)
            .field("db", &*self.inner.default_db.read())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Open a TCP connection and perform the handshake.
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let addr = config.addr();
        let connect = async {
            let stream = TcpStream::connect(&addr).await?;
            stream.set_nodelay(true)?;
            Ok::<_, Error>(stream)
        };
        let stream = match config.timeout() {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| Error::Timeout)??,
            None => connect.await?,
        };
        tracing::debug!(%addr, "TCP connection established");
        Self::from_stream(stream, config).await
    }

    /// Perform the handshake over an already open transport.
    pub async fn from_stream<S>(mut stream: S, config: ConnectionConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let auth_key = config.auth_key.as_deref();
        let handshake = Handshake::connect(&mut stream, auth_key, ProtocolVersion::V0_4);
        let handshake = match config.timeout() {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| Error::Timeout)??,
            None => handshake.await?,
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let waiters = Arc::new(Waiters::default());
        let reader = tokio::spawn(reader_loop(read_half, waiters.clone()));
        let (outbound, queue) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        tokio::spawn(writer_loop(queue, write_half));

        tracing::info!(
            addr = %config.addr(),
            db = ?config.db,
            "Connection established"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                handshake,
                outbound,
                waiters,
                next_token: AtomicU64::new(1),
                default_db: RwLock::new(config.db),
                reader: SyncMutex::new(Some(reader)),
            }),
        })
    }

    /// Get protocol version
    pub fn version(&self) -> ProtocolVersion {
        self.inner.handshake.version
    }

    /// Database used when a query names none.
    pub fn db(&self) -> Option<String> {
        self.inner.default_db.read().clone()
    }

    /// Change the default database.
    pub fn use_db(&self, db: impl Into<String>) {
        *self.inner.default_db.write() = Some(db.into());
    }

    pub fn is_closed(&self) -> bool {
        self.inner.waiters.closed.load(Ordering::SeqCst)
    }

    fn next_token(&self) -> u64 {
        self.inner.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Run a query with default options.
    pub async fn run(&self, term: &Term) -> Result<QueryResult> {
        self.run_with(term, &RunOptions::default()).await
    }

    /// Run a query.
    ///
    /// Resolves to an atom, a complete sequence or a [`Cursor`] depending on
    /// the first response; server-reported failures become
    /// [`Error::Client`], [`Error::Compile`] or [`Error::Runtime`].
    pub async fn run_with(&self, term: &Term, options: &RunOptions) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let token = self.next_token();
        let default_db = self.db();
        let query = QueryMessage::start(token, term, &options.to_optargs(default_db.as_deref()));

        if options.noreply {
            self.send(query).await?;
            return Ok(QueryResult::Empty);
        }

        let response = self.request(query).await?;
        match response.response_type {
            ResponseType::SuccessAtom | ResponseType::ServerInfo => {
                Ok(QueryResult::Atom(response.result))
            }
            ResponseType::SuccessSequence => Ok(QueryResult::Sequence(response.into_rows())),
            ResponseType::SuccessPartial => Ok(QueryResult::Cursor(Cursor::new(
                self.clone(),
                token,
                response.into_rows(),
            ))),
            ResponseType::WaitComplete => Ok(QueryResult::Empty),
            _ => Err(unexpected(response)),
        }
    }

    /// Wait until every noreply query sent so far has been processed.
    pub async fn noreply_wait(&self) -> Result<()> {
        let token = self.next_token();
        let response = self
            .request(QueryMessage::control(token, QueryType::NoreplyWait))
            .await?;
        match response.response_type {
            ResponseType::WaitComplete => Ok(()),
            _ => Err(unexpected(response)),
        }
    }

    /// Ask the server to describe itself.
    pub async fn server_info(&self) -> Result<Datum> {
        let token = self.next_token();
        let response = self
            .request(QueryMessage::control(token, QueryType::ServerInfo))
            .await?;
        match response.response_type {
            ResponseType::ServerInfo | ResponseType::SuccessAtom => Ok(response.result),
            _ => Err(unexpected(response)),
        }
    }

    /// Fetch the next batch of a cursor.
    pub(crate) async fn continue_query(&self, token: u64) -> Result<Response> {
        self.request(QueryMessage::control(token, QueryType::Continue))
            .await
    }

    /// Abandon a cursor. Any response still on its way is discarded.
    pub(crate) async fn stop_query(&self, token: u64) -> Result<()> {
        self.inner.waiters.remove(token);
        if self.is_closed() {
            return Ok(());
        }
        self.send(QueryMessage::control(token, QueryType::Stop)).await
    }

    /// Send a query and wait for the response to its token.
    ///
    /// Dropping the future before the response arrives forgets the token, so
    /// a late response is discarded by the reader.
    async fn request(&self, query: QueryMessage) -> Result<Response> {
        let token = query.token;
        let rx = self.inner.waiters.register(token)?;
        let _pending = PendingGuard {
            waiters: &self.inner.waiters,
            token,
        };

        self.send(query).await?;

        let response = rx.await.map_err(|_| Error::ConnectionClosed)??;
        if response.response_type.is_error() {
            return Err(unexpected(response));
        }
        Ok(response)
    }

    /// Queue a frame and wait until it is on the wire.
    ///
    /// The writer task owns the write, so cancelling this future never
    /// leaves half a frame on the transport.
    async fn send(&self, query: QueryMessage) -> Result<()> {
        let (written, done) = oneshot::channel();
        self.inner
            .outbound
            .send(Outbound::Frame { query, written })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        done.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Close the connection.
    ///
    /// No further frames are sent; every outstanding query fails with
    /// [`Error::ConnectionClosed`] and later `run` calls fail the same way.
    pub async fn close(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.inner.waiters.fail_all();
        let reader = self.inner.reader.lock().take();
        if let Some(reader) = reader {
            reader.abort();
        }
        let (done, shut) = oneshot::channel();
        if self.inner.outbound.send(Outbound::Shutdown { done }).await.is_ok() {
            let _ = shut.await;
        }
        tracing::info!("Connection closed");
        Ok(())
    }
}

/// Error responses become their error kind; anything else is a protocol violation.
fn unexpected(response: Response) -> Error {
    let response_type = response.response_type;
    response.into_error().unwrap_or_else(|| {
        Error::Protocol(format!("unexpected response type: {:?}", response_type))
    })
}

async fn reader_loop<R>(mut reader: ReadHalf<R>, waiters: Arc<Waiters>)
where
    R: AsyncRead + Send + Unpin,
{
    loop {
        match read_response(&mut reader).await {
            Ok(msg) => waiters.dispatch(msg),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::info!("Server closed the connection");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read response");
                break;
            }
        }
    }
    waiters.fail_all();
}

async fn writer_loop<W>(mut queue: mpsc::Receiver<Outbound>, mut writer: W)
where
    W: AsyncWrite + Send + Unpin,
{
    while let Some(outbound) = queue.recv().await {
        match outbound {
            Outbound::Frame { query, written } => {
                tracing::debug!(
                    token = query.token,
                    query_type = query.query_type().map(|t| t.name()).unwrap_or("?"),
                    "Sending query"
                );
                let result = write_query(&mut writer, &query).await;
                if let Err(e) = &result {
                    tracing::error!(token = query.token, error = %e, "Failed to write query");
                }
                // The caller may have given up; the frame went out regardless.
                let _ = written.send(result);
            }
            Outbound::Shutdown { done } => {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!(error = %e, "Transport shutdown failed");
                }
                let _ = done.send(());
                return;
            }
        }
    }
}

impl Term {
    /// Run this query on `conn`.
    pub async fn run(&self, conn: &Connection) -> Result<QueryResult> {
        conn.run(self).await
    }

    /// Run this query on `conn` with options.
    pub async fn run_with(&self, conn: &Connection, options: &RunOptions) -> Result<QueryResult> {
        conn.run_with(self, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_options_optargs() {
        let optargs = RunOptions::new()
            .durability("soft")
            .profile(true)
            .to_optargs(Some("blog"));
        assert_eq!(optargs["db"], json!([14, ["blog"]]));
        assert_eq!(optargs["durability"], json!("soft"));
        assert_eq!(optargs["profile"], json!(true));
        assert!(!optargs.contains_key("noreply"));

        let optargs = RunOptions::new().db("other").to_optargs(Some("blog"));
        assert_eq!(optargs["db"], json!([14, ["other"]]));

        assert!(RunOptions::new().to_optargs(None).is_empty());
    }

    #[test]
    fn test_waiters_refuse_duplicate_token() {
        let waiters = Waiters::default();
        let _rx = waiters.register(1).unwrap();
        assert!(matches!(waiters.register(1), Err(Error::Protocol(_))));
        assert!(waiters.register(2).is_ok());
    }

    #[tokio::test]
    async fn test_waiters_fail_all() {
        let waiters = Waiters::default();
        let rx = waiters.register(5).unwrap();
        waiters.fail_all();
        assert!(matches!(rx.await.unwrap(), Err(Error::ConnectionClosed)));
        assert!(matches!(waiters.register(6), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_pending_guard_forgets_token() {
        let waiters = Waiters::default();
        let rx = waiters.register(3).unwrap();
        drop(PendingGuard {
            waiters: &waiters,
            token: 3,
        });
        assert!(waiters.pending.lock().is_empty());
        drop(rx);
        // The token can be reused once forgotten.
        assert!(waiters.register(3).is_ok());
    }

    #[tokio::test]
    async fn test_writer_loop_writes_whole_frames() {
        let (client, mut server) = tokio::io::duplex(64);
        let (outbound, queue) = mpsc::channel(4);
        tokio::spawn(writer_loop(queue, client));

        let big = Term::datum(Datum::from("x".repeat(1024)));
        let (written, done) = oneshot::channel();
        let query = QueryMessage::start(7, &big, &Map::new());
        outbound
            .send(Outbound::Frame { query: query.clone(), written })
            .await
            .unwrap();
        // Nobody waits for the acknowledgement.
        drop(done);

        let received = crate::network::protocol::read_query(&mut server).await.unwrap();
        assert_eq!(received, query);
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_token() {
        let waiters = Waiters::default();
        let rx1 = waiters.register(1).unwrap();
        let rx2 = waiters.register(2).unwrap();

        waiters.dispatch(ResponseMessage { token: 2, response: json!([1, "two", {}]) });
        waiters.dispatch(ResponseMessage { token: 1, response: json!([1, "one", {}]) });
        // No waiter: dropped quietly.
        waiters.dispatch(ResponseMessage { token: 9, response: json!([1, "late", {}]) });

        assert_eq!(rx1.await.unwrap().unwrap().result, Datum::from("one"));
        assert_eq!(rx2.await.unwrap().unwrap().result, Datum::from("two"));
    }
}
