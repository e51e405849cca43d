//! Network protocol handling
//!
//! This module implements the client side of the RethinkDB JSON driver
//! protocol over TCP.
//!
//! ## Protocol Flow
//!
//! 1. **Handshake**: Client sends version, auth key, and protocol type
//! 2. **Query/Response Loop**: Client sends token-tagged queries, a reader
//!    task routes each response frame to the caller waiting on its token
//! 3. **Cursors**: Partial results are continued or stopped by token
//!
//! ## Features
//!
//! - V0_4 handshake with JSON wire protocol
//! - Multiple outstanding queries on one connection
//! - Noreply queries, NOREPLY_WAIT and SERVER_INFO
//! - Configuration from code, TOML or environment

pub mod config;
pub mod connection;
pub mod cursor;
pub mod protocol;

pub use config::{ConnectionConfig, DEFAULT_PORT};
pub use connection::{Connection, QueryResult, RunOptions};
pub use cursor::Cursor;
pub use protocol::{
    Handshake, ProtocolVersion, QueryMessage, Response, ResponseMessage, PROTOCOL_JSON,
    VERSION_V0_4,
};
