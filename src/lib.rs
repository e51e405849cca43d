// RethinkDB - Rust client driver
// Fluent ReQL query building over the JSON driver protocol

#![warn(rust_2018_idioms)]

//! Build ReQL queries with chained calls and run them over a connection.
//!
//! ```rust,ignore
//! use rethinkdb_client::{r, Connection, ConnectionConfig, QueryResult};
//!
//! let conn = Connection::connect(ConnectionConfig::new("localhost", 28015).with_db("test")).await?;
//!
//! let adults = r::table("users").filter(|row| row.get_field("age").gt(18));
//! match adults.run(&conn).await? {
//!     QueryResult::Cursor(mut cursor) => {
//!         while let Some(user) = cursor.next().await? {
//!             println!("{}", user);
//!         }
//!     }
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod network;
pub mod reql;

// Re-exports for convenience
pub use network::{Connection, ConnectionConfig, Cursor, QueryResult, RunOptions};
pub use reql::{r, Datum, Term, TermType};

/// Driver error types
pub mod error {
    use crate::reql::{Datum, ErrorType};
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Handshake failed: {0}")]
        Handshake(String),

        #[error("Unsupported type: {0}")]
        UnsupportedType(String),

        #[error("Client error: {message}")]
        Client {
            message: String,
            trace: Option<Datum>,
        },

        #[error("Compile error: {message}")]
        Compile {
            message: String,
            trace: Option<Datum>,
        },

        #[error("Runtime error: {message}")]
        Runtime {
            message: String,
            trace: Option<Datum>,
            error_type: Option<ErrorType>,
        },

        #[error("Connection closed")]
        ConnectionClosed,

        #[error("Protocol error: {0}")]
        Protocol(String),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Serialization error: {0}")]
        Serialization(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Timeout")]
        Timeout,
    }

    impl Error {
        /// Errors reported by the server for one query; the connection stays usable.
        pub fn is_query_error(&self) -> bool {
            matches!(
                self,
                Error::Client { .. } | Error::Compile { .. } | Error::Runtime { .. }
            )
        }
    }

    impl From<serde_json::Error> for Error {
        fn from(e: serde_json::Error) -> Self {
            Self::Serialization(e.to_string())
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

pub use error::{Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::Handshake("ERROR: bad auth".to_string()).to_string(),
            "Handshake failed: ERROR: bad auth"
        );
        assert_eq!(Error::ConnectionClosed.to_string(), "Connection closed");

        let err = Error::Runtime {
            message: "Table `x` does not exist.".to_string(),
            trace: None,
            error_type: None,
        };
        assert_eq!(err.to_string(), "Runtime error: Table `x` does not exist.");
        assert!(err.is_query_error());
        assert!(!Error::Timeout.is_query_error());
    }
}
