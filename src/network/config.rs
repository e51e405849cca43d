//! Connection descriptor.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default driver port of the server.
pub const DEFAULT_PORT: u16 = 28015;

/// Everything needed to open a connection.
///
/// Can be built in code or read from a TOML document, with the
/// `RETHINKDB_*` environment variables layered on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host name or address
    pub host: String,

    /// Server driver port
    pub port: u16,

    /// Authentication key sent in the handshake
    pub auth_key: Option<String>,

    /// Database used by queries that do not name one
    pub db: Option<String>,

    /// Limit for TCP connect plus handshake, in milliseconds
    pub timeout_ms: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            auth_key: None,
            db: None,
            timeout_ms: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_auth_key(mut self, key: impl Into<String>) -> Self {
        self.auth_key = Some(key.into());
        self
    }

    pub fn with_db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Override fields from `RETHINKDB_HOST`, `RETHINKDB_PORT`,
    /// `RETHINKDB_AUTH_KEY` and `RETHINKDB_DB` where they are set.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = lookup("RETHINKDB_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("RETHINKDB_PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid RETHINKDB_PORT: {}", port)))?;
        }
        if let Some(key) = lookup("RETHINKDB_AUTH_KEY") {
            self.auth_key = Some(key);
        }
        if let Some(db) = lookup("RETHINKDB_DB") {
            self.db = Some(db);
        }
        Ok(self)
    }
}
