//! Lazy consumer of a multi-batch query result.

use super::connection::Connection;
use crate::error::{Error, Result};
use crate::reql::{Datum, ResponseType};
use std::collections::VecDeque;

/// Rows of a query whose first response was SUCCESS_PARTIAL.
///
/// Batches are pulled with CONTINUE on the query's token whenever the local
/// buffer runs dry. A SUCCESS_SEQUENCE response carries the final batch, after
/// which `next` keeps returning `None` without touching the network.
#[derive(Debug)]
pub struct Cursor {
    conn: Connection,
    token: u64,
    buffer: VecDeque<Datum>,
    exhausted: bool,
}

impl Cursor {
    pub(crate) fn new(conn: Connection, token: u64, first_batch: Vec<Datum>) -> Self {
        Self {
            conn,
            token,
            buffer: first_batch.into(),
            exhausted: false,
        }
    }

    /// Query token this cursor continues.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// True once the server has sent the final batch or the cursor was stopped.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Rows already received and not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next row, or `None` at the end of the sequence.
    pub async fn next(&mut self) -> Result<Option<Datum>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_batch().await?;
        }
    }

    async fn fetch_batch(&mut self) -> Result<()> {
        let response = match self.conn.continue_query(self.token).await {
            Ok(response) => response,
            Err(e) => {
                // The server forgets a token once it reports an error for it.
                if e.is_query_error() {
                    self.exhausted = true;
                }
                return Err(e);
            }
        };
        match response.response_type {
            ResponseType::SuccessSequence => self.exhausted = true,
            ResponseType::SuccessPartial => {}
            ResponseType::SuccessAtom => {
                self.exhausted = true;
                self.buffer.push_back(response.result);
                return Ok(());
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected response type for CONTINUE: {:?}",
                    other
                )))
            }
        }
        tracing::debug!(
            token = self.token,
            exhausted = self.exhausted,
            "Fetched cursor batch"
        );
        self.buffer.extend(response.into_rows());
        Ok(())
    }

    /// Abandon the remaining rows.
    ///
    /// Sends STOP unless the sequence is already complete; buffered rows are
    /// dropped. Calling it again does nothing.
    pub async fn stop(&mut self) -> Result<()> {
        self.buffer.clear();
        if self.exhausted {
            return Ok(());
        }
        self.exhausted = true;
        self.conn.stop_query(self.token).await
    }

    /// Drain every remaining row into a vector.
    pub async fn collect_all(mut self) -> Result<Vec<Datum>> {
        let mut rows = Vec::with_capacity(self.buffer.len());
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.exhausted {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let conn = self.conn.clone();
        let token = self.token;
        handle.spawn(async move {
            if let Err(e) = conn.stop_query(token).await {
                tracing::debug!(token, error = %e, "STOP for dropped cursor failed");
            }
        });
    }
}
