//! A small blocking pool of SQLite connections
//!
//! Idle connections sit in a bounded channel. A worker checks one out for a
//! unit of work and dropping the guard sends it back. A checkout that waits
//! longer than the pool's timeout fails instead of blocking forever, which
//! is what a nested checkout on a one-connection pool would otherwise do.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rusqlite::Connection;
use thiserror::Error;

/// Default time a checkout waits for an idle connection
pub const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no idle connection after {0:?} (pool of {1})")]
    CheckoutTimeout(Duration, usize),
    #[error("connection pool is closed")]
    Closed,
}

pub struct ConnectionPool {
    idle: Receiver<Connection>,
    returned: Sender<Connection>,
    size: usize,
    timeout: Duration,
}

impl ConnectionPool {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self::with_timeout(connections, CHECKOUT_TIMEOUT)
    }

    pub fn with_timeout(connections: Vec<Connection>, timeout: Duration) -> Self {
        let size = connections.len();
        let (returned, idle) = crossbeam_channel::bounded(size.max(1));
        for conn in connections {
            // Capacity matches the pool and the receiver is held, so this
            // never blocks or fails
            let _ = returned.send(conn);
        }
        Self {
            idle,
            returned,
            size,
            timeout,
        }
    }

    /// Number of connections owned by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check out a connection, waiting up to the pool's timeout for one
    pub fn get(&self) -> Result<PooledConnection<'_>, StoreError> {
        match self.idle.recv_timeout(self.timeout) {
            Ok(conn) => Ok(PooledConnection {
                pool: self,
                conn: Some(conn),
            }),
            Err(RecvTimeoutError::Timeout) => {
                Err(StoreError::CheckoutTimeout(self.timeout, self.size))
            }
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Closed),
        }
    }

    fn release(&self, conn: Connection) {
        let _ = self.returned.send(conn);
    }
}

/// A connection checked out of a [`ConnectionPool`]
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection is only taken on drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection is only taken on drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
