//! The connection seam between the dispatcher and the network
//!
//! A [`Transport`] opens one [`Connection`] per dispatch. The connection
//! sends the body, then yields the response status and headers. Keeping the
//! two steps separate lets the dispatcher tell a failed send apart from a
//! failed wait for the response.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

/// Response headers, names lowercased. When a header repeats, the last value
/// wins.
pub type ResponseHeaders = BTreeMap<String, String>;

/// Everything a transport needs to open a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub method: &'static str,
    pub headers: Vec<(&'static str, &'static str)>,
    /// Upper bound on blocking time for sending and awaiting the response
    pub timeout: Duration,
}

/// Status and headers of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: ResponseHeaders,
}

impl Response {
    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A transport-level failure, carrying a human-readable description
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest keeps the useful part (refused, timed out, dns) in the source chain
        use std::error::Error as _;

        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(message)
    }
}

/// Opens connections to an endpoint
pub trait Transport {
    type Connection: Connection;

    /// Prepare a connection for `request`
    ///
    /// Fails when the URL is malformed, its scheme is unsupported, or the
    /// connection can't be constructed. No data has been sent at this point.
    fn open(&self, request: &Request) -> Result<Self::Connection, TransportError>;
}

/// One request/response exchange
pub trait Connection {
    /// Send the request body
    fn write_body(&mut self, body: &[u8]) -> Result<(), TransportError>;

    /// Wait for the response status and headers
    fn read_response(&mut self) -> Result<Response, TransportError>;

    /// Release the connection. Called exactly once, on every exit path.
    fn disconnect(&mut self);
}

/// Disconnects the wrapped connection when dropped
pub(crate) struct ConnectionGuard<C: Connection> {
    connection: C,
}

impl<C: Connection> ConnectionGuard<C> {
    pub(crate) fn new(connection: C) -> Self {
        Self { connection }
    }
}

impl<C: Connection> std::ops::Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C: Connection> std::ops::DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connection
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}
