//! The collect dispatch protocol

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::error::Result;
use crate::payload::Payload;

use super::http::HttpTransport;
use super::transport::{Connection, ConnectionGuard, Request, ResponseHeaders, Transport};

/// Name reported as `dispatch_service` in every [`DispatchInfo`]
pub const DISPATCH_SERVICE: &str = "collect";

const X_ERROR: &str = "x-error";
const JSON_UTF8: &str = "application/json; charset=UTF-8";

/// Why a dispatch failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The payload could not be encoded; nothing was sent
    #[error("dispatch failed because of payload serialization error: {0}")]
    Serialization(String),

    /// The endpoint is malformed or a connection could not be constructed
    #[error("dispatch failed because connection could not be set up: {0}")]
    ConnectionSetup(String),

    /// Sending the request body failed
    #[error("could not send payload to server: {0}")]
    Transmission(String),

    /// Waiting for the response status failed
    #[error("could not get response from server: {0}")]
    Response(String),

    /// The server set an `x-error` header
    #[error("server reported error (status {status}): {message}")]
    ServerReported { status: u16, message: String },

    /// The server answered with something other than 200
    #[error("unexpected response code received: {status}")]
    UnexpectedStatus { status: u16 },
}

impl DispatchError {
    /// Hard stops happen before any request is attempted and are returned to
    /// the caller as well as reported to the callback.
    pub fn is_hard_stop(&self) -> bool {
        matches!(
            self,
            DispatchError::Serialization(_) | DispatchError::ConnectionSetup(_)
        )
    }

    /// Response status, when the failure came after a response
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::ServerReported { status, .. }
            | DispatchError::UnexpectedStatus { status } => Some(*status),
            _ => None,
        }
    }
}

/// Diagnostics handed to the callback alongside the success flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchInfo {
    pub dispatch_service: &'static str,
    /// The request target, once a connection was attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Present whenever a response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<ResponseHeaders>,
}

/// Receives the result of a dispatch
///
/// `error` is `None` exactly when `success` is true. Closures taking
/// `(bool, &DispatchInfo, Option<&str>)` implement this trait.
pub trait DispatchCallback {
    fn dispatch_complete(&self, success: bool, info: &DispatchInfo, error: Option<&str>);
}

impl<F> DispatchCallback for F
where
    F: Fn(bool, &DispatchInfo, Option<&str>),
{
    fn dispatch_complete(&self, success: bool, info: &DispatchInfo, error: Option<&str>) {
        self(success, info, error)
    }
}

/// Sends payloads to one fixed endpoint
pub struct Dispatcher<T = HttpTransport> {
    endpoint: String,
    timeout: Duration,
    transport: T,
    encode: fn(&Payload) -> Result<String>,
}

impl Dispatcher<HttpTransport> {
    /// Create a dispatcher that talks HTTP
    ///
    /// `endpoint` should not carry a query string. Dispatching blocks the
    /// calling thread. Called from inside a tokio runtime, every dispatch
    /// fails with [`DispatchError::ConnectionSetup`] instead; hand it to
    /// `spawn_blocking` there.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self::with_transport(endpoint, timeout, HttpTransport::new()?))
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn with_transport(endpoint: impl Into<String>, timeout: Duration, transport: T) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            transport,
            encode: Payload::to_json,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POST `payload` to the endpoint and report the outcome to `callback`
    ///
    /// Blocks for at most the configured timeout. Returns an error only for
    /// hard stops; every outcome, hard or soft, reaches the callback once.
    pub fn dispatch(
        &self,
        payload: &Payload,
        callback: Option<&dyn DispatchCallback>,
    ) -> std::result::Result<(), DispatchError> {
        let body = match (self.encode)(payload) {
            Ok(body) => body,
            Err(e) => {
                let message = match e {
                    crate::error::Error::Serialization(message) => message,
                    other => other.to_string(),
                };
                let err = DispatchError::Serialization(message);
                self.report(callback, payload, false, None, Some(&err));
                return Err(err);
            }
        };

        let connection = match self.transport.open(&self.request()) {
            Ok(connection) => connection,
            Err(e) => {
                let err = DispatchError::ConnectionSetup(e.to_string());
                self.report(callback, payload, true, None, Some(&err));
                return Err(err);
            }
        };

        let (headers, result) = {
            let mut connection = ConnectionGuard::new(connection);
            exchange(&mut *connection, body.as_bytes())
        };

        self.report(callback, payload, true, headers, result.as_ref().err());
        Ok(())
    }

    fn request(&self) -> Request {
        Request {
            url: self.endpoint.clone(),
            method: "POST",
            headers: vec![("Content-Type", JSON_UTF8), ("Accept", JSON_UTF8)],
            timeout: self.timeout,
        }
    }

    fn report(
        &self,
        callback: Option<&dyn DispatchCallback>,
        payload: &Payload,
        with_url: bool,
        response_headers: Option<ResponseHeaders>,
        error: Option<&DispatchError>,
    ) {
        match error {
            None => tracing::debug!(endpoint = %self.endpoint, "Dispatch succeeded"),
            Some(e) => tracing::warn!(
                endpoint = %self.endpoint,
                hard_stop = e.is_hard_stop(),
                error = %e,
                "Dispatch failed"
            ),
        }

        let Some(callback) = callback else {
            return;
        };

        let info = DispatchInfo {
            dispatch_service: DISPATCH_SERVICE,
            encoded_url: with_url.then(|| self.endpoint.clone()),
            payload: Some(payload.clone()),
            response_headers,
        };
        let message = error.map(ToString::to_string);
        callback.dispatch_complete(error.is_none(), &info, message.as_deref());
    }

    #[cfg(test)]
    fn with_encoder(mut self, encode: fn(&Payload) -> Result<String>) -> Self {
        self.encode = encode;
        self
    }
}

/// Send the body and classify the response
fn exchange<C: Connection>(
    connection: &mut C,
    body: &[u8],
) -> (Option<ResponseHeaders>, std::result::Result<(), DispatchError>) {
    if let Err(e) = connection.write_body(body) {
        return (None, Err(DispatchError::Transmission(e.to_string())));
    }

    let response = match connection.read_response() {
        Ok(response) => response,
        Err(e) => return (None, Err(DispatchError::Response(e.to_string()))),
    };

    // An x-error header is authoritative whatever the status says
    let result = if let Some(message) = response.header(X_ERROR) {
        Err(DispatchError::ServerReported {
            status: response.status,
            message: message.to_string(),
        })
    } else if response.status != 200 {
        Err(DispatchError::UnexpectedStatus {
            status: response.status,
        })
    } else {
        Ok(())
    };

    (Some(response.headers), result)
}
