//! HTTP transport backed by reqwest
//!
//! The async client is driven by a private current-thread tokio runtime, so
//! every call blocks the calling thread. Opening a connection from inside
//! another tokio runtime fails rather than blocking that runtime's worker.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use tokio::runtime::Runtime;

use crate::error::{Error, Result};

use super::transport::{Connection, Request, Response, ResponseHeaders, Transport, TransportError};

/// Blocking HTTP transport
pub struct HttpTransport {
    runtime: Arc<Runtime>,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl Transport for HttpTransport {
    type Connection = HttpConnection;

    fn open(&self, request: &Request) -> std::result::Result<HttpConnection, TransportError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(TransportError::new(
                "cannot block inside an async runtime, dispatch from a blocking thread",
            ));
        }

        let url = Url::parse(&request.url)
            .map_err(|e| TransportError::new(format!("malformed url {:?}: {}", request.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::new(format!(
                "unsupported protocol {:?}",
                url.scheme()
            )));
        }

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::new(format!("invalid method {:?}: {}", request.method, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::new(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::new(format!("invalid header value {:?}: {}", value, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(request.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::new(format!("failed to create HTTP client: {}", e)))?;

        Ok(HttpConnection {
            runtime: Arc::clone(&self.runtime),
            client: Some(client),
            url,
            method,
            outcome: None,
        })
    }
}

/// One POST exchange over [`HttpTransport`]
pub struct HttpConnection {
    runtime: Arc<Runtime>,
    client: Option<reqwest::Client>,
    url: Url,
    method: Method,
    outcome: Option<std::result::Result<Response, TransportError>>,
}

impl Connection for HttpConnection {
    fn write_body(&mut self, body: &[u8]) -> std::result::Result<(), TransportError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| TransportError::new("connection already released"))?;

        let pending = client
            .request(self.method.clone(), self.url.clone())
            .body(body.to_vec());

        let result = self.runtime.block_on(async move {
            let response = pending.send().await?;
            Ok::<_, reqwest::Error>(Response {
                status: response.status().as_u16(),
                headers: collect_headers(response.headers()),
            })
        });

        match result {
            Ok(response) => {
                self.outcome = Some(Ok(response));
                Ok(())
            }
            // Sent, but the response never arrived within the timeout
            Err(e) if e.is_timeout() && !e.is_connect() => {
                self.outcome = Some(Err(e.into()));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_response(&mut self) -> std::result::Result<Response, TransportError> {
        self.outcome
            .take()
            .unwrap_or_else(|| Err(TransportError::new("no request was sent")))
    }

    fn disconnect(&mut self) {
        self.client = None;
        self.outcome = None;
    }
}

fn collect_headers(headers: &HeaderMap) -> ResponseHeaders {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
