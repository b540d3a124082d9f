//! Delivery of payloads to the Tealium Collect endpoint
//!
//! One call to [`Dispatcher::dispatch`] makes at most one POST request. There
//! is no retry, batching, or queueing.
//!
//! ## Failure handling
//!
//! - Failures before any request is made (the payload can't be serialized,
//!   the connection can't be set up) are *hard stops*: they are reported to
//!   the callback **and** returned to the caller.
//! - Failures after a request was attempted (send, response, an `x-error`
//!   header, a non-200 status) are *soft*: they are reported to the callback
//!   only.
//!
//! Either way the callback runs exactly once per dispatch.

mod dispatcher;
mod http;
mod transport;

pub use dispatcher::{DispatchCallback, DispatchError, DispatchInfo, Dispatcher, DISPATCH_SERVICE};
pub use http::{HttpConnection, HttpTransport};
pub use transport::{Connection, Request, Response, ResponseHeaders, Transport, TransportError};
