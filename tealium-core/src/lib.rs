//! # tealium-core
//!
//! Client-side analytics event collector for the Tealium Collect service.
//!
//! This library provides:
//! - An event payload type with JSON and legacy percent-encoded wire forms
//! - Durable visitor identity that survives process restarts
//! - Per-dispatch session fields (timestamp, nonce, session id)
//! - Single-attempt delivery with a consolidated result callback
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows leaf to root:
//! - **Payload:** key → string / string-list attributes
//! - **Storage:** a durable text blob holding the persistent payload
//! - **Session:** persistent identity plus volatile per-dispatch fields
//! - **Dispatch:** one POST per event, every outcome reported once
//!
//! ## Example
//!
//! ```rust,no_run
//! use tealium_core::{DispatchInfo, Payload, Tealium};
//!
//! let tealium = Tealium::builder("account", "profile", "prod")
//!     .expect("identity is non-empty")
//!     .build()
//!     .expect("failed to create tracker");
//!
//! let mut data = Payload::new();
//! data.put("screen_name", "home");
//!
//! let callback = |success: bool, _info: &DispatchInfo, error: Option<&str>| {
//!     if !success {
//!         eprintln!("dispatch failed: {}", error.unwrap_or("unknown"));
//!     }
//! };
//! tealium
//!     .track(Some("launch"), Some(&data), Some(&callback))
//!     .expect("dispatch could not be attempted");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, LibraryContext};
pub use dispatch::{DispatchCallback, DispatchError, DispatchInfo, Dispatcher};
pub use error::{Error, Result};
pub use payload::{IntoValue, ListElement, Payload, Value};
pub use persistent::{LoadOutcome, LoadState, PersistentPayloadStore, StoredFormat};
pub use session::SessionDataManager;
pub use storage::{FileTextStore, MemoryTextStore, TextStore};
pub use tracker::{Builder, Tealium};

// Public modules
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod payload;
pub mod persistent;
pub mod session;
pub mod storage;
pub mod tracker;
