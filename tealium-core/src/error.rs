//! Error types for tealium-core

use thiserror::Error;

use crate::dispatch::DispatchError;

/// Main error type for the tealium-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A payload could not be encoded to one of its wire forms
    #[error("payload serialization error: {0}")]
    Serialization(String),

    /// Stored or received text could not be decoded into a payload
    #[error("payload deserialization error: {0}")]
    Deserialization(String),

    /// Dispatch failed before a request could be made
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result type alias for tealium-core
pub type Result<T> = std::result::Result<T, Error>;
