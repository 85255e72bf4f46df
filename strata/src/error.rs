//! Error types for stream operations

use crate::{prefix::LengthPrefix, text::TextEncoding};
use thiserror::Error;

/// Error type for stream operations.
///
/// Every variant is raised synchronously by the call that detected it. The engines never retry
/// and never roll back bytes that were already handed to a store.
#[derive(Error, Debug)]
pub enum Error {
    #[error("end of stream: read overruns by {overrun} bytes")]
    EndOfStream { overrun: u64 },
    #[error("data corruption: {0}")]
    DataCorruption(String),
    #[error("invalid cast: {value} does not fit a {kind:?} length prefix")]
    InvalidCast { kind: LengthPrefix, value: i64 },
    #[error("text does not survive a round trip through {0:?}")]
    EncodingFidelity(TextEncoding),
    #[error("embedded terminator at index {0}")]
    EmbeddedTerminator(usize),
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("frame belongs to a different stack")]
    ContractViolation,
    #[error("engine has been disposed")]
    Disposed,
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("object serialization failed: {0}")]
    Object(String),
}
