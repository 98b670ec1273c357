//! Storage error type.

use crate::sink::SinkInput;
use crate::registry::SinkKind;
use thiserror::Error;

/// Errors raised by sinks and the sink registry.
#[derive(Debug, Error)]
pub enum SinkError {
    /// `open` before `initialize`.
    #[error("{sink} sink has no output path")]
    NotInitialized {
        /// Sink name.
        sink: &'static str,
    },

    /// `store` or `close` while the sink is not open.
    #[error("{sink} sink is not open")]
    NotOpen {
        /// Sink name.
        sink: &'static str,
    },

    /// `open` or `initialize` while already open.
    #[error("{sink} sink is already open")]
    AlreadyOpen {
        /// Sink name.
        sink: &'static str,
    },

    /// The sink does not accept this kind of input.
    #[error("{sink} sink does not accept {input} input")]
    Unsupported {
        /// Sink name.
        sink: &'static str,
        /// Rejected input.
        input: SinkInput,
    },

    /// Unknown sink kind name.
    #[error("unknown sink kind '{0}' (expected binary, text or kml)")]
    UnknownKind(String),

    /// No factory registered for the kind.
    #[error("no sink registered for {0}")]
    NotRegistered(SinkKind),

    /// A factory is already registered for the kind.
    #[error("a sink is already registered for {0}")]
    AlreadyRegistered(SinkKind),

    /// Output file failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
