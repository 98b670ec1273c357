//! Storage Sinks.
//!
//! A sink persists what the consumer hands it. Every sink goes through the
//! same lifecycle: `initialize(path)` → `open()` → `store_*`… → `close()` →
//! `uninitialize()`. `close` may be followed by another `open`.

use std::fmt;
use std::path::{Path, PathBuf};
use vsp_common::prelude::Datum;

use crate::error::SinkError;

pub mod binary;
pub mod kml;
pub mod text;

pub use binary::BinarySink;
pub use kml::KmlSink;
pub use text::TextSink;

/// What a sink consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkInput {
    /// Undecoded Archive Frames.
    Raw,
    /// Decoded Datums.
    Datum,
}

impl fmt::Display for SinkInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Datum => f.write_str("datum"),
        }
    }
}

/// Output backend of the storage consumer.
///
/// Object-safe: the consumer holds a `Box<dyn StorageSink>`.
pub trait StorageSink {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Input this sink consumes.
    fn input(&self) -> SinkInput;

    /// Bind the sink to its output path.
    fn initialize(&mut self, path: &Path) -> Result<(), SinkError>;

    /// Open the output for storing.
    fn open(&mut self) -> Result<(), SinkError>;

    /// Persist one undecoded frame.
    fn store_raw(&mut self, _frame: &[u8]) -> Result<(), SinkError> {
        Err(SinkError::Unsupported {
            sink: self.name(),
            input: SinkInput::Raw,
        })
    }

    /// Persist one decoded datum.
    fn store_datum(&mut self, _datum: &Datum) -> Result<(), SinkError> {
        Err(SinkError::Unsupported {
            sink: self.name(),
            input: SinkInput::Datum,
        })
    }

    /// Flush and close the output.
    fn close(&mut self) -> Result<(), SinkError>;

    /// Forget the output path. Closes first if still open.
    fn uninitialize(&mut self) -> Result<(), SinkError>;
}

/// Lifecycle bookkeeping shared by the sinks.
#[derive(Debug)]
pub(crate) struct Lifecycle<T> {
    sink: &'static str,
    path: Option<PathBuf>,
    output: Option<T>,
}

impl<T> Lifecycle<T> {
    pub(crate) fn new(sink: &'static str) -> Self {
        Self {
            sink,
            path: None,
            output: None,
        }
    }

    pub(crate) fn initialize(&mut self, path: &Path) -> Result<(), SinkError> {
        if self.output.is_some() {
            return Err(SinkError::AlreadyOpen { sink: self.sink });
        }
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Path to open; fails unless initialized and closed.
    pub(crate) fn path_to_open(&self) -> Result<&Path, SinkError> {
        if self.output.is_some() {
            return Err(SinkError::AlreadyOpen { sink: self.sink });
        }
        self.path
            .as_deref()
            .ok_or(SinkError::NotInitialized { sink: self.sink })
    }

    pub(crate) fn set_open(&mut self, output: T) {
        self.output = Some(output);
    }

    pub(crate) fn output(&mut self) -> Result<&mut T, SinkError> {
        self.output
            .as_mut()
            .ok_or(SinkError::NotOpen { sink: self.sink })
    }

    pub(crate) fn take_output(&mut self) -> Result<T, SinkError> {
        self.output
            .take()
            .ok_or(SinkError::NotOpen { sink: self.sink })
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.output.is_some()
    }

    pub(crate) fn forget_path(&mut self) {
        self.path = None;
    }
}
