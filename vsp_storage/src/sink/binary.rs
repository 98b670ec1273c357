//! Raw frame sink: appends every frame verbatim.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

use super::{Lifecycle, SinkInput, StorageSink};
use crate::error::SinkError;

/// Appends undecoded frames to a file.
///
/// Frames carry no length prefix on the wire and none is added here; the file
/// is a plain concatenation.
#[derive(Debug)]
pub struct BinarySink {
    lifecycle: Lifecycle<File>,
    bytes_written: u64,
}

impl BinarySink {
    /// Uninitialized sink.
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("binary"),
            bytes_written: 0,
        }
    }

    /// Bytes appended since the last open.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Default for BinarySink {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageSink for BinarySink {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn input(&self) -> SinkInput {
        SinkInput::Raw
    }

    fn initialize(&mut self, path: &Path) -> Result<(), SinkError> {
        self.lifecycle.initialize(path)
    }

    fn open(&mut self) -> Result<(), SinkError> {
        let path = self.lifecycle.path_to_open()?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Binary sink appending to {}", path.display());
        self.lifecycle.set_open(file);
        self.bytes_written = 0;
        Ok(())
    }

    fn store_raw(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        self.lifecycle.output()?.write_all(frame)?;
        self.bytes_written += frame.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let file = self.lifecycle.take_output()?;
        file.sync_all()?;
        info!("Binary sink closed after {} bytes", self.bytes_written);
        Ok(())
    }

    fn uninitialize(&mut self) -> Result<(), SinkError> {
        if self.lifecycle.is_open() {
            self.close()?;
        }
        self.lifecycle.forget_path();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use vsp_common::prelude::Datum;

    #[test]
    fn test_store_before_open() {
        let mut sink = BinarySink::new();
        assert!(matches!(sink.store_raw(b"x"), Err(SinkError::NotOpen { .. })));
        assert!(matches!(sink.open(), Err(SinkError::NotInitialized { .. })));
    }

    #[test]
    fn test_appends_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.bin");
        let mut sink = BinarySink::new();
        sink.initialize(&path).unwrap();

        sink.open().unwrap();
        sink.store_raw(&[1, 2, 3]).unwrap();
        sink.close().unwrap();

        sink.open().unwrap();
        sink.store_raw(&[4]).unwrap();
        assert_eq!(sink.bytes_written(), 1);
        sink.uninitialize().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
        assert!(matches!(sink.open(), Err(SinkError::NotInitialized { .. })));
    }

    #[test]
    fn test_rejects_datum() {
        let mut sink = BinarySink::new();
        let err = sink.store_datum(&Datum::new(Utc::now())).unwrap_err();
        assert!(matches!(
            err,
            SinkError::Unsupported {
                input: SinkInput::Datum,
                ..
            }
        ));
    }
}
