//! Human-readable sink: one text rendering per Datum.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;
use vsp_common::prelude::Datum;

use super::{Lifecycle, SinkInput, StorageSink};
use crate::error::SinkError;

/// Appends the text rendering of each Datum, flushed per record.
#[derive(Debug)]
pub struct TextSink {
    lifecycle: Lifecycle<BufWriter<File>>,
    records: u64,
}

impl TextSink {
    /// Uninitialized sink.
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("text"),
            records: 0,
        }
    }
}

impl Default for TextSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageSink for TextSink {
    fn name(&self) -> &'static str {
        "text"
    }

    fn input(&self) -> SinkInput {
        SinkInput::Datum
    }

    fn initialize(&mut self, path: &Path) -> Result<(), SinkError> {
        self.lifecycle.initialize(path)
    }

    fn open(&mut self) -> Result<(), SinkError> {
        let path = self.lifecycle.path_to_open()?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Text sink appending to {}", path.display());
        self.lifecycle.set_open(BufWriter::new(file));
        Ok(())
    }

    fn store_datum(&mut self, datum: &Datum) -> Result<(), SinkError> {
        let out = self.lifecycle.output()?;
        write!(out, "{datum}")?;
        out.flush()?;
        self.records += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let mut out = self.lifecycle.take_output()?;
        out.flush()?;
        info!("Text sink closed after {} records", self.records);
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
