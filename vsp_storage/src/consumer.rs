//! Storage Consumer loop.
//!
//! Drains the data channel without blocking, sleeping `poll` between empty
//! receives. Datum sinks get each frame decoded and stamped with the receive
//! time; raw sinks get the bytes untouched.

use chrono::Utc;
use nix::errno::Errno;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use vsp_common::consts::DATA_MSG_MAX;
use vsp_common::prelude::Datum;
use vsp_ipc::{QueueChannel, QueueError};

use crate::error::SinkError;
use crate::sink::{SinkInput, StorageSink};

/// Consumer counters, logged at shutdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages received.
    pub messages: u64,
    /// Frames that stopped decoding early.
    pub decode_failures: u64,
    /// Frames or Datums handed to the sink.
    pub stored: u64,
    /// Sink errors.
    pub sink_errors: u64,
    /// Receive errors.
    pub recv_errors: u64,
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// A message was handled.
    Message,
    /// Nothing waiting.
    Idle,
    /// The queue no longer exists.
    Closed,
}

/// Moves frames from the data channel into a sink.
pub struct StorageConsumer {
    rx: QueueChannel,
    sink: Box<dyn StorageSink>,
    running: Arc<AtomicBool>,
    poll: Duration,
    buf: Vec<u8>,
    stats: ConsumerStats,
}

impl StorageConsumer {
    /// Consumer over an opened data channel and an opened sink.
    pub fn new(rx: QueueChannel, sink: Box<dyn StorageSink>, poll: Duration) -> Self {
        Self {
            rx,
            sink,
            running: Arc::new(AtomicBool::new(true)),
            poll,
            buf: vec![0u8; DATA_MSG_MAX],
            stats: ConsumerStats::default(),
        }
    }

    /// Share an existing stop flag instead of the consumer's own.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Flag cleared by the signal handler to request shutdown.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Counters so far.
    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Receive and handle at most one message.
    pub fn poll_once(&mut self) -> Poll {
        let n = match self.rx.recv(&mut self.buf) {
            Ok(0) => return Poll::Idle,
            Ok(n) => n,
            Err(QueueError::RecvFailed {
                source: Errno::EIDRM | Errno::EINVAL,
                ..
            }) => return Poll::Closed,
            Err(e) => {
                self.stats.recv_errors += 1;
                warn!("Data channel: {}", e);
                return Poll::Idle;
            }
        };

        let frame = self.buf[..n].to_vec();
        if let Err(e) = self.handle_message(&frame) {
            self.stats.sink_errors += 1;
            warn!("{} sink: {}", self.sink.name(), e);
        }
        Poll::Message
    }

    /// Hand one frame to the sink, decoding it first for Datum sinks.
    ///
    /// A frame that fails part way still stores the blocks decoded before the
    /// failure; the rest of that frame is dropped.
    pub fn handle_message(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        self.stats.messages += 1;
        match self.sink.input() {
            SinkInput::Raw => {
                self.sink.store_raw(frame)?;
                self.stats.stored += 1;
            }
            SinkInput::Datum => {
                let decoded = Datum::decode(frame, Utc::now());
                if let Some(e) = &decoded.error {
                    self.stats.decode_failures += 1;
                    warn!(
                        "Corrupted frame ({} bytes) after {} blocks: {}",
                        frame.len(),
                        decoded.blocks,
                        e
                    );
                }
                if decoded.blocks == 0 {
                    debug!("Nothing to store from frame");
                    return Ok(());
                }
                self.sink.store_datum(&decoded.datum)?;
                self.stats.stored += 1;
            }
        }
        Ok(())
    }

    /// Poll until stopped or the queue disappears.
    pub fn run(&mut self) {
        info!(
            "Storage consumer running ({} sink, poll {:?})",
            self.sink.name(),
            self.poll
        );
        while self.running.load(Ordering::SeqCst) {
            match self.poll_once() {
                Poll::Message => {}
                Poll::Idle => std::thread::sleep(self.poll),
                Poll::Closed => {
                    warn!("Data channel removed, stopping");
                    break;
                }
            }
        }
        let s = self.stats;
        info!(
            "Storage consumer stopped: {} messages, {} stored, {} decode failures, {} sink errors",
            s.messages, s.stored, s.decode_failures, s.sink_errors
        );
    }

    /// Close the sink and hand it back.
    pub fn finish(mut self) -> Result<Box<dyn StorageSink>, SinkError> {
        self.sink.uninitialize()?;
        Ok(self.sink)
    }
}
