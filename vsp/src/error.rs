//! Orchestrator error type.

use thiserror::Error;
use vsp_common::prelude::{ArchiveError, SupervisorError};
use vsp_ipc::{QueueError, ShmError};

/// Errors surfaced by the orchestrator.
///
/// Only the ones raised while initializing are fatal; inside the loop they are
/// logged and the tick carries on.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Shared memory failure.
    #[error("shared memory: {0}")]
    Shm(#[from] ShmError),

    /// Message queue failure.
    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    /// Child process failure.
    #[error("supervisor: {0}")]
    Supervisor(#[from] SupervisorError),

    /// Encoding failure.
    #[error("archive: {0}")]
    Archive(#[from] ArchiveError),

    /// Malformed GUI or button message.
    #[error("protocol: {0}")]
    Protocol(#[from] crate::gui::ProtocolError),
}
