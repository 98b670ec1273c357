//! Error types for IPC operations

use thiserror::Error;

/// Errors that can occur during shared memory operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Region not found
    #[error("Shared region not found: {name}")]
    NotFound {
        /// Region name
        name: String,
    },

    /// Invalid region size
    #[error("Invalid region size: {size} bytes (expected {expected})")]
    InvalidSize {
        /// Size found in bytes
        size: usize,
        /// Size required by the layout
        expected: usize,
    },

    /// Invalid layout
    #[error("Invalid segment layout: {segment_count} x {segment_size} bytes")]
    InvalidLayout {
        /// Bytes per segment
        segment_size: usize,
        /// Number of segments
        segment_count: usize,
    },

    /// Segment id beyond the layout
    #[error("Segment {id} out of range (region has {count} segments)")]
    SegmentOutOfRange {
        /// Requested segment id
        id: usize,
        /// Segments in the region
        count: usize,
    },

    /// Payload larger than one segment
    #[error("Payload of {len} bytes exceeds segment size {capacity}")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Segment size
        capacity: usize,
    },

    /// Permission denied
    #[error("Permission denied accessing region: {name}")]
    PermissionDenied {
        /// Region name
        name: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;

/// Errors that can occur during message queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// Creating the queue failed
    #[error("Failed to create queue {key:#x}: {source}")]
    CreateFailed {
        /// System V key
        key: i32,
        /// Errno from msgget(2)
        #[source]
        source: nix::Error,
    },

    /// No queue exists for the key
    #[error("Queue {key:#x} not found")]
    NotFound {
        /// System V key
        key: i32,
    },

    /// Opening an existing queue failed
    #[error("Failed to open queue {key:#x}: {source}")]
    OpenFailed {
        /// System V key
        key: i32,
        /// Errno from msgget(2)
        #[source]
        source: nix::Error,
    },

    /// Channel id is not a valid message type
    #[error("Invalid channel id {0} (must be positive)")]
    InvalidChannel(i64),

    /// The queue has no room for the message
    #[error("Queue full on channel {channel}")]
    Full {
        /// Channel id
        channel: i64,
    },

    /// Message larger than the channel allows
    #[error("Message of {len} bytes exceeds channel maximum {max}")]
    TooLarge {
        /// Message length
        len: usize,
        /// Channel maximum
        max: usize,
    },

    /// msgsnd(2) failed
    #[error("Send failed on channel {channel}: {source}")]
    SendFailed {
        /// Channel id
        channel: i64,
        /// Errno
        #[source]
        source: nix::Error,
    },

    /// msgrcv(2) failed
    #[error("Receive failed on channel {channel}: {source}")]
    RecvFailed {
        /// Channel id
        channel: i64,
        /// Errno
        #[source]
        source: nix::Error,
    },

    /// msgctl(IPC_RMID) failed
    #[error("Failed to remove queue {key:#x}: {source}")]
    RemoveFailed {
        /// System V key
        key: i32,
        /// Errno
        #[source]
        source: nix::Error,
    },
}
