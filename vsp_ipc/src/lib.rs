//! # VSP IPC
//!
//! The two transports shared by the orchestrator, the sensor processes and
//! the storage consumer:
//!
//! - [`SegmentStore`] / [`Segment`]: one shared region split into fixed-size
//!   segments, one per sensor kind plus a control segment. Latest value wins.
//! - [`QueueChannel`]: a non-blocking System V message queue with one
//!   channel per message type (GUI, button, data). FIFO per channel.
//!
//! ```text
//!  sensor procs ──write──► [ctl|iperf|gps|accel|temp|rtc|wlan] ──read──► orchestrator
//!  orchestrator ──data──► queue ──► storage consumer
//!  orchestrator ──gui───► queue ──► display
//!  buttons ──────button─► queue ──► orchestrator
//! ```

pub mod error;
pub mod platform;
pub mod queue;
pub mod segment;

pub use error::{QueueError, ShmError, ShmResult};
pub use queue::QueueChannel;
pub use segment::{Segment, SegmentLayout, SegmentStore};
