//! Prelude module for common re-exports.
//!
//! ```rust
//! use vsp_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, KeyValueConfig, LogLevel};

// ─── Archive Codec ──────────────────────────────────────────────────
pub use crate::archive::{ArchiveError, ArchiveReader, ArchiveWriter, Decode, Encode, TimeValue};

// ─── Records ────────────────────────────────────────────────────────
pub use crate::datum::{Datum, DecodedFrame, FrameError};
pub use crate::record::{
    GpsRecord, Record, RtcRecord, SensorRecord, TemperatureRecord, ThroughputRecord, WlanNetwork,
    WlanRecord,
};
pub use crate::sensor::SensorKind;

// ─── Processes ──────────────────────────────────────────────────────
pub use crate::supervisor::{ChildProcess, Supervise, SupervisorError};
