//! # VSP Storage
//!
//! Drains the data channel, decodes Archive Frames into [`Datum`]s and
//! persists them through a [`StorageSink`] picked at startup.
//!
//! - [`consumer`] - receive loop and per-message handling
//! - [`sink`] - sink trait and the binary, text and KML sinks
//! - [`registry`] - sink kinds and their factories
//!
//! [`Datum`]: vsp_common::prelude::Datum

#![deny(missing_docs)]

pub mod consumer;
pub mod error;
pub mod registry;
pub mod sink;

pub use consumer::{ConsumerStats, Poll, StorageConsumer};
pub use error::SinkError;
pub use registry::{SinkKind, SinkRegistry};
pub use sink::{SinkInput, StorageSink};
