//! VSP Common Library
//!
//! Shared types for every process of the vehicle sensor platform.
//!
//! # Module Structure
//!
//! - [`consts`] - Segment layout, queue channel ids, message limits
//! - [`sensor`] - Sensor kinds (segment id = frame discriminator)
//! - [`archive`] - Archive Codec (type-tagged binary encoding)
//! - [`record`] - Per-sensor records and Record Blocks
//! - [`snapshot`] - Segment snapshot format
//! - [`datum`] - Frame decoding into [`datum::Datum`]
//! - [`config`] - `key=value` configuration loading
//! - [`supervisor`] - Child process contract
//! - [`prelude`] - Common re-exports for convenience

pub mod archive;
pub mod config;
pub mod consts;
pub mod datum;
pub mod prelude;
pub mod record;
pub mod sensor;
pub mod snapshot;
pub mod supervisor;
