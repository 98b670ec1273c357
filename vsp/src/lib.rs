//! # VSP Orchestrator
//!
//! Creates the shared region and message queue, supervises the sensor and
//! display processes and turns sensor snapshots into Archive Frames.
//!
//! # Module Structure
//!
//! - [`orchestrator`] - control loop, adaptive tick period
//! - [`reader`] - per-sensor Record Readers
//! - [`gui`] - display commands, keypad events and pages
//! - [`supervisor`] - child process lifecycle
//! - [`error`] - orchestrator error type
//!
//! ```text
//!  segments 1..6 ──► RecordReader ──► compose_frame ──► data channel
//!                                          │
//!  button channel ──► handle_button ──► GuiPage ──► gui channel
//!                                          │
//!  gps speed ──► tick_period_us ──► control segment 0
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod gui;
pub mod orchestrator;
pub mod reader;
pub mod supervisor;

pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorState, tick_period_us};
pub use supervisor::{ProcessHandle, Supervisor};
