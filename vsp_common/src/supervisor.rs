//! # Supervisor Trait
//!
//! Defines the contract between the orchestrator and whatever manages its
//! child processes. The `vsp` crate implements it with fork/exec/kill
//! semantics; tests substitute a recording fake.

use std::fmt;

use thiserror::Error;

/// Identifies a managed child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildProcess {
    /// Front-panel display driver. Always spawned first.
    Display,
    /// GPS monitor.
    Gps,
    /// Throughput test monitor.
    Iperf,
    /// Temperature and fan monitor.
    Temp,
    /// Real-time clock monitor.
    Rtc,
    /// Wifi scanner.
    Wlan,
}

impl ChildProcess {
    /// All children in spawn order.
    pub const ALL: [ChildProcess; 6] = [
        ChildProcess::Display,
        ChildProcess::Gps,
        ChildProcess::Iperf,
        ChildProcess::Temp,
        ChildProcess::Rtc,
        ChildProcess::Wlan,
    ];

    /// Configuration key prefix (`<name>.path`, `<name>.args`).
    pub const fn config_name(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Gps => "gps",
            Self::Iperf => "iperf",
            Self::Temp => "temp",
            Self::Rtc => "rtc",
            Self::Wlan => "wlan",
        }
    }
}

impl fmt::Display for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// Error type for supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// No `<name>.path` entry was configured for this child.
    #[error("{child} is not configured")]
    NotConfigured {
        /// Child concerned.
        child: ChildProcess,
    },

    /// The child is already running.
    #[error("{child} is already running (pid {pid})")]
    AlreadyRunning {
        /// Child concerned.
        child: ChildProcess,
        /// Its process id.
        pid: i32,
    },

    /// Terminate was requested but no process is running.
    #[error("no process running for {child}")]
    NotRunning {
        /// Child concerned.
        child: ChildProcess,
    },

    /// Spawning the executable failed.
    #[error("failed to spawn {child}: {source}")]
    SpawnFailed {
        /// Child concerned.
        child: ChildProcess,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Delivering the termination signal failed.
    #[error("failed to signal {child} (pid {pid}): {source}")]
    SignalFailed {
        /// Child concerned.
        child: ChildProcess,
        /// Its process id.
        pid: i32,
        /// Errno returned by kill(2).
        #[source]
        source: nix::Error,
    },
}

/// Process lifecycle contract used by the orchestrator.
pub trait Supervise {
    /// Spawn `child`, returning its OS process id.
    fn spawn(&mut self, child: ChildProcess) -> Result<i32, SupervisorError>;

    /// Send the termination signal to `child` and clear its handle.
    fn terminate(&mut self, child: ChildProcess) -> Result<(), SupervisorError>;

    /// Whether `child` currently has a process.
    fn is_running(&self, child: ChildProcess) -> bool;

    /// Terminate every running child. Failures are logged, not returned.
    fn terminate_all(&mut self) {
        for child in ChildProcess::ALL {
            if self.is_running(child) {
                if let Err(e) = self.terminate(child) {
                    tracing::warn!("terminate {child}: {e}");
                }
            }
        }
    }
}
