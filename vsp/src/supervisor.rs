//! Child process supervisor.
//!
//! Holds one [`ProcessHandle`] per configured child. Children are started with
//! their configured path and whitespace-split arguments, stopped with SIGTERM
//! and reaped without blocking.

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use tracing::{debug, info, warn};
use vsp_common::prelude::{ChildProcess, KeyValueConfig, Supervise, SupervisorError};

/// Configured child process and, while it runs, its OS handle.
#[derive(Debug)]
pub struct ProcessHandle {
    path: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
}

impl ProcessHandle {
    /// Handle for `path` with a whitespace-separated argument string.
    pub fn new(path: impl Into<PathBuf>, args: &str) -> Self {
        Self {
            path: path.into(),
            args: args.split_whitespace().map(str::to_string).collect(),
            child: None,
        }
    }

    /// Executable path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments passed on spawn.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// OS process id, or -1 when no process is running.
    pub fn pid(&self) -> i32 {
        self.child
            .as_ref()
            .and_then(|c| i32::try_from(c.id()).ok())
            .unwrap_or(-1)
    }

    /// Whether a process is attached.
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

/// Spawns, signals and reaps the orchestrator's children.
#[derive(Debug, Default)]
pub struct Supervisor {
    handles: HashMap<ChildProcess, ProcessHandle>,
    /// Signalled children that had not exited yet when last polled.
    exiting: Vec<(ChildProcess, Child)>,
}

impl Supervisor {
    /// Supervisor with no prepared children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare one handle per child that has a `<name>.path` entry.
    pub fn from_config(config: &KeyValueConfig) -> Self {
        let mut supervisor = Self::new();
        for child in ChildProcess::ALL {
            let name = child.config_name();
            match config.get(&format!("{name}.path")) {
                Some(path) => {
                    let args = config.get(&format!("{name}.args")).unwrap_or("");
                    supervisor.prepare(child, ProcessHandle::new(path, args));
                }
                None => debug!("No path configured for {}, skipping", child),
            }
        }
        info!("Supervisor prepared {} child processes", supervisor.handles.len());
        supervisor
    }

    /// Register or replace the handle for `child`.
    pub fn prepare(&mut self, child: ChildProcess, handle: ProcessHandle) {
        debug!(
            "Prepared {}: {} {:?}",
            child,
            handle.path.display(),
            handle.args
        );
        self.handles.insert(child, handle);
    }

    /// Handle for `child`, if configured.
    pub fn handle(&self, child: ChildProcess) -> Option<&ProcessHandle> {
        self.handles.get(&child)
    }

    /// Process id of `child`, or -1.
    pub fn pid(&self, child: ChildProcess) -> i32 {
        self.handles.get(&child).map_or(-1, ProcessHandle::pid)
    }

    /// Poll signalled children and drop the ones that exited.
    ///
    /// Returns how many are still pending.
    pub fn reap(&mut self) -> usize {
        self.exiting.retain_mut(|(name, child)| match child.try_wait() {
            Ok(Some(status)) => {
                debug!("{} (pid {}) exited: {}", name, child.id(), status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll {} (pid {}): {}", name, child.id(), e);
                false
            }
        });
        self.exiting.len()
    }
}

impl Supervise for Supervisor {
    fn spawn(&mut self, child: ChildProcess) -> Result<i32, SupervisorError> {
        let handle = self
            .handles
            .get_mut(&child)
            .ok_or(SupervisorError::NotConfigured { child })?;

        if handle.is_running() {
            return Err(SupervisorError::AlreadyRunning {
                child,
                pid: handle.pid(),
            });
        }

        let process = Command::new(&handle.path)
            .args(&handle.args)
            .spawn()
            .map_err(|source| SupervisorError::SpawnFailed { child, source })?;

        handle.child = Some(process);
        let pid = handle.pid();
        info!("Spawned {} (pid {})", child, pid);
        Ok(pid)
    }

    fn terminate(&mut self, child: ChildProcess) -> Result<(), SupervisorError> {
        let handle = self
            .handles
            .get_mut(&child)
            .ok_or(SupervisorError::NotRunning { child })?;
        let pid = handle.pid();
        let mut process = handle.child.take().ok_or(SupervisorError::NotRunning { child })?;

        // Already exited on its own: nothing to signal
        if let Ok(Some(status)) = process.try_wait() {
            info!("{} (pid {}) had already exited: {}", child, pid, status);
            return Ok(());
        }

        if let Err(source) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            // The handle stays cleared; the process is no longer ours to manage
            self.exiting.push((child, process));
            return Err(SupervisorError::SignalFailed { child, pid, source });
        }
        info!("Sent SIGTERM to {} (pid {})", child, pid);

        match process.try_wait() {
            Ok(Some(status)) => debug!("{} (pid {}) exited: {}", child, pid, status),
            _ => {
                debug!("{} (pid {}) still exiting, reaping later", child, pid);
                self.exiting.push((child, process));
            }
        }
        self.reap();
        Ok(())
    }

    fn is_running(&self, child: ChildProcess) -> bool {
        self.handles.get(&child).is_some_and(ProcessHandle::is_running)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.terminate_all();
        let pending = self.reap();
        if pending > 0 {
            debug!("{} children still exiting at supervisor drop", pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sleeper() -> ProcessHandle {
        ProcessHandle::new("/bin/sleep", "30")
    }

    #[test]
    fn test_args_are_split_on_whitespace() {
        let handle = ProcessHandle::new("/usr/bin/iperf", "  -c  10.0.0.1 -t 5 ");
        assert_eq!(handle.args(), ["-c", "10.0.0.1", "-t", "5"]);
        assert_eq!(handle.pid(), -1);
    }

    #[test]
    fn test_from_config_prepares_only_configured() {
        let config: KeyValueConfig = "gps.path=/bin/true\ngps.args=-x\nwlan.args=ignored\n"
            .parse()
            .unwrap();
        let supervisor = Supervisor::from_config(&config);
        let gps = supervisor.handle(ChildProcess::Gps).unwrap();
        assert_eq!(gps.path(), Path::new("/bin/true"));
        assert_eq!(gps.args(), ["-x"]);
        assert!(supervisor.handle(ChildProcess::Wlan).is_none());
    }

    #[test]
    fn test_spawn_unconfigured() {
        let mut supervisor = Supervisor::new();
        assert!(matches!(
            supervisor.spawn(ChildProcess::Rtc),
            Err(SupervisorError::NotConfigured {
                child: ChildProcess::Rtc
            })
        ));
    }

    #[test]
    fn test_spawn_failure_leaves_handle_unset() {
        let mut supervisor = Supervisor::new();
        supervisor.prepare(
            ChildProcess::Temp,
            ProcessHandle::new("/nonexistent/vsp-temp", ""),
        );
        assert!(matches!(
            supervisor.spawn(ChildProcess::Temp),
            Err(SupervisorError::SpawnFailed { .. })
        ));
        assert!(!supervisor.is_running(ChildProcess::Temp));
        assert_eq!(supervisor.pid(ChildProcess::Temp), -1);
    }

    #[test]
    fn test_double_spawn_is_rejected() {
        let mut supervisor = Supervisor::new();
        supervisor.prepare(ChildProcess::Gps, sleeper());
        let pid = supervisor.spawn(ChildProcess::Gps).unwrap();
        assert!(matches!(
            supervisor.spawn(ChildProcess::Gps),
            Err(SupervisorError::AlreadyRunning { pid: p, .. }) if p == pid
        ));
        supervisor.terminate(ChildProcess::Gps).unwrap();
    }

    #[test]
    fn test_terminate_twice() {
        let mut supervisor = Supervisor::new();
        supervisor.prepare(ChildProcess::Iperf, sleeper());

        let pid = supervisor.spawn(ChildProcess::Iperf).unwrap();
        assert!(pid > 0);
        assert!(supervisor.is_running(ChildProcess::Iperf));

        supervisor.terminate(ChildProcess::Iperf).unwrap();
        assert!(!supervisor.is_running(ChildProcess::Iperf));
        assert_eq!(supervisor.pid(ChildProcess::Iperf), -1);

        let err = supervisor.terminate(ChildProcess::Iperf).unwrap_err();
        assert!(matches!(err, SupervisorError::NotRunning { .. }));
        assert_eq!(err.to_string(), "no process running for iperf");
        assert_eq!(supervisor.pid(ChildProcess::Iperf), -1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while supervisor.reap() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(supervisor.reap(), 0);
    }

    #[test]
    fn test_terminate_all_clears_every_handle() {
        let mut supervisor = Supervisor::new();
        supervisor.prepare(ChildProcess::Display, sleeper());
        supervisor.prepare(ChildProcess::Rtc, sleeper());
        supervisor.spawn(ChildProcess::Display).unwrap();
        supervisor.spawn(ChildProcess::Rtc).unwrap();

        supervisor.terminate_all();
        assert!(!supervisor.is_running(ChildProcess::Display));
        assert!(!supervisor.is_running(ChildProcess::Rtc));
    }
}
