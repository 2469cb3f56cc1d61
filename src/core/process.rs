//! # OS-level lifecycle of component processes.
//!
//! [`ProcessSupervisor`] owns at most one child process per component.
//!
//! ```text
//! start(spec) ──► Command(program, args, cwd, env) ──► spawn
//!                        stdout/stderr piped ──► drained line by line into tracing (debug)
//!
//! stop(name, stop_timeout, kill_timeout)
//!   ├─► SIGTERM (unix) ──► wait ≤ stop_timeout ──► exited? done
//!   └─► SIGKILL         ──► wait ≤ kill_timeout ──► give up (logged)
//!
//! poll(name) ──► try_wait()  (never blocks)
//! info(name) ──► sysinfo snapshot, or a minimal record
//! ```
//!
//! ## Rules
//! - Start failures are returned to the caller.
//! - Stop never fails and never hangs longer than `stop_timeout + kill_timeout`;
//!   problems are logged and the handle is dropped either way.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time;

use crate::components::ComponentSpec;
use crate::error::ProcessError;

/// Liveness of a component's process as seen by a non-blocking poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// No process was ever started (or it was stopped and forgotten).
    NotStarted,
    /// The process is alive.
    Running,
    /// The process exited; `code` is `None` when it was killed by a signal.
    Exited { code: Option<i32> },
}

/// Best-effort resource snapshot of a component's process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: Option<u32>,
    /// OS-reported status (`"running"`, `"sleeping"`, ...), or `"unknown"`.
    pub status: String,
    /// CPU usage in percent since the previous refresh (0 when unavailable).
    pub cpu: f32,
    /// Resident memory in bytes (0 when unavailable).
    pub memory: u64,
    pub cmdline: String,
    pub started_at: Option<SystemTime>,
}

struct ManagedProcess {
    child: Child,
    pid: u32,
    cmdline: String,
    started_at: SystemTime,
}

/// Launches, polls and terminates one child process per component.
#[derive(Default)]
pub struct ProcessSupervisor {
    procs: Mutex<HashMap<String, ManagedProcess>>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the component's process and returns its PID.
    ///
    /// The environment is the host environment with `spec.env` merged over it.
    /// A previous handle for the same component is replaced (and killed on drop).
    ///
    /// # Errors
    /// [`ProcessError::SpawnFailed`] if the executable cannot be launched.
    pub async fn start(&self, spec: &ComponentSpec) -> Result<u32, ProcessError> {
        let name = spec.name();
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            component: name.to_string(),
            reason: e.to_string(),
        })?;
        let pid = child.id().ok_or_else(|| ProcessError::SpawnFailed {
            component: name.to_string(),
            reason: "process exited before its pid could be read".to_string(),
        })?;

        if let Some(out) = child.stdout.take() {
            drain_output(name.to_string(), "stdout", out);
        }
        if let Some(err) = child.stderr.take() {
            drain_output(name.to_string(), "stderr", err);
        }

        tracing::debug!(component = name, pid, cmdline = %spec.cmdline(), "process spawned");
        self.procs.lock().await.insert(
            name.to_string(),
            ManagedProcess {
                child,
                pid,
                cmdline: spec.cmdline(),
                started_at: SystemTime::now(),
            },
        );
        Ok(pid)
    }

    /// Stops the component's process: graceful signal, then forced kill.
    ///
    /// Never fails. Returns `true` if a process was tracked for `name`.
    pub async fn stop(&self, name: &str, stop_timeout: Duration, kill_timeout: Duration) -> bool {
        let Some(mut proc) = self.procs.lock().await.remove(name) else {
            return false;
        };

        if let Ok(Some(_)) = proc.child.try_wait() {
            return true;
        }

        if let Err(e) = terminate(name, proc.pid) {
            tracing::warn!(component = name, error = %e, "graceful stop signal failed");
        } else {
            match time::timeout(stop_timeout, proc.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!(component = name, %status, "process exited gracefully");
                    return true;
                }
                Ok(Err(e)) => tracing::warn!(component = name, error = %e, "waiting for process failed"),
                Err(_) => tracing::warn!(
                    component = name,
                    timeout = ?stop_timeout,
                    "process ignored graceful stop; killing"
                ),
            }
        }

        if let Err(e) = proc.child.start_kill() {
            tracing::warn!(component = name, error = %e, "forced kill failed");
        }
        match time::timeout(kill_timeout, proc.child.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(component = name, error = %e, "waiting for killed process failed"),
            Err(_) => tracing::warn!(
                component = name,
                pid = proc.pid,
                timeout = ?kill_timeout,
                "process still alive after forced kill; abandoning handle"
            ),
        }
        true
    }

    /// Non-blocking liveness poll.
    pub async fn poll(&self, name: &str) -> ProcessStatus {
        let mut procs = self.procs.lock().await;
        let Some(proc) = procs.get_mut(name) else {
            return ProcessStatus::NotStarted;
        };
        match proc.child.try_wait() {
            Ok(None) => ProcessStatus::Running,
            Ok(Some(status)) => ProcessStatus::Exited {
                code: status.code(),
            },
            Err(e) => {
                tracing::warn!(component = name, error = %e, "liveness poll failed");
                ProcessStatus::Exited { code: None }
            }
        }
    }

    /// True iff the component's process is alive.
    pub async fn is_running(&self, name: &str) -> bool {
        self.poll(name).await == ProcessStatus::Running
    }

    /// PID of the tracked process, if any.
    pub async fn pid(&self, name: &str) -> Option<u32> {
        self.procs.lock().await.get(name).map(|p| p.pid)
    }

    /// Best-effort resource snapshot.
    ///
    /// Falls back to a minimal record (pid and cmdline only) when the process is
    /// gone or the platform offers no introspection.
    pub async fn info(&self, name: &str) -> ProcessInfo {
        let (pid, cmdline, started_at) = match self.procs.lock().await.get(name) {
            Some(p) => (Some(p.pid), p.cmdline.clone(), Some(p.started_at)),
            None => (None, String::new(), None),
        };

        let mut info = ProcessInfo {
            pid,
            status: "unknown".to_string(),
            cpu: 0.0,
            memory: 0,
            cmdline,
            started_at,
        };
        let Some(pid) = pid else { return info };

        let mut sys = sysinfo::System::new();
        let sys_pid = sysinfo::Pid::from_u32(pid);
        if sys.refresh_process(sys_pid) {
            if let Some(p) = sys.process(sys_pid) {
                info.status = p.status().to_string().to_lowercase();
                info.cpu = p.cpu_usage();
                info.memory = p.memory();
                if !p.cmd().is_empty() {
                    info.cmdline = p.cmd().join(" ");
                }
            }
        }
        info
    }

    /// Stops every tracked process (used during shutdown).
    pub async fn stop_all_handles(&self, stop_timeout: Duration, kill_timeout: Duration) {
        let names: Vec<String> = self.procs.lock().await.keys().cloned().collect();
        for name in names {
            self.stop(&name, stop_timeout, kill_timeout).await;
        }
    }
}

/// Forwards a child's output stream into `tracing`, one record per line.
fn drain_output<R>(component: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(component = %component, stream, "{line}");
        }
    });
}

#[cfg(unix)]
fn terminate(name: &str, pid: u32) -> Result<(), ProcessError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| ProcessError::Signal {
        component: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(not(unix))]
fn terminate(name: &str, _pid: u32) -> Result<(), ProcessError> {
    Err(ProcessError::Signal {
        component: name.to_string(),
        reason: "graceful termination unsupported on this platform".to_string(),
    })
}
