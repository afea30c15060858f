//! Lifecycle owner for the backend engine process.
//!
//! ```text
//! NotStarted --spawn--> Spawning --confirmed--> Running --exit--> Exited
//!                          |                       |
//!                          +------ error ----------+--> Failed
//! ```
//!
//! A new cycle may only start from `NotStarted`, `Exited` or `Failed`. The child is
//! killed when the supervisor shuts down or is dropped, whichever comes first.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::launch::LaunchSpec;
use crate::log_line::{classify_line, forward, LineAssembler, LogSeverity};

/// Grace period for the output readers to drain after the child exits.
const CAPTURE_DRAIN: Duration = Duration::from_millis(500);
const CHUNK_SIZE: usize = 4096;

/// Lifecycle state of one supervised backend instance.
/// 單一受監督後端實例的生命週期狀態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Spawning,
    Running,
    Exited,
    Failed,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Exited | ProcessState::Failed)
    }

    /// Whether a fresh `spawn` is allowed from this state.
    pub fn can_spawn(self) -> bool {
        self == ProcessState::NotStarted || self.is_terminal()
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::NotStarted => "not started",
            ProcessState::Spawning => "spawning",
            ProcessState::Running => "running",
            ProcessState::Exited => "exited",
            ProcessState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One classified line of backend output.
/// 一行已分類的後端輸出。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendLine {
    pub stream: OutputStream,
    pub severity: LogSeverity,
    pub message: String,
}

/// How the backend process ended.
/// 後端程序結束的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    /// True when the exit was requested through [`ProcessSupervisor::shutdown`].
    pub expected: bool,
}

impl ExitReport {
    /// An exit nobody asked for.
    pub fn is_crash(&self) -> bool {
        !self.expected
    }

    fn from_status(status: std::process::ExitStatus, expected: bool) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
            expected,
        }
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// Errors surfaced by the supervisor.
/// 監督者可能回報的錯誤。
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("backend already {0}; shut it down before spawning another")]
    AlreadyActive(ProcessState),
    #[error("failed to spawn backend '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("backend '{program}' was not reported running by the operating system")]
    Unconfirmed { program: String },
    #[error("no backend process is running")]
    NotRunning,
    #[error("backend exited unexpectedly ({0})")]
    Crashed(ExitReport),
    #[error("failed to wait for backend: {0}")]
    Wait(#[source] io::Error),
    #[error("failed to terminate backend: {0}")]
    Kill(#[source] io::Error),
}

/// Spawns, watches and tears down the backend process.
/// 負責啟動、監看並終止後端程序。
pub struct ProcessSupervisor {
    state: ProcessState,
    child: Option<Child>,
    pid: Option<u32>,
    capture: Vec<JoinHandle<()>>,
    line_tap: Option<UnboundedSender<BackendLine>>,
    stopping: bool,
    /// Exit observed by a `wait_exit` that was cancelled before it could return it.
    unreported: Option<ExitReport>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self {
            state: ProcessState::NotStarted,
            child: None,
            pid: None,
            capture: Vec::new(),
            line_tap: None,
            stopping: false,
            unreported: None,
        }
    }

    /// Mirrors every classified output line to `tap` in addition to the log.
    pub fn with_line_tap(mut self, tap: UnboundedSender<BackendLine>) -> Self {
        self.line_tap = Some(tap);
        self
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    /// Starts the backend and returns its pid once the OS reports it running.
    /// 啟動後端，並在作業系統回報程序執行後回傳 pid。
    ///
    /// Must be called from within a tokio runtime; output capture runs on spawned tasks.
    pub fn spawn(&mut self, spec: &LaunchSpec) -> Result<u32, SupervisorError> {
        if !self.state.can_spawn() {
            warn!(state = %self.state, "rejected spawn while backend is active");
            return Err(SupervisorError::AlreadyActive(self.state));
        }

        self.state = ProcessState::Spawning;
        self.stopping = false;
        self.unreported = None;
        for stale in self.capture.drain(..) {
            stale.abort();
        }
        info!(command = %spec.display(), "starting backend");

        let mut child = match spec.to_command().spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state = ProcessState::Failed;
                error!(program = %spec.program, error = %source, "backend spawn failed");
                return Err(SupervisorError::Spawn {
                    program: spec.program.clone(),
                    source,
                });
            }
        };

        let Some(pid) = child.id() else {
            self.state = ProcessState::Failed;
            return Err(SupervisorError::Unconfirmed {
                program: spec.program.clone(),
            });
        };

        if let Some(stdout) = child.stdout.take() {
            let handle = self.start_capture(stdout, OutputStream::Stdout);
            self.capture.push(handle);
        }
        if let Some(stderr) = child.stderr.take() {
            let handle = self.start_capture(stderr, OutputStream::Stderr);
            self.capture.push(handle);
        }

        self.child = Some(child);
        self.pid = Some(pid);
        self.state = ProcessState::Running;
        info!(pid, "backend process spawned");
        Ok(pid)
    }

    fn start_capture<R>(&self, reader: R, stream: OutputStream) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let tap = self.line_tap.clone();
        tokio::spawn(capture_output(reader, stream, tap))
    }

    /// Waits until the backend exits; cancel-safe.
    /// 等待後端結束；可安全取消。
    ///
    /// The exit is recorded before the output readers are drained, so a call dropped
    /// during the drain leaves the report for the next call to return.
    pub async fn wait_exit(&mut self) -> Result<ExitReport, SupervisorError> {
        let Some(child) = self.child.as_mut() else {
            return self
                .collect_unreported()
                .await
                .ok_or(SupervisorError::NotRunning);
        };
        let status = child.wait().await;
        self.child = None;
        self.pid = None;
        match status {
            Ok(status) => {
                let report = ExitReport::from_status(status, self.stopping);
                self.state = ProcessState::Exited;
                self.unreported = Some(report);
                if report.is_crash() {
                    error!(%report, "backend exited unexpectedly");
                } else {
                    info!(%report, "backend exited");
                }
                self.drain_capture().await;
                self.unreported = None;
                Ok(report)
            }
            Err(err) => {
                self.state = ProcessState::Failed;
                self.drain_capture().await;
                Err(SupervisorError::Wait(err))
            }
        }
    }

    /// Kills the backend if it is still alive and waits for it.
    /// 若後端仍在執行則強制終止並等待其結束。
    pub async fn shutdown(&mut self) -> Result<Option<ExitReport>, SupervisorError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(self.collect_unreported().await);
        };
        self.stopping = true;
        info!(pid = ?self.pid, "terminating backend");
        if let Err(err) = child.start_kill() {
            // InvalidInput means the child has already been reaped.
            if err.kind() != io::ErrorKind::InvalidInput {
                return Err(SupervisorError::Kill(err));
            }
        }
        self.wait_exit().await.map(Some)
    }

    async fn collect_unreported(&mut self) -> Option<ExitReport> {
        self.unreported?;
        self.drain_capture().await;
        self.unreported.take()
    }

    async fn drain_capture(&mut self) {
        while let Some(handle) = self.capture.pop() {
            if tokio::time::timeout(CAPTURE_DRAIN, handle).await.is_err() {
                debug!("backend output reader still open after exit");
            }
        }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            warn!(pid = ?self.pid, "supervisor dropped with live backend, killing it");
            let _ = child.start_kill();
        }
        for handle in &self.capture {
            handle.abort();
        }
    }
}

async fn capture_output<R>(
    mut reader: R,
    stream: OutputStream,
    tap: Option<UnboundedSender<BackendLine>>,
) where
    R: AsyncRead + Unpin,
{
    let mut assembler = LineAssembler::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(read) => {
                for line in assembler.push(&buffer[..read]) {
                    emit(&line, stream, tap.as_ref());
                }
            }
            Err(err) => {
                debug!(?stream, error = %err, "backend output stream closed");
                break;
            }
        }
    }
    if let Some(line) = assembler.finish() {
        emit(&line, stream, tap.as_ref());
    }
}

fn emit(line: &str, stream: OutputStream, tap: Option<&UnboundedSender<BackendLine>>) {
    let (severity, message) = classify_line(line);
    forward(severity, message);
    if let Some(tap) = tap {
        let _ = tap.send(BackendLine {
            stream,
            severity,
            message: message.to_string(),
        });
    }
}
