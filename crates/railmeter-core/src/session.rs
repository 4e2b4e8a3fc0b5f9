//! Sampling sessions.
//!
//! A session launches the diagnostics tool, reads its stdout line by line,
//! and folds every line into a [`RunningAccumulator`] until the monitoring
//! window elapses, the tool closes its output, or the caller raises a
//! [`StopToken`]. The child is terminated on every exit path, including
//! early returns and panics, by a guard that owns it.
//!
//! Reads block without a timeout; elapsed time and the stop token are
//! checked cooperatively between lines. A background helper forked by the
//! tool that inherits its stdout keeps the read open until the helper exits,
//! even after the window has elapsed.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::accumulator::{RunningAccumulator, summarize};
use crate::error::{MonitorError, Result};
use crate::extract::{PartialReading, SampleReading, extract};
use crate::report::{SessionResult, StopReason};
use crate::schema::DeviceSchema;

/// Diagnostics tool launched when no command is configured.
pub const DEFAULT_COMMAND: &str = "tegrastats";
/// Monitoring window used by the original measurement scripts.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
/// Time between SIGTERM and SIGKILL when tearing the tool down.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(500);

/// Number of stderr lines kept for diagnostics.
const STDERR_TAIL_LINES: usize = 8;
/// How long to wait for the stderr reader to catch up after teardown.
const STDERR_SETTLE: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Session config
// ---------------------------------------------------------------------------

/// Configuration for a sampling session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Executable to launch, by name (searched in PATH) or path. Run without arguments.
    pub command: String,
    /// Monitoring window.
    pub duration: Duration,
    /// Grace period between the polite and the forced termination signal.
    pub kill_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            duration: DEFAULT_DURATION,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "diagnostics command is empty".to_string(),
            ));
        }
        if self.duration.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "monitoring duration must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stop token
// ---------------------------------------------------------------------------

/// Cloneable cancellation flag checked between lines.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every session holding this token to stop after its current read.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Child process guard
// ---------------------------------------------------------------------------

/// Owns the diagnostics child. Dropping the guard terminates and reaps it.
struct ChildGuard {
    child: Option<Child>,
    command: String,
    grace: Duration,
}

impl ChildGuard {
    fn spawn(config: &SessionConfig) -> Result<(Self, ChildStdout, Option<ChildStderr>)> {
        let mut cmd = Command::new(&config.command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so teardown also reaches anything the tool forks.
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| MonitorError::ProcessLaunch {
            command: config.command.clone(),
            source,
        })?;

        let stderr = child.stderr.take();
        let Some(stdout) = child.stdout.take() else {
            // Unreachable with Stdio::piped(), but never leave the child behind.
            let _ = child.kill();
            let _ = child.wait();
            return Err(MonitorError::ProcessLaunch {
                command: config.command.clone(),
                source: std::io::Error::other("stdout was not captured"),
            });
        };

        let guard = Self {
            child: Some(child),
            command: config.command.clone(),
            grace: config.kill_grace,
        };
        Ok((guard, stdout, stderr))
    }

    fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Terminate and reap the child. Idempotent.
    fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        // Signal the group even if the leader is gone: forked helpers may remain.
        signal_group(&child, Signal::Terminate);
        match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("{} exited with {status}", self.command);
                return;
            }
            Ok(None) => {}
            Err(e) => log::debug!("could not poll {}: {e}", self.command),
        }

        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("{} terminated with {status}", self.command);
                    return;
                }
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(_) => break,
            }
        }

        log::debug!(
            "{} still running after {:?}, killing",
            self.command,
            self.grace
        );
        signal_group(&child, Signal::Kill);
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: Signal) {
    let sig = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: `kill` has no memory-safety preconditions. The negative id
    // addresses the group the child leads; a vanished group yields ESRCH.
    let rc = unsafe { libc::kill(-pgid, sig) };
    if rc != 0 {
        log::trace!(
            "signal {sig} to group {pgid}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn signal_group(child: &Child, signal: Signal) {
    // No process groups here; the forced kill in `terminate` does the work.
    let _ = (child, signal);
}

// ---------------------------------------------------------------------------
// Stderr capture
// ---------------------------------------------------------------------------

/// Background reader that logs the tool's stderr and keeps its last lines.
struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl StderrTail {
    fn spawn(stderr: ChildStderr, command: String) -> Self {
        let lines = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let sink = Arc::clone(&lines);
        let spawned = thread::Builder::new()
            .name("railmeter-stderr".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    log::debug!("{command} stderr: {line}");
                    if let Ok(mut tail) = sink.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            });

        let handle = match spawned {
            Ok(h) => Some(h),
            Err(e) => {
                log::warn!("could not start stderr reader: {e}");
                None
            }
        };
        Self { lines, handle }
    }

    /// Give the reader a moment to drain, then snapshot the tail.
    ///
    /// The reader is not joined unconditionally: a surviving grandchild can
    /// hold the pipe open indefinitely.
    fn finish(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + STDERR_SETTLE;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        self.lines
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Line ingestion
// ---------------------------------------------------------------------------

/// Extract one line, log its malformed values, and fold it into `acc`.
pub(crate) fn ingest_line(
    schema: &DeviceSchema,
    acc: &mut RunningAccumulator,
    line: &str,
) -> PartialReading {
    log::trace!("raw line: {}", line.trim_end());
    let reading = extract(schema, line);
    for warning in reading.malformed() {
        log::warn!("skipping malformed sample: {warning}");
    }
    acc.fold(&reading);
    reading
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

type Observer<'a> = Box<dyn FnMut(&SampleReading) + 'a>;

/// One bounded monitoring run against one device schema.
pub struct Session<'a> {
    schema: &'a DeviceSchema,
    config: SessionConfig,
    stop: StopToken,
    observer: Option<Observer<'a>>,
}

impl<'a> Session<'a> {
    pub fn new(schema: &'a DeviceSchema, config: SessionConfig) -> Self {
        Self {
            schema,
            config,
            stop: StopToken::new(),
            observer: None,
        }
    }

    /// Use a caller-owned stop token for early cancellation.
    pub fn with_stop_token(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    /// Call `f` for every line that produced at least one rail value.
    pub fn on_sample(mut self, f: impl FnMut(&SampleReading) + 'a) -> Self {
        self.observer = Some(Box::new(f));
        self
    }

    /// Run the session to completion.
    ///
    /// Fails only if the configuration is invalid or the tool cannot be
    /// launched. An early end of the tool's output is reported through
    /// [`SessionResult::stop_reason`].
    pub fn run(mut self) -> Result<SessionResult> {
        self.config.validate()?;

        let (mut guard, stdout, stderr) = ChildGuard::spawn(&self.config)?;
        let stderr_tail = stderr.map(|s| StderrTail::spawn(s, self.config.command.clone()));
        log::debug!(
            "started {} (pid {:?}) for {:?} on {}",
            self.config.command,
            guard.id(),
            self.config.duration,
            self.schema.tag()
        );

        let mut acc = RunningAccumulator::new(self.schema);
        let start = Instant::now();
        let stop_reason = self.sample_loop(BufReader::new(stdout), &mut acc, start);
        let elapsed = start.elapsed();
        guard.terminate();

        let mut result = summarize(&acc, elapsed, stop_reason);
        result.stderr_tail = stderr_tail.map(StderrTail::finish).unwrap_or_default();

        if stop_reason == StopReason::StreamEnded {
            match result.stderr_tail.last() {
                Some(last) => log::warn!(
                    "{} stopped producing output after {:.2}s: {last}",
                    self.config.command,
                    elapsed.as_secs_f64()
                ),
                None => log::info!(
                    "{} stopped producing output after {:.2}s",
                    self.config.command,
                    elapsed.as_secs_f64()
                ),
            }
        }
        log::debug!(
            "session on {} ended ({stop_reason}): {} samples from {} lines",
            self.schema.tag(),
            result.sample_count,
            result.lines_read
        );
        Ok(result)
    }

    fn sample_loop<R: BufRead>(
        &mut self,
        mut reader: R,
        acc: &mut RunningAccumulator,
        start: Instant,
    ) -> StopReason {
        let mut buf = Vec::new();
        loop {
            if self.stop.is_stopped() {
                return StopReason::Cancelled;
            }
            if start.elapsed() >= self.config.duration {
                return StopReason::WindowElapsed;
            }

            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => return StopReason::StreamEnded,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("reading {} output failed: {e}", self.config.command);
                    return StopReason::StreamEnded;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            let reading = ingest_line(self.schema, acc, &line);
            if reading.is_empty() {
                continue;
            }
            if let Some(observer) = self.observer.as_mut() {
                observer(&SampleReading {
                    elapsed: start.elapsed(),
                    reading,
                });
            }
        }
    }
}
