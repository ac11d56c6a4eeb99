//! External command execution utilities.
//!
//! Provides a Builder-based API for running external compressors with
//! stdin piping and a deadline.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let output = Cmd::new("csso")
//!     .args(["--comments", "none"])
//!     .stdin(source)
//!     .timeout(Duration::from_secs(10))
//!     .run()?;
//! ```

use anyhow::{Context, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use regex::Regex;
use std::{
    ffi::{OsStr, OsString},
    io::{Read, Write},
    process::{Command, Output, Stdio},
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};

/// Deadline used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How often an exited-stdout process is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    stdin_data: Vec<u8>,
    timeout: Duration,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            stdin_data: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Set stdin data to pipe to the process.
    pub fn stdin<D: AsRef<[u8]>>(mut self, data: D) -> Self {
        self.stdin_data = data.as_ref().to_vec();
        self
    }

    /// Kill the process if it has not exited by then.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the program name for error messages.
    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Execute the command and return output.
    ///
    /// Fails on spawn errors, non-zero exit status and timeouts.
    pub fn run(self) -> Result<Output> {
        let name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        // Writing stdin inline would block once the stdout pipe fills
        let stdin_writer = child.stdin.take().map(|mut stdin| {
            let data = self.stdin_data;
            thread::spawn(move || stdin.write_all(&data))
        });

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        let (tx, rx) = channel::bounded(1);
        if let Some(mut stdout) = child.stdout.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let result = stdout.read_to_end(&mut buf).map(|_| buf);
                let _ = tx.send(result);
            });
        }

        let deadline = Instant::now() + self.timeout;
        let stdout = match rx.recv_deadline(deadline) {
            Ok(result) => result.with_context(|| format!("Failed to read output of `{name}`"))?,
            Err(RecvTimeoutError::Timeout) => {
                child.kill().ok();
                child.wait().ok();
                anyhow::bail!("Command `{name}` timed out after {:?}", self.timeout);
            }
            Err(RecvTimeoutError::Disconnected) => Vec::new(),
        };

        // Closing stdout does not mean the process has exited
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("Failed to wait for `{name}`"))?
            {
                break status;
            }
            if Instant::now() >= deadline {
                child.kill().ok();
                child.wait().ok();
                anyhow::bail!("Command `{name}` timed out after {:?}", self.timeout);
            }
            thread::sleep(POLL_INTERVAL);
        };

        if let Some(handle) = stdin_writer {
            // A tool may exit before consuming all input; its exit status decides
            let _ = handle.join();
        }
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let output = Output {
            status,
            stdout,
            stderr,
        };

        if !output.status.success() {
            anyhow::bail!(format_error(&name, &output));
        }

        Ok(output)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Strip ANSI escape codes from string.
fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid regex"));
    re.replace_all(s, "")
}

/// Format error message for failed command.
fn format_error(name: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let error_msg = strip_ansi(stderr.trim());

    let mut msg = format!("Command `{name}` failed with {}", output.status);
    if !error_msg.is_empty() {
        msg.push('\n');
        msg.push_str(&error_msg);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================
