// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution: capture, streaming, and open-stream modes.

use crate::{CancelFn, DriverError, ProgressFn};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// How often the cancel predicate is polled while a child runs.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Chunk size for open-stream reads.
const STREAM_CHUNK: usize = 64 * 1024;

/// Synthetic returncode for a deadline kill.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Synthetic returncode for a cooperative cancel kill.
pub const EXIT_CANCELLED: i32 = 130;

/// Outcome of one driver invocation.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Full command line, binary first.
    pub args: Vec<String>,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    /// Rendering of the command line for logs and errors.
    pub fn command_line(&self) -> String {
        command_line(&self.args)
    }

    /// Trimmed stderr for error reporting.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

pub(crate) fn command_line(args: &[String]) -> String {
    args.join(" ")
}

fn build_command(args: &[String]) -> Command {
    let mut cmd = Command::new(&args[0]);
    cmd.args(&args[1..])
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

fn append_line(buffer: &mut String, line: &str) {
    buffer.push('\n');
    buffer.push_str(line);
}

/// Run a command to completion under a deadline.
///
/// A deadline kill is not an error: it yields returncode 124 with a
/// synthetic stderr line, so callers can treat it like any other failed
/// exit. The child is reaped when the in-flight future drops.
pub(crate) async fn run_capture(
    args: &[String],
    timeout: Duration,
) -> Result<CommandResult, DriverError> {
    let start = Instant::now();
    let mut cmd = build_command(args);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(DriverError::Spawn {
                command: command_line(args),
                source,
            })
        }
        Err(_elapsed) => {
            let mut stderr = String::new();
            append_line(&mut stderr, &format!("Timed out after {}s", timeout.as_secs()));
            return Ok(CommandResult {
                args: args.to_vec(),
                returncode: EXIT_TIMED_OUT,
                stdout: String::new(),
                stderr,
                duration_ms: start.elapsed().as_millis() as u64,
                timed_out: true,
            });
        }
    };

    Ok(CommandResult {
        args: args.to_vec(),
        returncode: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out: false,
    })
}

enum StreamEnd {
    Exited(i32),
    Cancelled,
    TimedOut,
}

/// Spawn a child, drain stderr line-by-line through `progress`, and poll
/// the cancel predicate while it runs.
///
/// Three terminations: normal exit (real returncode), cancel (kill,
/// returncode 130, stderr gains "Cancelled by user"), deadline (kill,
/// returncode 124, stderr gains "Timed out after Ns"). Only a spawn
/// failure is an error.
pub(crate) async fn run_streaming(
    args: &[String],
    progress: Option<ProgressFn>,
    should_cancel: Option<CancelFn>,
    timeout: Duration,
) -> Result<CommandResult, DriverError> {
    let start = Instant::now();
    let mut cmd = build_command(args);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| DriverError::Spawn {
        command: command_line(args),
        source,
    })?;

    let stdout = child.stdout.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut out) = stdout {
            let _ = out.read_to_string(&mut buf).await;
        }
        buf
    });

    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(err) = stderr {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(callback) = &progress {
                    callback(&line);
                }
                collected.push_str(&line);
                collected.push('\n');
            }
        }
        collected
    });

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut poll = tokio::time::interval(CANCEL_POLL);

    let end = loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| DriverError::Spawn {
                    command: command_line(args),
                    source,
                })?;
                break StreamEnd::Exited(status.code().unwrap_or(-1));
            }
            _ = &mut deadline => {
                let _ = child.kill().await;
                break StreamEnd::TimedOut;
            }
            _ = poll.tick() => {
                if should_cancel.as_ref().is_some_and(|cancel| cancel()) {
                    let _ = child.kill().await;
                    break StreamEnd::Cancelled;
                }
            }
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let mut stderr = stderr_task.await.unwrap_or_default();

    let (returncode, timed_out) = match end {
        StreamEnd::Exited(code) => (code, false),
        StreamEnd::Cancelled => {
            append_line(&mut stderr, "Cancelled by user");
            (EXIT_CANCELLED, false)
        }
        StreamEnd::TimedOut => {
            append_line(&mut stderr, &format!("Timed out after {}s", timeout.as_secs()));
            (EXIT_TIMED_OUT, true)
        }
    };

    Ok(CommandResult {
        args: args.to_vec(),
        returncode,
        stdout,
        stderr,
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out,
    })
}

struct ChildStream {
    child: tokio::process::Child,
    stdout: Option<tokio::process::ChildStdout>,
    stderr_task: Option<tokio::task::JoinHandle<String>>,
    command: String,
    finished: bool,
}

enum StreamSource {
    Child(Box<ChildStream>),
    #[cfg(any(test, feature = "test-support"))]
    Memory { data: Vec<u8>, offset: usize },
}

/// Live read handle over a streaming invocation's stdout.
///
/// Yields chunks until EOF; at EOF the child is reaped and a non-zero
/// exit surfaces as an error. Dropping the handle (or calling
/// [`DriverStream::close`]) kills a still-live child.
pub struct DriverStream {
    inner: StreamSource,
}

impl DriverStream {
    pub(crate) fn spawn(args: &[String]) -> Result<Self, DriverError> {
        let mut cmd = build_command(args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|source| DriverError::Spawn {
            command: command_line(args),
            source,
        })?;

        let stdout = child.stdout.take();
        // Drain stderr eagerly so a chatty child cannot deadlock on a
        // full pipe; the collected text feeds the EOF error, if any.
        let stderr_task = child.stderr.take().map(|err| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let mut reader = BufReader::new(err);
                let _ = reader.read_to_string(&mut buf).await;
                buf
            })
        });

        Ok(Self {
            inner: StreamSource::Child(Box::new(ChildStream {
                child,
                stdout,
                stderr_task,
                command: command_line(args),
                finished: false,
            })),
        })
    }

    /// An in-memory stream for tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            inner: StreamSource::Memory { data, offset: 0 },
        }
    }

    /// Read the next chunk; `None` signals EOF after a clean exit.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, DriverError> {
        match &mut self.inner {
            StreamSource::Child(stream) => {
                if stream.finished {
                    return Ok(None);
                }
                if let Some(out) = &mut stream.stdout {
                    let mut buf = vec![0u8; STREAM_CHUNK];
                    let read = out.read(&mut buf).await.map_err(|source| DriverError::Spawn {
                        command: stream.command.clone(),
                        source,
                    })?;
                    if read > 0 {
                        buf.truncate(read);
                        return Ok(Some(buf));
                    }
                }
                stream.finished = true;
                stream.stdout = None;
                let status = stream.child.wait().await.map_err(|source| DriverError::Spawn {
                    command: stream.command.clone(),
                    source,
                })?;
                if status.success() {
                    return Ok(None);
                }
                let stderr = match stream.stderr_task.take() {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };
                Err(DriverError::CommandFailed {
                    command: stream.command.clone(),
                    stderr: stderr.trim().to_string(),
                })
            }
            #[cfg(any(test, feature = "test-support"))]
            StreamSource::Memory { data, offset } => {
                if *offset >= data.len() {
                    return Ok(None);
                }
                let end = (*offset + STREAM_CHUNK).min(data.len());
                let chunk = data[*offset..end].to_vec();
                *offset = end;
                Ok(Some(chunk))
            }
        }
    }

    /// Kill a still-live child. Dropping the handle has the same effect.
    pub async fn close(&mut self) {
        if let StreamSource::Child(stream) = &mut self.inner {
            if !stream.finished {
                let _ = stream.child.kill().await;
                stream.finished = true;
            }
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
