//! Scoped external processes
//!
//! `git`, the extractor and the line counter are opaque tools. Long runs are
//! streamed line by line (stdout and stderr merged in arrival order) so a
//! multi-hour extraction stays observable, and the child is killed and reaped
//! if the handle is dropped before the process finished.

use crate::{Error, Result};
use crossbeam::channel::{self, Sender};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A running tool process that is always reaped
pub struct ScopedChild {
    tool: String,
    child: Option<Child>,
}

impl ScopedChild {
    /// Spawn `command` with both output pipes captured and stdin closed
    pub fn spawn(command: &mut Command, tool: &str) -> Result<Self> {
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::ToolLaunch {
                tool: tool.to_string(),
                source,
            })?;
        tracing::debug!(tool, pid = child.id(), "spawned");
        Ok(Self {
            tool: tool.to_string(),
            child: Some(child),
        })
    }

    /// Forward every output line to `on_line` as it arrives, then wait for
    /// the process and turn a non-zero exit into `ToolFailure`.
    pub fn stream_lines(mut self, mut on_line: impl FnMut(Stream, &str)) -> Result<()> {
        let child = match self.child.as_mut() {
            Some(child) => child,
            None => return Ok(()),
        };
        let (tx, rx) = channel::unbounded::<(Stream, String)>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward(stderr, Stream::Stderr, tx.clone()));
        }
        // The loop below ends once both reader threads hang up
        drop(tx);

        for (stream, line) in rx {
            on_line(stream, &line);
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait()?;
        self.child = None;
        check_status(&self.tool, status)
    }
}

impl Drop for ScopedChild {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                tracing::warn!(tool = %self.tool, pid = child.id(), "killing unfinished process");
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

fn forward<R: Read + Send + 'static>(
    pipe: R,
    stream: Stream,
    tx: Sender<(Stream, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Map an exit status onto the error taxonomy
pub fn check_status(tool: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::ToolFailure {
            tool: tool.to_string(),
            status: describe(status),
        })
    }
}

/// Run a short-lived tool to completion and return its stdout
pub fn run_captured(command: &mut Command, tool: &str) -> Result<Vec<u8>> {
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|source| Error::ToolLaunch {
            tool: tool.to_string(),
            source,
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ToolFailure {
            tool: tool.to_string(),
            status: format!("{}: {}", describe(output.status), stderr.trim()),
        });
    }
    Ok(output.stdout)
}
