//! Line transports between the protocol client and an engine.
//!
//! The client only needs to write a line and read the next line; everything
//! protocol-specific lives in [`crate::engine`]. [`ProcessTransport`] talks to
//! a child process over its piped stdin/stdout. Tests plug in scripted
//! transports instead.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// How long `close` waits for the process to exit after `quit` before killing it.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// A bidirectional, newline-delimited channel to one engine.
#[async_trait]
pub trait EngineTransport: Send {
    /// Write one command line. The transport appends the newline.
    async fn send(&mut self, line: &str) -> io::Result<()>;

    /// Read the next output line, trimmed. `Ok(None)` means the engine closed
    /// its output.
    async fn next_line(&mut self) -> io::Result<Option<String>>;

    /// Release the underlying resources after `quit` has been sent.
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Engine running as a child process.
pub struct ProcessTransport {
    /// The engine process handle.
    child: Child,
    /// Writer for sending commands to the engine.
    stdin: ChildStdin,
    /// Line reader over the engine's stdout.
    stdout: Lines<BufReader<ChildStdout>>,
}

impl ProcessTransport {
    /// Spawn the engine executable with piped stdin/stdout.
    ///
    /// The process is killed if the transport is dropped without `close`.
    pub fn spawn<P: AsRef<Path>>(program: P, args: &[String]) -> io::Result<Self> {
        let mut child = Command::new(program.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin unavailable"))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "engine stdout unavailable")
        })?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// OS process id, if the process is still running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl EngineTransport for ProcessTransport {
    async fn send(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self
            .stdout
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    async fn close(&mut self) -> io::Result<()> {
        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => status.map(|_| ()),
            Err(_) => self.child.kill().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_nonexistent_executable_returns_error() {
        match ProcessTransport::spawn("/nonexistent/path/to/engine", &[]) {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            Ok(_) => panic!("Expected spawn to fail"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_transport_echoes_lines() {
        let mut transport = ProcessTransport::spawn("cat", &[]).unwrap();
        assert!(transport.pid().is_some());

        transport.send("uciok").await.unwrap();
        assert_eq!(transport.next_line().await.unwrap().as_deref(), Some("uciok"));

        transport.send("  readyok  ").await.unwrap();
        assert_eq!(
            transport.next_line().await.unwrap().as_deref(),
            Some("readyok")
        );
    }
}
