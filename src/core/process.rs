//! Child process management - spawn a program with piped output
//!
//! Two reader tasks forward stdout/stderr chunks into one channel, so the
//! receiver sees chunks in the order they arrived.

use super::output::{OutputChunk, Stream};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// A running child process and its output channel
pub struct SpawnedProcess {
    child: Child,
    output_rx: mpsc::UnboundedReceiver<OutputChunk>,
}

impl SpawnedProcess {
    /// Spawn `program args...` in `dir`.
    pub fn spawn(dir: &Path, program: &str, args: &[String]) -> io::Result<Self> {
        log::debug!("Spawning {} {:?} in {}", program, args, dir.display());

        let mut child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward(stderr, Stream::Stderr, tx));
        }

        Ok(Self {
            child,
            output_rx: rx,
        })
    }

    /// OS process id, if the child is still known to the OS.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait until both streams close and the process exits.
    ///
    /// Returns every chunk in arrival order along with the exit status. The
    /// chunks are kept even when waiting on the child fails.
    pub async fn wait(mut self) -> (Vec<OutputChunk>, io::Result<ExitStatus>) {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.output_rx.recv().await {
            chunks.push(chunk);
        }

        let status = self.child.wait().await;
        (chunks, status)
    }
}

async fn forward<R>(mut reader: R, stream: Stream, tx: mpsc::UnboundedSender<OutputChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(OutputChunk::new(stream, &buf[..n])).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("Failed reading child {:?}: {}", stream, e);
                break;
            }
        }
    }
}
