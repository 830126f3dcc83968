//! Output sink - the terminal (or buffer) every task writes its block to
//!
//! Writers sit behind a single mutex. Each announcement or output block is
//! written while holding the lock once, so blocks from concurrent tasks can
//! never interleave.

use crossterm::style::Stylize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Which child stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Raw bytes read from a child, tagged with their stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: Stream,
    pub bytes: Vec<u8>,
}

impl OutputChunk {
    pub fn new(stream: Stream, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            stream,
            bytes: bytes.into(),
        }
    }
}

struct Writers {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

/// Shared handle to the combined output stream
#[derive(Clone)]
pub struct OutputSink {
    writers: Arc<Mutex<Writers>>,
    color: bool,
}

impl OutputSink {
    /// Sink writing to this process's stdout/stderr.
    pub fn stdio(color: bool) -> Self {
        Self::from_writers(Box::new(io::stdout()), Box::new(io::stderr()), color)
    }

    /// Sink writing both streams into one in-memory buffer.
    pub fn capture() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        let sink = Self::from_writers(
            Box::new(captured.clone()),
            Box::new(captured.clone()),
            false,
        );
        (sink, captured)
    }

    pub fn from_writers(
        stdout: Box<dyn Write + Send>,
        stderr: Box<dyn Write + Send>,
        color: bool,
    ) -> Self {
        Self {
            writers: Arc::new(Mutex::new(Writers { stdout, stderr })),
            color,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Writers> {
        // Poisoned locks are still usable for plain writes
        self.writers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prefix(&self) -> String {
        if self.color {
            format!("{} ", ">>".cyan())
        } else {
            ">> ".to_string()
        }
    }

    /// Write one `>> ` status line, preceded by a blank line.
    pub fn status(&self, message: &str) -> io::Result<()> {
        let prefix = self.prefix();
        let mut writers = self.lock();
        write!(writers.stdout, "\n{}{}\n", prefix, message)?;
        writers.stdout.flush()
    }

    /// Write a header and the buffered chunks as one indivisible block.
    pub fn block(&self, header: &str, chunks: &[OutputChunk]) -> io::Result<()> {
        let prefix = self.prefix();
        let mut writers = self.lock();

        write!(writers.stdout, "\n{}{}\n\n", prefix, header)?;
        writers.stdout.flush()?;
        for chunk in chunks {
            let writer = match chunk.stream {
                Stream::Stdout => &mut writers.stdout,
                Stream::Stderr => &mut writers.stderr,
            };
            writer.write_all(&chunk.bytes)?;
            writer.flush()?;
        }

        Ok(())
    }
}

/// In-memory output shared between a capture sink and the test reading it
#[derive(Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn bytes(&self) -> Vec<u8> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_keeps_chunk_order_across_streams() {
        let (sink, captured) = OutputSink::capture();
        sink.block(
            "From a",
            &[
                OutputChunk::new(Stream::Stdout, "one\n"),
                OutputChunk::new(Stream::Stderr, "two\n"),
                OutputChunk::new(Stream::Stdout, "three\n"),
            ],
        )
        .unwrap();

        assert_eq!(captured.contents(), "\n>> From a\n\none\ntwo\nthree\n");
    }

    #[test]
    fn test_status_line() {
        let (sink, captured) = OutputSink::capture();
        sink.status("Running [default] on x").unwrap();
        assert_eq!(captured.contents(), "\n>> Running [default] on x\n");
    }

    #[test]
    fn test_stderr_goes_to_stderr_writer() {
        let out = CapturedOutput::default();
        let err = CapturedOutput::default();
        let sink = OutputSink::from_writers(Box::new(out.clone()), Box::new(err.clone()), false);

        sink.block("h", &[OutputChunk::new(Stream::Stderr, "oops")]).unwrap();

        assert_eq!(out.contents(), "\n>> h\n\n");
        assert_eq!(err.contents(), "oops");
    }
}
