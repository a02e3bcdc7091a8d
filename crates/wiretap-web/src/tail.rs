use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::TailError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_LINE_BUFFER: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TailConfig {
    /// How long to wait at end of file before looking for more bytes.
    pub poll_interval: Duration,
    /// Complete lines buffered between the tail task and its consumer.
    pub line_buffer: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            line_buffer: DEFAULT_LINE_BUFFER,
        }
    }
}

/// Follows a growing file from byte 0, one complete line at a time.
///
/// Bytes past the last newline stay buffered until the rest of their line is
/// written, so a record caught mid-append is never handed out. Each tail owns
/// its own cursor.
pub struct LogTail {
    reader: BufReader<File>,
    pending: Vec<u8>,
    poll_interval: Duration,
}

impl LogTail {
    pub async fn open(path: impl AsRef<Path>, config: TailConfig) -> Result<Self, TailError> {
        let file = File::open(path).await?;
        Ok(Self::new(file, config))
    }

    pub fn new(file: File, config: TailConfig) -> Self {
        Self {
            reader: BufReader::new(file),
            pending: Vec::new(),
            poll_interval: config.poll_interval,
        }
    }

    /// Waits for the next complete line, without its line terminator.
    ///
    /// Returns `Ok(None)` once `cancel` fires, including while sleeping at end
    /// of file. Invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, TailError> {
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                read = self.reader.read_until(b'\n', &mut self.pending) => read?,
            };

            if self.pending.last() == Some(&b'\n') {
                return Ok(Some(self.take_line()));
            }

            if read == 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(None),
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        let mut end = self.pending.len();
        if self.pending[..end].ends_with(b"\n") {
            end -= 1;
        }
        if self.pending[..end].ends_with(b"\r") {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&self.pending[..end]).into_owned();
        self.pending.clear();
        line
    }
}

/// Runs `tail` on its own task, feeding complete lines into a bounded channel.
///
/// The task ends when `cancel` fires, when the receiver is dropped, or after
/// forwarding a read error. The file is closed before the task finishes, so
/// awaiting the handle guarantees the log is released.
pub fn spawn_tail(
    mut tail: LogTail,
    line_buffer: usize,
    cancel: CancellationToken,
) -> (mpsc::Receiver<Result<String, TailError>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(line_buffer.max(1));
    let task = tokio::spawn(async move {
        loop {
            let item = match tail.next_line(&cancel).await {
                Ok(Some(line)) => Ok(line),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            let failed = item.is_err();
            let delivered = tokio::select! {
                _ = cancel.cancelled() => false,
                sent = tx.send(item) => sent.is_ok(),
            };
            if failed || !delivered {
                break;
            }
        }
        drop(tail);
        debug!("log tail stopped");
    });
    (rx, task)
}
