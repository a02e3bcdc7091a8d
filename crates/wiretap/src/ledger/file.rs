use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::LedgerError;

/// Exclusive writer for the capture log.
///
/// The mutex is the only serialization point for record output: whatever is
/// built and written while it is held lands in the file as one contiguous
/// line. `None` means the sink was closed and appends are discarded.
pub(super) struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    /// Creates or truncates the log. Owner-only permissions on unix.
    pub(super) fn open(path: &Path) -> Result<Self, LedgerError> {
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path).map_err(|source| LedgerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "capture log opened");
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `build` and writes its output while holding the writer lock.
    ///
    /// `build` is only called when the sink is still open, so anything it
    /// allocates (record IDs in particular) is only spent on lines that are
    /// actually attempted.
    pub(super) fn append_with(&self, build: impl FnOnce() -> Option<Vec<u8>>) {
        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            return;
        };
        let Some(line) = build() else {
            return;
        };
        match write_whole_line(file, &line, |file, len| file.set_len(len)) {
            Ok(()) => {}
            Err(LineWriteError::RolledBack(e)) => {
                warn!(path = %self.path.display(), %e, "failed to append capture record");
            }
            Err(LineWriteError::Torn(e)) => {
                warn!(
                    path = %self.path.display(),
                    %e,
                    "capture log left with a partial record; closing it"
                );
                *guard = None;
            }
        }
    }

    pub(super) fn flush(&self) -> Result<(), LedgerError> {
        let mut guard = self.file.lock();
        if let Some(file) = guard.as_mut() {
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Flushes and releases the file. Later appends are dropped.
    pub(super) fn close(&self) -> Result<(), LedgerError> {
        let Some(mut file) = self.file.lock().take() else {
            return Ok(());
        };
        file.flush()?;
        file.sync_all()?;
        info!(path = %self.path.display(), "capture log closed");
        Ok(())
    }
}

enum LineWriteError {
    /// Nothing of the line remains in the file.
    RolledBack(io::Error),
    /// Part of the line could not be removed again.
    Torn(io::Error),
}

/// Writes `line` completely or not at all: after a failed write the output is
/// cut back to where the line began, so the next line starts clean.
fn write_whole_line<W: Write + Seek>(
    out: &mut W,
    line: &[u8],
    truncate: impl FnOnce(&mut W, u64) -> io::Result<()>,
) -> Result<(), LineWriteError> {
    let start = out.stream_position().map_err(LineWriteError::RolledBack)?;
    let Err(e) = out.write_all(line) else {
        return Ok(());
    };
    if truncate(out, start).is_err() || out.seek(SeekFrom::Start(start)).is_err() {
        return Err(LineWriteError::Torn(e));
    }
    Err(LineWriteError::RolledBack(e))
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), %e, "failed to close capture log");
        }
    }
}
