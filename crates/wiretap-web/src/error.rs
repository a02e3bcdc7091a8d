use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum TailError {
    Io(io::Error),
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read capture log: {err}"),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for TailError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Why a distribution session ended abnormally. The same text is sent to the
/// viewer as its close reason.
#[derive(Debug)]
pub enum SessionError {
    LogUnavailable { path: PathBuf, source: io::Error },
    ReadFailed(TailError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogUnavailable { path, source } => {
                write!(f, "capture log {} unavailable: {source}", path.display())
            }
            Self::ReadFailed(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::LogUnavailable { source, .. } => Some(source),
            Self::ReadFailed(err) => Some(err),
        }
    }
}

impl From<TailError> for SessionError {
    fn from(value: TailError) -> Self {
        Self::ReadFailed(value)
    }
}

#[derive(Debug)]
pub enum ViewerError {
    Bind { addr: String, source: io::Error },
    Serve(io::Error),
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "failed to bind viewer on {addr}: {source}"),
            Self::Serve(err) => write!(f, "viewer server error: {err}"),
        }
    }
}

impl std::error::Error for ViewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Serve(err) => Some(err),
        }
    }
}
