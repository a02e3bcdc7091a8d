use std::fmt;
use std::io;
use std::path::PathBuf;

use wiretap_web::ViewerError;

#[derive(Debug)]
pub enum LedgerError {
    Open { path: PathBuf, source: io::Error },
    Io(io::Error),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "failed to open capture log {}: {source}", path.display())
            }
            Self::Io(err) => write!(f, "capture log i/o: {err}"),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for LedgerError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
pub enum WiretapError {
    Ledger(LedgerError),
    Viewer(ViewerError),
}

impl fmt::Display for WiretapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Viewer(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for WiretapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ledger(err) => Some(err),
            Self::Viewer(err) => Some(err),
        }
    }
}

impl From<LedgerError> for WiretapError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<ViewerError> for WiretapError {
    fn from(value: ViewerError) -> Self {
        Self::Viewer(value)
    }
}
