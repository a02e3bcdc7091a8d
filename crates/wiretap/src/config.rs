use std::path::PathBuf;

/// Environment variable naming the capture log destination.
pub const FILE_ENV: &str = "WIRETAP_FILE";
/// Environment variable naming the address the live viewer binds to.
pub const ADDR_ENV: &str = "WIRETAP_ADDR";

/// Where captured traffic goes, and whether a live viewer is served.
///
/// Without an `output`, capture is disabled entirely: the ledger discards
/// every record and no viewer is started even if `viewer_addr` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureConfig {
    pub output: Option<PathBuf>,
    pub viewer_addr: Option<String>,
}

impl CaptureConfig {
    /// Reads `WIRETAP_FILE` and `WIRETAP_ADDR`. Blank values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            output: non_blank(lookup(FILE_ENV)).map(PathBuf::from),
            viewer_addr: non_blank(lookup(ADDR_ENV)),
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_viewer_addr(mut self, addr: impl Into<String>) -> Self {
        self.viewer_addr = Some(addr.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.output.is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
