use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::http::{ViewerState, router};
use crate::{TailConfig, ViewerError};

/// Default listen address of the standalone viewer.
pub const DEFAULT_VIEWER_ADDR: &str = "localhost:8080";

/// A bound, not yet serving, live viewer for one capture log.
pub struct ViewerServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    log_path: PathBuf,
    tail: TailConfig,
}

impl ViewerServer {
    pub async fn bind(addr: &str, log_path: impl Into<PathBuf>) -> Result<Self, ViewerError> {
        let bind_error = |source| ViewerError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        Ok(Self {
            listener,
            local_addr,
            log_path: log_path.into(),
            tail: TailConfig::default(),
        })
    }

    pub fn with_tail_config(mut self, tail: TailConfig) -> Self {
        self.tail = tail;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until `shutdown` fires. Every open session is a child of
    /// `shutdown` and is closed with it.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ViewerError> {
        let app = router(ViewerState::new(self.log_path, self.tail, shutdown.clone()));
        info!(addr = %self.local_addr, "capture viewer serving");
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(ViewerError::Serve)?;
        info!(addr = %self.local_addr, "capture viewer stopped");
        Ok(())
    }

    /// Serves on a background task.
    pub fn spawn(self) -> ViewerHandle {
        let cancel = CancellationToken::new();
        let local_addr = self.local_addr;
        let join = tokio::spawn(self.serve(cancel.clone()));
        ViewerHandle {
            local_addr,
            cancel,
            join,
        }
    }
}

/// Owns a spawned viewer. Dropping the handle stops the server without
/// waiting for it; call [`ViewerHandle::shutdown`] to wait.
pub struct ViewerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    join: JoinHandle<Result<(), ViewerError>>,
}

impl ViewerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting viewers, closes every session and waits for the
    /// server task.
    pub async fn shutdown(mut self) -> Result<(), ViewerError> {
        self.cancel.cancel();
        match (&mut self.join).await {
            Ok(result) => result,
            Err(e) => Err(ViewerError::Serve(io::Error::other(e))),
        }
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
