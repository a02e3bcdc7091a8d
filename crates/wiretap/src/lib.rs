//! RPC traffic capture.
//!
//! Every message that crosses an intercepted call boundary is written as one
//! JSON line to a capture log. When a viewer address is configured, the log is
//! also served live to WebSocket viewers through `wiretap-web`.
//!
//! Capture is configured through `WIRETAP_FILE` and `WIRETAP_ADDR`, or
//! [`CaptureConfig`] builder methods. With no destination configured every
//! hook is a pass-through.

mod call;
mod codec;
mod config;
mod error;
mod intercept;
mod ledger;

pub use call::*;
pub use codec::*;
pub use config::*;
pub use error::*;
pub use intercept::*;
pub use ledger::*;

pub use wiretap_types::{CapturedRecord, Direction, MessageId, StreamId};

use std::net::SocketAddr;
use tracing::{info, warn};
use wiretap_web::{ViewerHandle, ViewerServer};

/// A running capture: the ledger plus, optionally, the live viewer serving it.
pub struct Wiretap {
    ledger: CaptureLedger,
    viewer: Option<ViewerHandle>,
}

impl Wiretap {
    pub fn disabled() -> Self {
        Self {
            ledger: CaptureLedger::disabled(),
            viewer: None,
        }
    }

    /// Opens the capture log and, when both a destination and a viewer address
    /// are configured, starts the viewer on that log.
    pub async fn start(config: CaptureConfig) -> Result<Self, WiretapError> {
        let ledger = CaptureLedger::from_config(&config)?;
        let viewer = match (ledger.path(), config.viewer_addr.as_deref()) {
            (Some(path), Some(addr)) => {
                let server = ViewerServer::bind(addr, path).await?;
                info!(addr = %server.local_addr(), path = %path.display(), "capture viewer listening");
                Some(server.spawn())
            }
            (None, Some(addr)) => {
                warn!(%addr, "viewer address set without a capture file; viewer not started");
                None
            }
            _ => None,
        };
        Ok(Self { ledger, viewer })
    }

    /// Like [`Wiretap::start`], but a startup failure leaves capture disabled
    /// instead of failing the caller.
    pub async fn start_or_passthrough(config: CaptureConfig) -> Self {
        match Self::start(config).await {
            Ok(wiretap) => wiretap,
            Err(e) => {
                warn!(%e, "capture disabled");
                Self::disabled()
            }
        }
    }

    /// [`Wiretap::start_or_passthrough`] with configuration from the environment.
    pub async fn from_env() -> Self {
        Self::start_or_passthrough(CaptureConfig::from_env()).await
    }

    pub fn interceptor(&self) -> Interceptor {
        Interceptor::new(self.ledger.clone())
    }

    pub fn ledger(&self) -> &CaptureLedger {
        &self.ledger
    }

    pub fn is_enabled(&self) -> bool {
        self.ledger.is_enabled()
    }

    pub fn viewer_addr(&self) -> Option<SocketAddr> {
        self.viewer.as_ref().map(ViewerHandle::local_addr)
    }

    /// Stops the viewer (closing every open session) and closes the log.
    pub async fn shutdown(self) -> Result<(), WiretapError> {
        if let Some(viewer) = self.viewer {
            viewer.shutdown().await?;
        }
        self.ledger.close()?;
        Ok(())
    }
}
