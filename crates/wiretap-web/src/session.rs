use std::path::PathBuf;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{LogTail, SessionError, TailConfig, spawn_tail};

/// WebSocket close code for a normal end of session.
pub const CLOSE_NORMAL: u16 = 1000;
/// WebSocket close code for a session ended by a server-side failure.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Longest close reason that fits a control frame next to its status code.
pub const MAX_CLOSE_REASON_BYTES: usize = 123;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub text: String,
}

impl CloseReason {
    pub fn normal(text: impl Into<String>) -> Self {
        Self::with_code(CLOSE_NORMAL, text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::with_code(CLOSE_INTERNAL_ERROR, text.into())
    }

    /// Clips `text` to [`MAX_CLOSE_REASON_BYTES`] on a char boundary.
    fn with_code(code: u16, mut text: String) -> Self {
        if text.len() > MAX_CLOSE_REASON_BYTES {
            let mut end = MAX_CLOSE_REASON_BYTES;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Self { code, text }
    }
}

/// Returned by [`ViewerConnection::push`] when the viewer can no longer be
/// written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerGone;

/// What the viewer sent us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Transport-level liveness traffic; the session carries on.
    Keepalive,
    /// Anything else, including the transport closing.
    Departed,
}

/// The push side of one connected viewer.
#[async_trait]
pub trait ViewerConnection: Send {
    async fn push(&mut self, line: String) -> Result<(), ViewerGone>;

    /// Waits for inbound traffic. Must be cancel safe: the session races it
    /// against new lines.
    async fn inbound(&mut self) -> Inbound;

    async fn close(&mut self, reason: CloseReason);
}

#[async_trait]
impl ViewerConnection for WebSocket {
    async fn push(&mut self, line: String) -> Result<(), ViewerGone> {
        self.send(Message::Text(line.into()))
            .await
            .map_err(|_| ViewerGone)
    }

    async fn inbound(&mut self) -> Inbound {
        match self.recv().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Inbound::Keepalive,
            _ => Inbound::Departed,
        }
    }

    async fn close(&mut self, reason: CloseReason) {
        let frame = CloseFrame {
            code: reason.code,
            reason: reason.text.into(),
        };
        if let Err(e) = self.send(Message::Close(Some(frame))).await {
            debug!(%e, "viewer gone before close frame");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ViewerLeft,
    Shutdown,
}

/// Binds one viewer to its own tail of the capture log.
pub struct DistributionSession {
    log_path: PathBuf,
    tail: TailConfig,
    shutdown: CancellationToken,
}

impl DistributionSession {
    /// `shutdown` is the server-wide token; the session only ever cancels a
    /// child of it.
    pub fn new(log_path: impl Into<PathBuf>, tail: TailConfig, shutdown: CancellationToken) -> Self {
        Self {
            log_path: log_path.into(),
            tail,
            shutdown,
        }
    }

    /// Forwards every line of the log, from the start, until the viewer
    /// leaves, the server shuts down, or the log can no longer be read.
    ///
    /// The log file is closed before this returns.
    pub async fn run<C: ViewerConnection>(self, mut conn: C) -> Result<SessionEnd, SessionError> {
        let file = match File::open(&self.log_path).await {
            Ok(file) => file,
            Err(source) => {
                let err = SessionError::LogUnavailable {
                    path: self.log_path,
                    source,
                };
                warn!(%err, "viewer session refused");
                conn.close(CloseReason::error(err.to_string())).await;
                return Err(err);
            }
        };
        debug!(path = %self.log_path.display(), "viewer session started");

        let cancel = self.shutdown.child_token();
        let (mut lines, tail_task) = spawn_tail(
            LogTail::new(file, self.tail),
            self.tail.line_buffer,
            cancel.clone(),
        );

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(SessionEnd::Shutdown),
                inbound = conn.inbound() => match inbound {
                    Inbound::Keepalive => continue,
                    Inbound::Departed => break Ok(SessionEnd::ViewerLeft),
                },
                line = lines.recv() => match line {
                    Some(Ok(line)) => {
                        if conn.push(line).await.is_err() {
                            break Ok(SessionEnd::ViewerLeft);
                        }
                    }
                    Some(Err(e)) => break Err(SessionError::ReadFailed(e)),
                    None => break Ok(SessionEnd::Shutdown),
                },
            }
        };

        cancel.cancel();
        drop(lines);
        if let Err(e) = tail_task.await {
            warn!(%e, "log tail task failed");
        }

        match &outcome {
            Ok(SessionEnd::ViewerLeft) => debug!("viewer left"),
            Ok(SessionEnd::Shutdown) => {
                conn.close(CloseReason::normal("server shutting down")).await;
            }
            Err(e) => {
                warn!(%e, "viewer session failed");
                conn.close(CloseReason::error(e.to_string())).await;
            }
        }
        outcome
    }
}
