use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use super::CallStream;
use crate::CaptureMessage;

/// Error returned when the other end of a [`ChannelStream`] is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

impl fmt::Display for ChannelClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("call stream closed by peer")
    }
}

impl std::error::Error for ChannelClosed {}

/// In-process bidirectional call stream over a pair of tokio channels.
pub struct ChannelStream<Out, In> {
    tx: mpsc::Sender<Out>,
    rx: mpsc::Receiver<In>,
}

/// Builds two connected ends: whatever one sends, the other receives.
pub fn channel_pair<A, B>(capacity: usize) -> (ChannelStream<A, B>, ChannelStream<B, A>) {
    let (a_tx, a_rx) = mpsc::channel(capacity);
    let (b_tx, b_rx) = mpsc::channel(capacity);
    (
        ChannelStream { tx: a_tx, rx: b_rx },
        ChannelStream { tx: b_tx, rx: a_rx },
    )
}

#[async_trait]
impl<Out, In> CallStream for ChannelStream<Out, In>
where
    Out: CaptureMessage + Send + 'static,
    In: CaptureMessage + Send + 'static,
{
    type Outbound = Out;
    type Inbound = In;
    type Error = ChannelClosed;

    async fn send(&mut self, message: Out) -> Result<(), ChannelClosed> {
        self.tx.send(message).await.map_err(|_| ChannelClosed)
    }

    async fn recv(&mut self) -> Result<Option<In>, ChannelClosed> {
        Ok(self.rx.recv().await)
    }
}
