use async_trait::async_trait;
use std::fmt;
use wiretap_types::{Direction, StreamId};

use crate::{CallInfo, CaptureLedger, CaptureMessage, EncodedPayload, Observation};

/// The one capability every call shape is reduced to.
///
/// Streaming transports implement it directly; unary calls are expressed
/// through [`UnaryCall`](super::UnaryCall). `recv` returns `Ok(None)` once the
/// peer has finished sending.
#[async_trait]
pub trait CallStream: Send {
    type Outbound: CaptureMessage + Send + 'static;
    type Inbound: CaptureMessage + Send + 'static;
    type Error: fmt::Display + Send;

    async fn send(&mut self, message: Self::Outbound) -> Result<(), Self::Error>;

    async fn recv(&mut self) -> Result<Option<Self::Inbound>, Self::Error>;
}

/// A call stream with capture attached.
///
/// Every successful or failed `send`/`recv` becomes one record tagged with
/// this handle's method, peer and stream ID. Values and results pass through
/// untouched.
pub struct StreamHandle<S> {
    inner: S,
    ledger: CaptureLedger,
    info: CallInfo,
    stream_id: Option<StreamId>,
}

impl<S: CallStream> StreamHandle<S> {
    pub(crate) fn new(
        inner: S,
        ledger: CaptureLedger,
        info: CallInfo,
        stream_id: Option<StreamId>,
    ) -> Self {
        Self {
            inner,
            ledger,
            info,
            stream_id,
        }
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream_id
    }

    pub fn info(&self) -> &CallInfo {
        &self.info
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Records `message` as received without taking it from the transport.
    pub(crate) fn observe_recv(&self, message: &S::Inbound) {
        self.ledger
            .record(Direction::Recv, &self.info, message, None, self.stream_id);
    }

    /// Records `message` as sent without handing it to the transport.
    pub(crate) fn observe_send(&self, message: &S::Outbound) {
        let payload = self.ledger.encode(message);
        self.append_send(payload, None);
    }

    fn append_send(&self, payload: Option<EncodedPayload>, error: Option<String>) {
        if let Some(payload) = payload {
            self.ledger.append(Observation {
                direction: Direction::Send,
                info: &self.info,
                stream_id: self.stream_id,
                error,
                payload,
            });
        }
    }

    /// Records an outbound message that never existed because the work that
    /// would have produced it failed.
    pub fn record_send_failure(&self, error: &impl fmt::Display) {
        self.ledger.record_failure::<S::Outbound>(
            Direction::Send,
            &self.info,
            error.to_string(),
            self.stream_id,
        );
    }
}

#[async_trait]
impl<S: CallStream> CallStream for StreamHandle<S> {
    type Outbound = S::Outbound;
    type Inbound = S::Inbound;
    type Error = S::Error;

    async fn send(&mut self, message: Self::Outbound) -> Result<(), Self::Error> {
        // encoded up front: the transport takes ownership of the message
        let payload = self.ledger.encode(&message);
        let result = self.inner.send(message).await;
        self.append_send(payload, result.as_ref().err().map(ToString::to_string));
        result
    }

    async fn recv(&mut self) -> Result<Option<Self::Inbound>, Self::Error> {
        let result = self.inner.recv().await;
        match &result {
            Ok(Some(message)) => self.observe_recv(message),
            Ok(None) => {}
            Err(e) => {
                self.ledger.record_failure::<S::Inbound>(
                    Direction::Recv,
                    &self.info,
                    e.to_string(),
                    self.stream_id,
                );
            }
        }
        result
    }
}
