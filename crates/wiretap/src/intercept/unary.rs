use async_trait::async_trait;
use std::convert::Infallible;
use std::marker::PhantomData;

use super::CallStream;
use crate::CaptureMessage;

/// The shape of a unary exchange: one request in, one reply out.
///
/// It carries no messages itself. The interceptor hands the request to the
/// handler and the reply back to the caller directly, and only lends them to
/// the [`StreamHandle`](super::StreamHandle) for observation, so unary calls
/// share the observation path of real streams. The request always reads as
/// received and the reply as sent, on both the client and the server side.
pub struct UnaryCall<Req, Resp> {
    _shape: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> UnaryCall<Req, Resp> {
    pub fn new() -> Self {
        Self {
            _shape: PhantomData,
        }
    }
}

impl<Req, Resp> Default for UnaryCall<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<Req, Resp> CallStream for UnaryCall<Req, Resp>
where
    Req: CaptureMessage + Send + 'static,
    Resp: CaptureMessage + Send + 'static,
{
    type Outbound = Resp;
    type Inbound = Req;
    type Error = Infallible;

    /// The reply goes back to the caller as the call's return value.
    async fn send(&mut self, _message: Resp) -> Result<(), Infallible> {
        Ok(())
    }

    /// The request is handed straight to the handler, never queued here.
    async fn recv(&mut self) -> Result<Option<Req>, Infallible> {
        Ok(None)
    }
}
