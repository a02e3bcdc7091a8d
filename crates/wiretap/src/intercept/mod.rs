//! Hooks that sit between an RPC framework's dispatch and its handlers or
//! stubs, routing every message through the capture ledger.

mod channel;
mod stream;
mod unary;

pub use channel::*;
pub use stream::*;
pub use unary::*;

use std::fmt;
use std::future::Future;

use crate::{CallInfo, CaptureLedger, CaptureMessage};

/// Installs capture at the four call shapes.
///
/// Built from a [`CaptureLedger`]; with a disabled ledger every hook is a
/// pass-through.
#[derive(Clone)]
pub struct Interceptor {
    ledger: CaptureLedger,
}

impl Interceptor {
    pub fn new(ledger: CaptureLedger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &CaptureLedger {
        &self.ledger
    }

    /// Server side of a unary call: the request is recorded before `handler`
    /// runs, the reply (or the handler's error) after it returns.
    pub async fn unary_server<Req, Resp, E, F, Fut>(
        &self,
        info: CallInfo,
        request: Req,
        handler: F,
    ) -> Result<Resp, E>
    where
        Req: CaptureMessage + Send + 'static,
        Resp: CaptureMessage + Send + 'static,
        E: fmt::Display,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
    {
        self.unary(info, request, handler).await
    }

    /// Client side of a unary call: the outgoing request is recorded before
    /// `invoker` runs, the reply (or the transport error) after it returns.
    pub async fn unary_client<Req, Resp, E, F, Fut>(
        &self,
        info: CallInfo,
        request: Req,
        invoker: F,
    ) -> Result<Resp, E>
    where
        Req: CaptureMessage + Send + 'static,
        Resp: CaptureMessage + Send + 'static,
        E: fmt::Display,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
    {
        self.unary(info, request, invoker).await
    }

    /// Server side of a streaming call: wraps the transport's stream under a
    /// fresh stream ID before the handler sees it.
    pub fn stream_server<S: CallStream>(&self, info: CallInfo, stream: S) -> StreamHandle<S> {
        let stream_id = self.ledger.next_stream_id();
        StreamHandle::new(stream, self.ledger.clone(), info, Some(stream_id))
    }

    /// Client side of a streaming call. The stream ID is taken before the
    /// stream is established; establishment errors pass through unrecorded.
    pub async fn stream_client<S, E, Fut>(
        &self,
        info: CallInfo,
        establish: Fut,
    ) -> Result<StreamHandle<S>, E>
    where
        S: CallStream,
        Fut: Future<Output = Result<S, E>>,
    {
        let stream_id = self.ledger.next_stream_id();
        let stream = establish.await?;
        Ok(StreamHandle::new(
            stream,
            self.ledger.clone(),
            info,
            Some(stream_id),
        ))
    }

    async fn unary<Req, Resp, E, F, Fut>(
        &self,
        info: CallInfo,
        request: Req,
        call: F,
    ) -> Result<Resp, E>
    where
        Req: CaptureMessage + Send + 'static,
        Resp: CaptureMessage + Send + 'static,
        E: fmt::Display,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
    {
        if !self.ledger.is_enabled() {
            return call(request).await;
        }

        let exchange = StreamHandle::new(
            UnaryCall::<Req, Resp>::new(),
            self.ledger.clone(),
            info,
            None,
        );
        exchange.observe_recv(&request);

        match call(request).await {
            Ok(response) => {
                exchange.observe_send(&response);
                Ok(response)
            }
            Err(e) => {
                exchange.record_send_failure(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodecError, encode_serde};
    use serde::Serialize;
    use std::collections::HashSet;
    use std::path::Path;
    use wiretap_types::{CapturedRecord, Direction, MessageId, StreamId};

    #[derive(Serialize, Debug, Clone, PartialEq)]
    struct HelloRequest {
        name: String,
    }

    #[derive(Serialize, Debug, Clone, PartialEq)]
    struct HelloReply {
        message: String,
    }

    #[derive(Serialize, Debug, Clone, PartialEq)]
    struct CountdownReply {
        count: i32,
    }

    impl CaptureMessage for HelloRequest {
        fn message_type() -> String {
            "demo.HelloRequest".into()
        }

        fn encode_json(&self) -> Result<String, CodecError> {
            encode_serde(self)
        }
    }

    impl CaptureMessage for HelloReply {
        fn message_type() -> String {
            "demo.HelloReply".into()
        }

        fn encode_json(&self) -> Result<String, CodecError> {
            encode_serde(self)
        }
    }

    impl CaptureMessage for CountdownReply {
        fn message_type() -> String {
            "demo.CountdownReply".into()
        }

        fn encode_json(&self) -> Result<String, CodecError> {
            encode_serde(self)
        }
    }

    /// Stream whose every operation fails, for error attachment checks.
    struct BrokenStream;

    #[async_trait::async_trait]
    impl CallStream for BrokenStream {
        type Outbound = HelloReply;
        type Inbound = HelloRequest;
        type Error = String;

        async fn send(&mut self, _message: HelloReply) -> Result<(), String> {
            Err("send window closed".into())
        }

        async fn recv(&mut self) -> Result<Option<HelloRequest>, String> {
            Err("stream reset by peer".into())
        }
    }

    fn capture(dir: &tempfile::TempDir) -> (Interceptor, std::path::PathBuf) {
        let path = dir.path().join("capture.jsonl");
        let ledger = CaptureLedger::open(&path).expect("ledger should open");
        (Interceptor::new(ledger), path)
    }

    fn read_records(path: &Path) -> Vec<CapturedRecord> {
        std::fs::read_to_string(path)
            .expect("capture log should be readable")
            .lines()
            .map(|line| CapturedRecord::from_line(line).expect("every line should parse"))
            .collect()
    }

    async fn greet(request: HelloRequest) -> Result<HelloReply, String> {
        Ok(HelloReply {
            message: format!("Hello {}", request.name),
        })
    }

    #[tokio::test]
    async fn unary_greet_records_request_then_reply() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);
        let info = CallInfo::new("/demo.Demo/Hello").with_peer("127.0.0.1:50123");

        let reply = interceptor
            .unary_server(
                info,
                HelloRequest {
                    name: "Ann".into(),
                },
                greet,
            )
            .await
            .expect("handler succeeds");
        assert_eq!(reply.message, "Hello Ann");

        let records = read_records(&path);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].message_id, MessageId::new(1));
        assert_eq!(records[0].direction, Direction::Recv);
        assert_eq!(records[0].message_type, "demo.HelloRequest");
        assert_eq!(records[0].content.as_str(), r#"{"name":"Ann"}"#);

        assert_eq!(records[1].message_id, MessageId::new(2));
        assert_eq!(records[1].direction, Direction::Send);
        assert_eq!(records[1].message_type, "demo.HelloReply");
        assert_eq!(records[1].content.as_str(), r#"{"message":"Hello Ann"}"#);

        for record in &records {
            assert_eq!(record.stream_id, None);
            assert_eq!(record.error, None);
            assert_eq!(record.method, "/demo.Demo/Hello");
            assert_eq!(record.peer_address, "127.0.0.1:50123");
        }
    }

    #[tokio::test]
    async fn unary_error_is_recorded_and_passed_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);

        let result: Result<HelloReply, String> = interceptor
            .unary_client(
                CallInfo::new("/demo.Demo/Hello"),
                HelloRequest { name: "Bo".into() },
                |_request| async { Err(String::from("unavailable: connection refused")) },
            )
            .await;
        assert_eq!(result, Err(String::from("unavailable: connection refused")));

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::Recv);
        assert_eq!(records[0].peer_address, "unknown");
        assert_eq!(records[1].direction, Direction::Send);
        assert_eq!(records[1].message_type, "demo.HelloReply");
        assert!(records[1].content.is_null());
        assert_eq!(
            records[1].error.as_deref(),
            Some("unavailable: connection refused")
        );
    }

    #[tokio::test]
    async fn server_stream_pushes_share_one_stream_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);
        let (server_end, mut client_end) = channel_pair::<CountdownReply, HelloRequest>(8);

        let mut stream =
            interceptor.stream_server(CallInfo::new("/demo.Demo/Countdown"), server_end);
        for count in (0..3).rev() {
            stream
                .send(CountdownReply { count })
                .await
                .expect("client end is alive");
        }
        drop(stream);

        let mut received = Vec::new();
        while let Some(reply) = client_end.recv().await.expect("channel recv never fails") {
            received.push(reply.count);
        }
        assert_eq!(received, vec![2, 1, 0]);

        let records = read_records(&path);
        assert_eq!(records.len(), 3);
        let stream_id = records[0].stream_id.expect("stream records carry a stream id");
        for pair in records.windows(2) {
            assert!(pair[0].message_id < pair[1].message_id);
        }
        for record in &records {
            assert_eq!(record.direction, Direction::Send);
            assert_eq!(record.stream_id, Some(stream_id));
            assert_eq!(record.message_type, "demo.CountdownReply");
        }
    }

    #[tokio::test]
    async fn concurrent_streams_get_distinct_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let interceptor = interceptor.clone();
            tasks.push(tokio::spawn(async move {
                let (server_end, mut client_end) =
                    channel_pair::<CountdownReply, HelloRequest>(16);
                let mut stream =
                    interceptor.stream_server(CallInfo::new("/demo.Demo/Countdown"), server_end);
                let stream_id = stream.stream_id().expect("server streams get an id");
                for count in 0..5 {
                    stream
                        .send(CountdownReply { count })
                        .await
                        .expect("client end is alive");
                    tokio::task::yield_now().await;
                }
                drop(stream);
                while client_end
                    .recv()
                    .await
                    .expect("channel recv never fails")
                    .is_some()
                {}
                stream_id
            }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.expect("stream task should not panic"));
        }
        assert_eq!(ids.len(), 6);

        let records = read_records(&path);
        assert_eq!(records.len(), 30);
        for id in &ids {
            let count = records
                .iter()
                .filter(|r| r.stream_id == Some(*id))
                .count();
            assert_eq!(count, 5);
        }
    }

    #[tokio::test]
    async fn client_stream_records_both_directions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);
        let (client_end, mut server_end) = channel_pair::<HelloRequest, HelloReply>(4);

        let mut stream = interceptor
            .stream_client(CallInfo::new("/demo.Demo/Chat"), async {
                Ok::<_, ChannelClosed>(client_end)
            })
            .await
            .expect("establishment succeeds");

        stream
            .send(HelloRequest { name: "Cy".into() })
            .await
            .expect("server end is alive");
        let request = server_end
            .recv()
            .await
            .expect("channel recv never fails")
            .expect("request arrives");
        server_end
            .send(HelloReply {
                message: format!("Hello {}", request.name),
            })
            .await
            .expect("client end is alive");
        drop(server_end);

        let reply = stream
            .recv()
            .await
            .expect("channel recv never fails")
            .expect("reply arrives");
        assert_eq!(reply.message, "Hello Cy");
        assert_eq!(stream.recv().await, Ok(None));

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::Send);
        assert_eq!(records[1].direction, Direction::Recv);
        assert_eq!(records[0].stream_id, Some(StreamId::new(1)));
        assert_eq!(records[1].stream_id, Some(StreamId::new(1)));
    }

    #[tokio::test]
    async fn failed_establishment_passes_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);

        let result = interceptor
            .stream_client(CallInfo::new("/demo.Demo/Chat"), async {
                Err::<ChannelStream<HelloRequest, HelloReply>, _>("no route to host")
            })
            .await;
        assert!(matches!(result, Err("no route to host")));
        assert!(read_records(&path).is_empty());
    }

    #[tokio::test]
    async fn stream_errors_attach_to_their_own_observation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);
        let mut stream = interceptor.stream_server(CallInfo::new("/demo.Demo/Chat"), BrokenStream);

        let sent = stream
            .send(HelloReply {
                message: "late".into(),
            })
            .await;
        assert_eq!(sent, Err(String::from("send window closed")));
        let received = stream.recv().await;
        assert_eq!(received, Err(String::from("stream reset by peer")));

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::Send);
        assert_eq!(records[0].error.as_deref(), Some("send window closed"));
        assert_eq!(records[0].content.as_str(), r#"{"message":"late"}"#);
        assert_eq!(records[1].direction, Direction::Recv);
        assert_eq!(records[1].error.as_deref(), Some("stream reset by peer"));
        assert_eq!(records[1].message_type, "demo.HelloRequest");
        assert!(records[1].content.is_null());
    }

    /// Reply whose codec always fails.
    #[derive(Debug, PartialEq)]
    struct Opaque(u32);

    impl CaptureMessage for Opaque {
        fn message_type() -> String {
            "demo.Opaque".into()
        }

        fn encode_json(&self) -> Result<String, CodecError> {
            Err(CodecError::new("demo.Opaque", "no json form"))
        }
    }

    #[tokio::test]
    async fn unencodable_unary_reply_still_reaches_the_caller() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (interceptor, path) = capture(&dir);

        let reply = interceptor
            .unary_server(
                CallInfo::new("/demo.Demo/Opaque"),
                HelloRequest { name: "Eve".into() },
                |request| async move { Ok::<_, String>(Opaque(request.name.len() as u32)) },
            )
            .await;
        assert_eq!(reply, Ok(Opaque(3)));

        let records = read_records(&path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].direction, Direction::Recv);
        assert_eq!(records[0].message_type, "demo.HelloRequest");
    }

    #[tokio::test]
    async fn disabled_capture_is_a_pass_through() {
        let interceptor = Interceptor::new(CaptureLedger::disabled());

        let reply = interceptor
            .unary_server(
                CallInfo::new("/demo.Demo/Hello"),
                HelloRequest { name: "Di".into() },
                greet,
            )
            .await
            .expect("handler succeeds");
        assert_eq!(reply.message, "Hello Di");

        let (server_end, mut client_end) = channel_pair::<CountdownReply, HelloRequest>(2);
        let mut stream = interceptor.stream_server(CallInfo::new("/demo.Demo/Countdown"), server_end);
        stream
            .send(CountdownReply { count: 1 })
            .await
            .expect("client end is alive");
        assert_eq!(
            client_end.recv().await,
            Ok(Some(CountdownReply { count: 1 }))
        );
    }
}
