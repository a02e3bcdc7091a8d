//! A two-method `Demo` service wired through capture on both ends.
//!
//! The client calls the server in-process: unary calls are plain function
//! calls and the streaming call runs over a [`channel_pair`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;
use wiretap::{
    CallInfo, CallStream, CaptureMessage, ChannelClosed, ChannelStream, CodecError, Interceptor,
    channel_pair, encode_serde,
};

pub const HELLO_METHOD: &str = "/demo.Demo/Hello";
pub const COUNTDOWN_METHOD: &str = "/demo.Demo/Countdown";

const SERVER_PEER: &str = "in-process:demo-server";
const CLIENT_PEER: &str = "in-process:demo-client";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HelloRequest {
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HelloReply {
    pub message: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CountdownRequest {
    pub start: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CountdownReply {
    pub count: i32,
}

macro_rules! capture_message {
    ($ty:ty, $name:literal) => {
        impl CaptureMessage for $ty {
            fn message_type() -> String {
                $name.to_string()
            }

            fn encode_json(&self) -> Result<String, CodecError> {
                encode_serde(self)
            }
        }
    };
}

capture_message!(HelloRequest, "demo.HelloRequest");
capture_message!(HelloReply, "demo.HelloReply");
capture_message!(CountdownRequest, "demo.CountdownRequest");
capture_message!(CountdownReply, "demo.CountdownReply");

pub struct DemoServer {
    interceptor: Interceptor,
    interval: Duration,
}

impl DemoServer {
    /// `interval` is the pause between countdown replies.
    pub fn new(interceptor: Interceptor, interval: Duration) -> Self {
        Self {
            interceptor,
            interval,
        }
    }

    pub async fn hello(&self, request: HelloRequest) -> Result<HelloReply, String> {
        let info = CallInfo::new(HELLO_METHOD).with_peer(CLIENT_PEER);
        self.interceptor
            .unary_server(info, request, |request| async move {
                if request.name.trim().is_empty() {
                    return Err(String::from("invalid argument: name must not be empty"));
                }
                info!(name = %request.name, peer = CLIENT_PEER, "hello received");
                Ok(HelloReply {
                    message: format!("Hello {}", request.name),
                })
            })
            .await
    }

    /// Serves one countdown call on its own task.
    pub fn countdown(
        self: &Arc<Self>,
        transport: ChannelStream<CountdownReply, CountdownRequest>,
    ) -> JoinHandle<Result<(), String>> {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let info = CallInfo::new(COUNTDOWN_METHOD).with_peer(CLIENT_PEER);
            let mut stream = server.interceptor.stream_server(info, transport);
            let Some(request) = stream.recv().await.map_err(|e| e.to_string())? else {
                return Err(String::from("countdown request never arrived"));
            };
            for count in (0..=request.start).rev() {
                stream
                    .send(CountdownReply { count })
                    .await
                    .map_err(|e| e.to_string())?;
                info!(count, peer = CLIENT_PEER, "countdown");
                if count > 0 {
                    tokio::time::sleep(server.interval).await;
                }
            }
            Ok(())
        })
    }
}

pub struct DemoClient {
    interceptor: Interceptor,
    server: Arc<DemoServer>,
}

impl DemoClient {
    pub fn new(interceptor: Interceptor, server: Arc<DemoServer>) -> Self {
        Self {
            interceptor,
            server,
        }
    }

    pub async fn hello(&self, name: &str) -> Result<HelloReply, String> {
        let info = CallInfo::new(HELLO_METHOD).with_peer(SERVER_PEER);
        let request = HelloRequest {
            name: name.to_string(),
        };
        self.interceptor
            .unary_client(info, request, |request| self.server.hello(request))
            .await
    }

    /// Runs one countdown call to completion and returns the counts seen.
    pub async fn countdown(&self, start: i32) -> Result<Vec<i32>, String> {
        let info = CallInfo::new(COUNTDOWN_METHOD).with_peer(SERVER_PEER);
        let mut serving = None;
        let mut stream = self
            .interceptor
            .stream_client(info, async {
                let (client_end, server_end) =
                    channel_pair::<CountdownRequest, CountdownReply>(8);
                serving = Some(self.server.countdown(server_end));
                Ok::<_, ChannelClosed>(client_end)
            })
            .await
            .map_err(|e| e.to_string())?;

        stream
            .send(CountdownRequest { start })
            .await
            .map_err(|e| e.to_string())?;
        let mut counts = Vec::new();
        while let Some(reply) = stream.recv().await.map_err(|e| e.to_string())? {
            counts.push(reply.count);
        }

        if let Some(task) = serving {
            task.await.map_err(|e| e.to_string())??;
        }
        Ok(counts)
    }
}
