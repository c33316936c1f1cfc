//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Integration tests for client and stream lifecycle.
//!
//! These tests verify:
//! - Exactly-once close under concurrent callers
//! - Fast failure after close and after connection loss
//! - Typed-mode misses failing without transport contact
//! - Stream release on every unary outcome (success, timeout,
//!   cancellation, connection loss)

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use triple_client::client::{
    ClientOptions, MethodReply, MethodTable, ServiceBinder, TripleClient, TripleConn,
};
use triple_client::codec::{Codec, JsonCodec, PostcardCodec};
use triple_client::context::{CallContext, CancelToken};
use triple_client::status::{Attachments, Code};
use triple_client::transport::{pair, Frame, FrameSink, FrameSource, MemorySink, MemorySource};

fn memory_client(
    options: ClientOptions,
) -> (TripleClient<JsonCodec>, (MemorySink, MemorySource)) {
    let ((client_sink, client_source), peer) = pair(64);
    let client = TripleClient::new(
        None,
        JsonCodec::new(),
        Box::new(client_sink),
        Box::new(client_source),
        options,
    );
    (client, peer)
}

struct GreeterBinder;

impl<C: Codec> ServiceBinder<C> for GreeterBinder {
    fn bind(&self, conn: TripleConn<C>) -> MethodTable {
        MethodTable::builder()
            .method("SayHello", move |ctx, body| {
                let conn = conn.clone();
                async move {
                    match conn
                        .unary_raw(ctx, "/com.example.IGreeter/SayHello", body)
                        .await
                    {
                        Ok((body, attachments)) => MethodReply::rich(
                            Some(body),
                            triple_client::status::ErrorWithAttachment::ok(attachments),
                        ),
                        Err(outcome) => MethodReply::rich(None, outcome),
                    }
                }
            })
            .build()
    }
}

#[tokio::test]
async fn test_typed_miss_makes_no_transport_contact() {
    let ((client_sink, client_source), (_server_sink, mut server_source)) = pair(64);
    let client = TripleClient::new(
        Some(&GreeterBinder),
        PostcardCodec::new(),
        Box::new(client_sink),
        Box::new(client_source),
        ClientOptions::new("memory"),
    );

    let mut reply = String::new();
    let outcome = client
        .invoke("NoSuchMethod", CallContext::new(), "x", &mut reply)
        .await;
    assert_eq!(outcome.error().unwrap().code(), Code::Unimplemented);

    // No frame may have reached the peer.
    let quiet = tokio::time::timeout(Duration::from_millis(50), server_source.recv()).await;
    assert!(quiet.is_err(), "unexpected transport contact");
}

#[tokio::test]
async fn test_concurrent_close_runs_once() {
    let (client, _peer) = memory_client(ClientOptions::new("memory"));
    let client = Arc::new(client);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            client.close();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert!(!client.is_available());
}

#[tokio::test]
async fn test_invoke_after_close_is_unavailable() {
    let (client, _peer) = memory_client(ClientOptions::new("memory"));
    client.close();
    assert!(!client.is_available());

    let ctx = CallContext::new().with_interface("com.example.IGreeter");
    let mut reply = String::new();
    let outcome = client.invoke("SayHello", ctx, &(), &mut reply).await;
    assert_eq!(outcome.error().unwrap().code(), Code::Unavailable);
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_close_during_inflight_call_resolves_unavailable() {
    let (client, _peer) = memory_client(ClientOptions::new("memory").with_no_default_timeout());
    let client = Arc::new(client);

    let caller = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let ctx = CallContext::new().with_interface("com.example.IGreeter");
            let mut reply = String::new();
            client.invoke("Hang", ctx, &(), &mut reply).await
        })
    };

    // Give the call time to get in flight, then tear down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.close();

    let outcome = caller.await.unwrap();
    assert_eq!(outcome.error().unwrap().code(), Code::Unavailable);
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_connection_loss_resolves_unavailable() {
    let (client, peer) = memory_client(ClientOptions::new("memory").with_no_default_timeout());
    let client = Arc::new(client);

    let caller = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let ctx = CallContext::new().with_interface("com.example.IGreeter");
            let mut reply = String::new();
            client.invoke("Hang", ctx, &(), &mut reply).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(peer);

    let outcome = caller.await.unwrap();
    assert_eq!(outcome.error().unwrap().code(), Code::Unavailable);
    assert!(!client.is_available());
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_timeout_releases_stream() {
    // Peer accepts the call but never replies.
    let (client, _peer) = memory_client(ClientOptions::new("memory"));

    let ctx = CallContext::new()
        .with_interface("com.example.IGreeter")
        .with_timeout(Duration::from_millis(50));
    let mut reply = String::new();
    let outcome = client.invoke("Slow", ctx, &(), &mut reply).await;

    assert_eq!(outcome.error().unwrap().code(), Code::DeadlineExceeded);
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_cancellation_releases_stream() {
    let (client, _peer) = memory_client(ClientOptions::new("memory").with_no_default_timeout());
    let client = Arc::new(client);
    let token = CancelToken::new();

    let caller = {
        let client = Arc::clone(&client);
        let token = token.clone();
        tokio::spawn(async move {
            let ctx = CallContext::new()
                .with_interface("com.example.IGreeter")
                .with_cancel(token);
            let mut reply = String::new();
            client.invoke("Hang", ctx, &(), &mut reply).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let outcome = caller.await.unwrap();
    assert_eq!(outcome.error().unwrap().code(), Code::Canceled);
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_success_releases_stream() {
    let ((client_sink, client_source), (mut server_sink, mut server_source)) = pair(64);
    let client = TripleClient::new(
        None,
        JsonCodec::new(),
        Box::new(client_sink),
        Box::new(client_source),
        ClientOptions::new("memory"),
    );

    // One-shot peer: reply to the first completed request and keep the
    // link open.
    tokio::spawn(async move {
        let mut stream_id = None;
        while let Ok(Some(frame)) = server_source.recv().await {
            match frame {
                Frame::Headers { stream_id: id, .. } => stream_id = Some(id),
                Frame::Data { end_stream: true, .. } => {
                    let id = stream_id.unwrap();
                    server_sink
                        .send(Frame::Data {
                            stream_id: id,
                            payload: Bytes::from(serde_json::to_vec(&"done").unwrap()),
                            end_message: true,
                            end_stream: false,
                        })
                        .await
                        .unwrap();
                    server_sink
                        .send(Frame::Trailers {
                            stream_id: id,
                            code: 0,
                            message: String::new(),
                            attachments: Attachments::new(),
                        })
                        .await
                        .unwrap();
                }
                _ => {}
            }
        }
    });

    let ctx = CallContext::new().with_interface("com.example.IGreeter");
    let mut reply = String::new();
    let outcome = client.invoke("Quick", ctx, &(), &mut reply).await;
    assert!(outcome.is_ok());
    assert_eq!(reply, "done");
    assert_eq!(client.active_streams(), 0);
}
