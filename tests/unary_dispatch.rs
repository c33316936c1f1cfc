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

//! Integration tests for unary dispatch over an in-memory transport.
//!
//! A frame-speaking peer task stands in for the remote side. These tests
//! verify:
//! - Dynamic-mode path construction
//! - Per-call attachment isolation under heavy concurrency
//! - Application errors carrying attachments
//! - Decode failures surfacing as `Internal`

use std::collections::HashMap;
use std::sync::Arc;
use triple_client::client::{ClientOptions, TripleClient};
use triple_client::codec::JsonCodec;
use triple_client::context::CallContext;
use triple_client::status::{Attachments, Code};
use triple_client::transport::{pair, Frame, FrameSink, FrameSource, MemorySink, MemorySource};

/// Reply produced by a test peer for one completed request.
struct PeerReply {
    code: u32,
    message: String,
    body: Option<Vec<u8>>,
    attachments: Attachments,
}

/// Serves unary requests: collects each stream's headers and body, then
/// asks `handler` for the reply and writes headers, body, and trailers.
fn spawn_unary_peer<F>(mut sink: MemorySink, mut source: MemorySource, handler: F)
where
    F: Fn(&str, &Attachments, &[u8]) -> PeerReply + Send + 'static,
{
    tokio::spawn(async move {
        let mut inflight: HashMap<u64, (String, Attachments, Vec<u8>)> = HashMap::new();
        while let Ok(Some(frame)) = source.recv().await {
            match frame {
                Frame::Headers {
                    stream_id,
                    path,
                    attachments,
                    ..
                } => {
                    inflight.insert(stream_id.as_u64(), (path, attachments, Vec::new()));
                }
                Frame::Data {
                    stream_id,
                    payload,
                    end_stream,
                    ..
                } => {
                    let Some(entry) = inflight.get_mut(&stream_id.as_u64()) else {
                        continue;
                    };
                    entry.2.extend_from_slice(&payload);
                    if end_stream {
                        let (path, attachments, body) =
                            inflight.remove(&stream_id.as_u64()).unwrap();
                        let reply = handler(&path, &attachments, &body);
                        sink.send(Frame::Headers {
                            stream_id,
                            path: String::new(),
                            codec: String::new(),
                            attachments: Attachments::new(),
                        })
                        .await
                        .unwrap();
                        if let Some(body) = reply.body {
                            sink.send(Frame::Data {
                                stream_id,
                                payload: body.into(),
                                end_message: true,
                                end_stream: false,
                            })
                            .await
                            .unwrap();
                        }
                        sink.send(Frame::Trailers {
                            stream_id,
                            code: reply.code,
                            message: reply.message,
                            attachments: reply.attachments,
                        })
                        .await
                        .unwrap();
                    }
                }
                Frame::Reset { stream_id, .. } => {
                    inflight.remove(&stream_id.as_u64());
                }
                _ => {}
            }
        }
    });
}

fn dynamic_client<F>(handler: F) -> TripleClient<JsonCodec>
where
    F: Fn(&str, &Attachments, &[u8]) -> PeerReply + Send + 'static,
{
    let ((client_sink, client_source), (server_sink, server_source)) = pair(256);
    spawn_unary_peer(server_sink, server_source, handler);
    TripleClient::new(
        None,
        JsonCodec::new(),
        Box::new(client_sink),
        Box::new(client_source),
        ClientOptions::new("memory"),
    )
}

#[tokio::test]
async fn test_dynamic_path_form() {
    let client = dynamic_client(|path, _attachments, _body| {
        let mut attachments = Attachments::new();
        attachments.insert("observed-path", path);
        PeerReply {
            code: 0,
            message: String::new(),
            body: Some(serde_json::to_vec(&"ok").unwrap()),
            attachments,
        }
    });

    let ctx = CallContext::new().with_interface("com.example.IGreeter");
    let mut reply = String::new();
    let outcome = client
        .invoke("BigUnaryTest", ctx, &("req",), &mut reply)
        .await;

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error());
    assert_eq!(
        outcome.attachments().get("observed-path"),
        Some("/com.example.IGreeter/BigUnaryTest")
    );
    assert_eq!(reply, "ok");
}

#[tokio::test]
async fn test_request_parameter_list_reaches_peer() {
    let client = dynamic_client(|_path, _attachments, body| {
        let params: (String, u32) = serde_json::from_slice(body).unwrap();
        assert_eq!(params, ("hello".to_string(), 7));
        PeerReply {
            code: 0,
            message: String::new(),
            body: Some(serde_json::to_vec(&"seen").unwrap()),
            attachments: Attachments::new(),
        }
    });

    let ctx = CallContext::new().with_interface("com.example.IGreeter");
    let mut reply = String::new();
    let outcome = client
        .invoke("BigUnaryTest", ctx, &("hello", 7u32), &mut reply)
        .await;
    assert!(outcome.is_ok());
    assert_eq!(reply, "seen");
}

#[tokio::test]
async fn test_application_error_carries_attachments() {
    let client = dynamic_client(|_path, _attachments, _body| {
        let mut attachments = Attachments::new();
        attachments.insert("retry-after", "5s");
        PeerReply {
            code: 3,
            message: "bad request".to_string(),
            body: None,
            attachments,
        }
    });

    let ctx = CallContext::new().with_interface("com.example.IGreeter");
    let mut reply = String::from("untouched");
    let outcome = client.invoke("Fail", ctx, &(), &mut reply).await;

    let error = outcome.error().expect("expected an error");
    assert_eq!(error.code(), Code::InvalidArgument);
    assert_eq!(error.message(), "bad request");
    assert_eq!(outcome.attachments().get("retry-after"), Some("5s"));
    assert_eq!(reply, "untouched");
}

#[tokio::test]
async fn test_unknown_wire_code_maps_to_unknown() {
    let client = dynamic_client(|_path, _attachments, _body| PeerReply {
        code: 999,
        message: "strange".to_string(),
        body: None,
        attachments: Attachments::new(),
    });

    let ctx = CallContext::new().with_interface("com.example.IGreeter");
    let mut reply = String::new();
    let outcome = client.invoke("Weird", ctx, &(), &mut reply).await;
    assert_eq!(outcome.error().unwrap().code(), Code::Unknown);
}

#[tokio::test]
async fn test_decode_failure_is_internal() {
    let client = dynamic_client(|_path, _attachments, _body| PeerReply {
        code: 0,
        message: String::new(),
        body: Some(b"not json at all".to_vec()),
        attachments: Attachments::new(),
    });

    let ctx = CallContext::new().with_interface("com.example.IGreeter");
    let mut reply = 0u64;
    let outcome = client.invoke("Broken", ctx, &(), &mut reply).await;
    assert_eq!(outcome.error().unwrap().code(), Code::Internal);
    assert_eq!(reply, 0);
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_attachment_isolation_under_concurrency() {
    // The peer tags each reply with the call id it saw in the request
    // attachments; every caller must get exactly its own tag back.
    let client = Arc::new(dynamic_client(|_path, attachments, body| {
        let call_id = attachments.get("call-id").unwrap().to_string();
        let value: u64 = serde_json::from_slice(body).unwrap();
        let mut reply_attachments = Attachments::new();
        reply_attachments.insert("call-id", call_id);
        PeerReply {
            code: 0,
            message: String::new(),
            body: Some(serde_json::to_vec(&(value * 2)).unwrap()),
            attachments: reply_attachments,
        }
    }));

    let mut tasks = Vec::new();
    for i in 0..120u64 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let ctx = CallContext::new()
                .with_interface("com.example.IGreeter")
                .with_attachment("call-id", i.to_string());
            let mut reply = 0u64;
            let outcome = client.invoke("Double", ctx, &i, &mut reply).await;
            assert!(outcome.is_ok(), "call {i} failed: {:?}", outcome.error());
            assert_eq!(outcome.attachments().get("call-id"), Some(i.to_string().as_str()));
            assert_eq!(reply, i * 2);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(client.active_streams(), 0);
}
