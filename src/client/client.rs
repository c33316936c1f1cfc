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

//! The client façade: invocation dispatch over one transport controller.

use crate::client::stub::{ReplySlot, ServiceBinder};
use crate::client::MethodTable;
use crate::client::TripleConn;
use crate::codec::Codec;
use crate::context::CallContext;
use crate::options::ClientOptions;
use crate::status::{Attachments, ErrorWithAttachment, Status};
use crate::transport::{tcp, FrameSink, FrameSource, StreamHandle, TransportController};
use crate::transport::TransportError;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// The Triple client: typed and dynamic invocation behind one object.
///
/// A client is constructed once with a codec, a frame transport, and an
/// optional typed-mode binder, and is then shared freely: every operation
/// takes `&self` and any number of calls may run concurrently. Typed mode
/// is active when the codec is structured and a binder was supplied;
/// otherwise every [`invoke`](TripleClient::invoke) dispatches
/// dynamically by `/{interface}/{method}` path.
///
/// [`close`](TripleClient::close) is idempotent and safe under races:
/// the underlying connection is released exactly once, in-flight calls
/// resolve with `Unavailable`, and later invokes fail fast.
pub struct TripleClient<C: Codec> {
    controller: Arc<TransportController<C>>,
    table: Option<MethodTable>,
}

impl<C: Codec> TripleClient<C> {
    /// Builds a client over an established frame transport.
    ///
    /// The method table is built here, exactly once, iff the codec is
    /// structured and a binder is supplied; a binder paired with an
    /// unstructured codec is ignored and the client runs in dynamic mode.
    pub fn new(
        binder: Option<&dyn ServiceBinder<C>>,
        codec: C,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
        options: ClientOptions,
    ) -> Self {
        let codec = Arc::new(codec);
        let options = Arc::new(options);
        let controller = Arc::new(TransportController::new(
            Arc::clone(&codec),
            sink,
            source,
            options,
        ));
        let table = if codec.structured() {
            binder.map(|binder| binder.bind(TripleConn::new(Arc::clone(&controller))))
        } else {
            None
        };
        debug!(
            codec = codec.name(),
            typed = table.is_some(),
            "client constructed"
        );
        Self { controller, table }
    }

    /// Dials `options.endpoint()` over TCP and builds a client on the
    /// resulting link.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the connection cannot be
    /// established.
    pub async fn connect(
        binder: Option<&dyn ServiceBinder<C>>,
        codec: C,
        options: ClientOptions,
    ) -> Result<Self, TransportError> {
        let (sink, source) = tcp::connect(options.endpoint()).await?;
        Ok(Self::new(
            binder,
            codec,
            Box::new(sink),
            Box::new(source),
            options,
        ))
    }

    /// Whether the client is in typed mode.
    #[must_use]
    pub fn is_typed(&self) -> bool {
        self.table.is_some()
    }

    /// Invokes a method by name.
    ///
    /// Typed mode: looks `method` up in the method table; a miss fails
    /// with `Unimplemented` before any transport contact. The bound
    /// method's outcome is accepted in either reply shape (see
    /// [`ReplySlot`]); on success the decoded response is written into
    /// `reply`, on failure `reply` is untouched.
    ///
    /// Dynamic mode: the context must carry an interface key, otherwise
    /// the call fails with `InvalidArgument` before any transport
    /// contact. The call is addressed as `/{interface}/{method}` and
    /// `request` travels as the parameter list.
    pub async fn invoke<Req, Resp>(
        &self,
        method: &str,
        ctx: CallContext,
        request: &Req,
        reply: &mut Resp,
    ) -> ErrorWithAttachment
    where
        Req: serde::Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        match &self.table {
            Some(table) => self.invoke_typed(table, method, ctx, request, reply).await,
            None => self.invoke_dynamic(method, ctx, request, reply).await,
        }
    }

    async fn invoke_typed<Req, Resp>(
        &self,
        table: &MethodTable,
        method: &str,
        ctx: CallContext,
        request: &Req,
        reply: &mut Resp,
    ) -> ErrorWithAttachment
    where
        Req: serde::Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        let Some(bound) = table.get(method) else {
            return ErrorWithAttachment::from_status(Status::unimplemented(format!(
                "method {method} is not bound"
            )));
        };
        debug!(method, "typed invoke");
        let body = match self.controller.codec().serialize(request) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                return ErrorWithAttachment::from_status(Status::internal(format!(
                    "failed to encode request: {e}"
                )))
            }
        };
        let outcome = bound(ctx, body).await;
        let (body, attachments) = match outcome.slot {
            ReplySlot::Rich(rich) => {
                if !rich.is_ok() {
                    return rich;
                }
                let attachments = rich.attachments().clone();
                (outcome.body, attachments)
            }
            ReplySlot::Plain(Some(status)) => return ErrorWithAttachment::from_status(status),
            ReplySlot::Plain(None) => (outcome.body, Attachments::new()),
        };
        let Some(body) = body else {
            return ErrorWithAttachment::from_status(Status::internal(
                "bound method produced no response body",
            ));
        };
        match self.controller.codec().deserialize(&body) {
            Ok(value) => {
                *reply = value;
                ErrorWithAttachment::ok(attachments)
            }
            Err(e) => ErrorWithAttachment::from_status(Status::internal(format!(
                "failed to decode response body: {e}"
            ))),
        }
    }

    async fn invoke_dynamic<Req, Resp>(
        &self,
        method: &str,
        ctx: CallContext,
        request: &Req,
        reply: &mut Resp,
    ) -> ErrorWithAttachment
    where
        Req: serde::Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        let path = match ctx.interface() {
            Some(interface) => format!("/{interface}/{method}"),
            None => {
                return ErrorWithAttachment::from_status(Status::invalid_argument(
                    "call context carries no interface key",
                ))
            }
        };
        self.request(ctx, &path, request, reply).await
    }

    /// Performs a unary call addressed by explicit path.
    pub async fn request<Req, Resp>(
        &self,
        ctx: CallContext,
        path: &str,
        request: &Req,
        reply: &mut Resp,
    ) -> ErrorWithAttachment
    where
        Req: serde::Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        self.controller.unary_invoke(ctx, path, request, reply).await
    }

    /// Opens a duplex stream addressed by explicit path and returns its
    /// handle before any message exchange.
    ///
    /// # Errors
    ///
    /// Fails fast with `Unavailable` when the connection is unusable.
    pub async fn stream_request(
        &self,
        ctx: CallContext,
        path: &str,
    ) -> Result<StreamHandle<C>, Status> {
        self.controller.stream_open(ctx, path).await
    }

    /// One-shot teardown of the client and its connection.
    ///
    /// Idempotent and safe to call concurrently: the release runs exactly
    /// once, in-flight calls resolve with `Unavailable`, and every later
    /// invoke fails fast.
    pub fn close(&self) {
        debug!("client close");
        self.controller.destroy();
    }

    /// Snapshot of connectivity; `false` once closed or after connection
    /// loss.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.controller.is_available()
    }

    /// Number of calls currently in flight.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.controller.active_streams()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MethodReply;
    use crate::codec::{JsonCodec, PostcardCodec};
    use crate::transport::pair;

    struct EchoBinder;

    impl<C: Codec> ServiceBinder<C> for EchoBinder {
        fn bind(&self, _conn: TripleConn<C>) -> MethodTable {
            MethodTable::builder()
                .method("Echo", |_ctx, body| async move {
                    MethodReply::plain(Some(body), None)
                })
                .build()
        }
    }

    type MemoryPeer = (crate::transport::MemorySink, crate::transport::MemorySource);

    // The peer half is returned so tests keep the transport alive.
    fn memory_client<C: Codec>(
        binder: Option<&dyn ServiceBinder<C>>,
        codec: C,
    ) -> (TripleClient<C>, MemoryPeer) {
        let ((sink, source), peer) = pair(32);
        let client = TripleClient::new(
            binder,
            codec,
            Box::new(sink),
            Box::new(source),
            ClientOptions::new("memory"),
        );
        (client, peer)
    }

    #[tokio::test]
    async fn test_structured_codec_with_binder_is_typed() {
        let (client, _peer) = memory_client(Some(&EchoBinder), PostcardCodec::new());
        assert!(client.is_typed());
    }

    #[tokio::test]
    async fn test_unstructured_codec_ignores_binder() {
        let (client, _peer) = memory_client(Some(&EchoBinder), JsonCodec::new());
        assert!(!client.is_typed());
    }

    #[tokio::test]
    async fn test_typed_miss_is_unimplemented() {
        let (client, _peer) = memory_client(Some(&EchoBinder), PostcardCodec::new());
        let mut reply = String::new();
        let outcome = client
            .invoke("NoSuchMethod", CallContext::new(), "x", &mut reply)
            .await;
        assert_eq!(
            outcome.error().unwrap().code(),
            crate::status::Code::Unimplemented
        );
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn test_typed_echo_round_trip() {
        let (client, _peer) = memory_client(Some(&EchoBinder), PostcardCodec::new());
        let mut reply = String::new();
        let outcome = client
            .invoke("Echo", CallContext::new(), "hello", &mut reply)
            .await;
        assert!(outcome.is_ok());
        assert_eq!(reply, "hello");
    }

    #[tokio::test]
    async fn test_dynamic_without_interface_is_invalid_argument() {
        let (client, _peer) = memory_client(None, JsonCodec::new());
        let mut reply = String::new();
        let outcome = client
            .invoke("BigUnaryTest", CallContext::new(), &("x",), &mut reply)
            .await;
        assert_eq!(
            outcome.error().unwrap().code(),
            crate::status::Code::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, _peer) = memory_client(None, JsonCodec::new());
        assert!(client.is_available());
        client.close();
        client.close();
        assert!(!client.is_available());
    }
}
