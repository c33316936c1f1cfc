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

//! Typed-mode binding: stubs, the method table, and the connection handle
//! stubs call through.
//!
//! Typed mode replaces per-call name introspection with a [`MethodTable`]
//! built exactly once at client construction: a [`ServiceBinder`] is
//! handed a [`TripleConn`] and returns the table mapping each declared
//! RPC method name to a bound callable. The table is immutable afterward
//! and lookups are case-sensitive exact matches.

use crate::codec::Codec;
use crate::context::CallContext;
use crate::status::{Attachments, ErrorWithAttachment, Status};
use crate::transport::{StreamHandle, TransportController};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// The connection handle a stub calls through.
///
/// Cheap to clone; every clone drives the same underlying connection.
/// Bound methods capture a clone and use [`unary_raw`](TripleConn::unary_raw)
/// or [`open_stream`](TripleConn::open_stream) plus the
/// [`encode`](TripleConn::encode)/[`decode`](TripleConn::decode) helpers
/// to speak the client's codec.
pub struct TripleConn<C: Codec> {
    controller: Arc<TransportController<C>>,
}

impl<C: Codec> Clone for TripleConn<C> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
        }
    }
}

impl<C: Codec> TripleConn<C> {
    pub(crate) fn new(controller: Arc<TransportController<C>>) -> Self {
        Self { controller }
    }

    /// Encodes a value with the client's codec.
    ///
    /// # Errors
    ///
    /// `Internal` if the value cannot be represented in the codec's
    /// format.
    pub fn encode<T>(&self, value: &T) -> Result<Bytes, Status>
    where
        T: serde::Serialize + ?Sized,
    {
        self.controller
            .codec()
            .serialize(value)
            .map(Bytes::from)
            .map_err(|e| Status::internal(format!("failed to encode request: {e}")))
    }

    /// Decodes a response body with the client's codec.
    ///
    /// # Errors
    ///
    /// `Internal` on malformed input.
    pub fn decode<T>(&self, bytes: &[u8]) -> Result<T, Status>
    where
        T: serde::de::DeserializeOwned,
    {
        self.controller
            .codec()
            .deserialize(bytes)
            .map_err(|e| Status::internal(format!("failed to decode response body: {e}")))
    }

    /// Performs a unary exchange with an already-encoded body.
    ///
    /// # Errors
    ///
    /// See [`TransportController::unary_raw`].
    pub async fn unary_raw(
        &self,
        ctx: CallContext,
        path: &str,
        body: Bytes,
    ) -> Result<(Bytes, Attachments), ErrorWithAttachment> {
        self.controller.unary_raw(ctx, path, body).await
    }

    /// Opens a duplex stream.
    ///
    /// # Errors
    ///
    /// See [`TransportController::stream_open`].
    pub async fn open_stream(
        &self,
        ctx: CallContext,
        path: &str,
    ) -> Result<StreamHandle<C>, Status> {
        self.controller.stream_open(ctx, path).await
    }
}

/// Result of one bound-method invocation.
///
/// `body` carries the encoded response value; `slot` carries the outcome
/// in one of the two accepted shapes (see [`ReplySlot`]). The body is
/// only meaningful when the slot signals success.
#[derive(Debug)]
pub struct MethodReply {
    /// Encoded response value, if the method produced one.
    pub body: Option<Bytes>,
    /// The outcome slot.
    pub slot: ReplySlot,
}

impl MethodReply {
    /// A reply carrying the full error-with-attachments outcome.
    #[must_use]
    pub fn rich(body: Option<Bytes>, outcome: ErrorWithAttachment) -> Self {
        Self {
            body,
            slot: ReplySlot::Rich(outcome),
        }
    }

    /// A reply in the legacy error-only shape.
    #[must_use]
    pub fn plain(body: Option<Bytes>, error: Option<Status>) -> Self {
        Self {
            body,
            slot: ReplySlot::Plain(error),
        }
    }
}

/// The two accepted outcome shapes of a bound method.
///
/// Updated stubs return [`Rich`](ReplySlot::Rich), preserving the peer's
/// attachments. Older stubs return [`Plain`](ReplySlot::Plain), an
/// error-only shape; the dispatcher treats it as an outcome with empty
/// attachments. Both shapes are accepted indefinitely; the dispatcher
/// never assumes which one a given stub produces.
#[derive(Debug)]
pub enum ReplySlot {
    /// Error plus attachments.
    Rich(ErrorWithAttachment),
    /// Plain optional error, attachments dropped.
    Plain(Option<Status>),
}

/// A method bound into the table: takes the call context and the encoded
/// request, returns the reply.
pub type BoundMethod =
    Arc<dyn Fn(CallContext, Bytes) -> BoxFuture<'static, MethodReply> + Send + Sync>;

/// Immutable name-to-callable table built once at client construction.
///
/// # Example
///
/// ```rust
/// use triple_client::client::{MethodReply, MethodTable};
///
/// let table = MethodTable::builder()
///     .method("SayHello", |_ctx, body| async move {
///         MethodReply::plain(Some(body), None)
///     })
///     .build();
///
/// assert!(table.contains("SayHello"));
/// assert!(!table.contains("sayhello"));
/// ```
pub struct MethodTable {
    methods: HashMap<String, BoundMethod>,
}

impl MethodTable {
    /// Starts building a table.
    #[must_use]
    pub fn builder() -> MethodTableBuilder {
        MethodTableBuilder {
            methods: HashMap::new(),
        }
    }

    /// Looks up a bound method by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundMethod> {
        self.methods.get(name)
    }

    /// Whether a method of this exact name is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Number of bound methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Builder for [`MethodTable`].
pub struct MethodTableBuilder {
    methods: HashMap<String, BoundMethod>,
}

impl MethodTableBuilder {
    /// Binds a method under `name`. Binding the same name again replaces
    /// the previous entry.
    #[must_use]
    pub fn method<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodReply> + Send + 'static,
    {
        self.methods.insert(
            name.into(),
            Arc::new(move |ctx, body| Box::pin(handler(ctx, body))),
        );
        self
    }

    /// Finalizes the table.
    #[must_use]
    pub fn build(self) -> MethodTable {
        MethodTable {
            methods: self.methods,
        }
    }
}

/// Contract of a typed-mode implementation object: given a connection
/// handle, produce the table of declared RPC methods.
///
/// Implemented by generated or hand-written adapters. The binder runs
/// exactly once, at client construction, and only when the selected codec
/// is structured.
pub trait ServiceBinder<C: Codec> {
    /// Builds the method table over the given connection handle.
    fn bind(&self, conn: TripleConn<C>) -> MethodTable;
}
