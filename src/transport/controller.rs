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

//! The transport controller: unary invocation, stream opening, and
//! teardown over one multiplexed connection.

use crate::codec::Codec;
use crate::context::CallContext;
use crate::options::ClientOptions;
use crate::status::{Attachments, Code, ErrorWithAttachment, Status};
use crate::transport::connection::{ConnState, Connection};
use crate::transport::frame::Frame;
use crate::transport::link::{FrameSink, FrameSource};
use crate::transport::stream::{OpenStream, StreamEvent, StreamGuard, StreamId};
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

/// Multiplexes concurrent unary and streaming calls over one connection
/// to a fixed remote endpoint.
///
/// Every call runs as an independent logical stream: concurrent calls
/// never observe each other's payloads or attachments, and aborting one
/// stream (deadline, cancellation, peer reset) leaves its siblings
/// untouched. [`destroy`](TransportController::destroy) releases the
/// connection exactly once no matter how many callers race to invoke it.
pub struct TransportController<C: Codec> {
    conn: Arc<Connection>,
    codec: Arc<C>,
    options: Arc<ClientOptions>,
}

impl<C: Codec> TransportController<C> {
    /// Wraps an established frame transport.
    pub fn new(
        codec: Arc<C>,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
        options: Arc<ClientOptions>,
    ) -> Self {
        let conn = Connection::new(
            sink,
            source,
            options.stream_buffer(),
            options.initial_window(),
        );
        Self {
            conn,
            codec,
            options,
        }
    }

    /// The codec bound to this controller.
    #[must_use]
    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }

    /// Snapshot availability: `true` only when the connection is ready
    /// and has not begun draining or closing.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.conn.is_available()
    }

    /// Current connection lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnState {
        self.conn.state()
    }

    /// Number of streams currently in flight.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.conn.active_streams()
    }

    /// One-shot release of the connection and all transport resources.
    ///
    /// Streams still open are aborted; their pending operations resolve
    /// with `Unavailable`. Safe to call concurrently and repeatedly.
    pub fn destroy(&self) {
        self.conn.destroy();
    }

    /// Performs a typed unary call: serializes `request`, runs the
    /// exchange, and deserializes the response into `reply`.
    ///
    /// `reply` is written only on success; on any error it is left
    /// untouched.
    pub async fn unary_invoke<Req, Resp>(
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
        let body = match self.codec.serialize(request) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                return ErrorWithAttachment::from_status(Status::internal(format!(
                    "failed to encode request: {e}"
                )))
            }
        };
        match self.unary_raw(ctx, path, body).await {
            Ok((response, attachments)) => match self.codec.deserialize(&response) {
                Ok(value) => {
                    *reply = value;
                    ErrorWithAttachment::ok(attachments)
                }
                Err(e) => ErrorWithAttachment::from_status(Status::internal(format!(
                    "failed to decode response body: {e}"
                ))),
            },
            Err(outcome) => outcome,
        }
    }

    /// Performs a unary call with an already-encoded body.
    ///
    /// Allocates exactly one new stream, writes request metadata and the
    /// chunked body, half-closes the send direction, and waits for
    /// response metadata, body, and terminal status under the context's
    /// deadline. The stream is released exactly once on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the combined error/attachment outcome on any failure:
    /// `Unavailable` for transport loss, `DeadlineExceeded`/`Canceled`
    /// for expiry, or the peer's terminal status.
    pub async fn unary_raw(
        &self,
        ctx: CallContext,
        path: &str,
        body: Bytes,
    ) -> Result<(Bytes, Attachments), ErrorWithAttachment> {
        debug!(path, codec = self.codec.name(), "unary invoke");
        let remaining = ctx.remaining(self.options.default_timeout());
        let open = self
            .conn
            .open_stream()
            .map_err(ErrorWithAttachment::from_status)?;
        let OpenStream {
            id,
            mut events,
            window,
            mut guard,
        } = open;

        let conn = Arc::clone(&self.conn);
        let headers = Frame::Headers {
            stream_id: id,
            path: path.to_string(),
            codec: self.codec.name().to_string(),
            attachments: ctx.attachments().clone(),
        };
        let max_payload = self.options.max_frame_payload();

        let exchange = async {
            conn.send_frame(headers).await?;
            send_body(&conn, &window, id, &body, max_payload, true).await?;

            let mut attachments = Attachments::new();
            let mut response = Vec::new();
            loop {
                match events.recv().await {
                    Some(StreamEvent::Headers(header_attachments)) => {
                        attachments.merge(header_attachments);
                    }
                    Some(StreamEvent::Data { payload, .. }) => {
                        response.extend_from_slice(&payload);
                    }
                    Some(StreamEvent::Trailers {
                        status,
                        attachments: trailers,
                    }) => {
                        attachments.merge(trailers);
                        return Ok((status, Bytes::from(response), attachments));
                    }
                    Some(StreamEvent::Reset(status)) => return Err(status),
                    None => return Err(Status::unavailable("connection closed during call")),
                }
            }
        };

        match guarded(remaining, &ctx, exchange).await {
            Ok((status, response, attachments)) => {
                guard.finish();
                if status.code() == Code::Ok {
                    Ok((response, attachments))
                } else {
                    Err(ErrorWithAttachment::new(Some(status), attachments))
                }
            }
            Err(status) => {
                guard.abort(&status);
                Err(ErrorWithAttachment::from_status(status))
            }
        }
    }

    /// Opens a duplex stream: allocates a stream, writes only the
    /// opening metadata, and returns the handle before any message
    /// exchange.
    ///
    /// # Errors
    ///
    /// Fails fast with `Unavailable` when the connection is unusable.
    pub async fn stream_open(
        &self,
        ctx: CallContext,
        path: &str,
    ) -> Result<StreamHandle<C>, Status> {
        debug!(path, codec = self.codec.name(), "stream open");
        let open = self.conn.open_stream()?;
        let headers = Frame::Headers {
            stream_id: open.id,
            path: path.to_string(),
            codec: self.codec.name().to_string(),
            attachments: ctx.attachments().clone(),
        };
        self.conn.send_frame(headers).await?;
        Ok(StreamHandle {
            id: open.id,
            conn: Arc::clone(&self.conn),
            codec: Arc::clone(&self.codec),
            default_timeout: self.options.default_timeout(),
            max_payload: self.options.max_frame_payload(),
            ctx,
            events: open.events,
            window: open.window,
            guard: open.guard,
            send_closed: false,
            terminal: None,
            response_attachments: Attachments::new(),
            trailer_attachments: Attachments::new(),
            assembly: Vec::new(),
        })
    }
}

/// One end of a duplex streaming call.
///
/// The caller drives message send/receive independently. Operations
/// observe the context's deadline and cancellation token; once a
/// terminal condition is reached (trailers, reset, deadline, or
/// cancellation) it is sticky and every subsequent operation reports it.
pub struct StreamHandle<C: Codec> {
    id: StreamId,
    conn: Arc<Connection>,
    codec: Arc<C>,
    default_timeout: Option<Duration>,
    max_payload: usize,
    ctx: CallContext,
    events: mpsc::Receiver<StreamEvent>,
    window: Arc<Semaphore>,
    guard: StreamGuard,
    send_closed: bool,
    terminal: Option<Status>,
    response_attachments: Attachments,
    trailer_attachments: Attachments,
    assembly: Vec<u8>,
}

impl<C: Codec> StreamHandle<C> {
    /// The id of the underlying stream.
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Attachments from the peer's response metadata, as received so far.
    #[must_use]
    pub fn response_attachments(&self) -> &Attachments {
        &self.response_attachments
    }

    /// Attachments from the terminal metadata; empty until the stream
    /// completes.
    #[must_use]
    pub fn trailer_attachments(&self) -> &Attachments {
        &self.trailer_attachments
    }

    /// The terminal status, if the stream has reached one.
    #[must_use]
    pub fn terminal_status(&self) -> Option<&Status> {
        self.terminal.as_ref()
    }

    /// Sends one message, suspending while the stream's flow-control
    /// window is exhausted.
    ///
    /// # Errors
    ///
    /// `DeadlineExceeded`/`Canceled` when the context fires while
    /// suspended, the sticky terminal status after the stream ended, or
    /// `Internal` when the message cannot be encoded or the send half is
    /// closed.
    pub async fn send<T>(&mut self, message: &T) -> Result<(), Status>
    where
        T: serde::Serialize + ?Sized,
    {
        if let Some(terminal) = &self.terminal {
            return Err(match terminal.code() {
                Code::Ok => Status::internal("stream already completed"),
                _ => terminal.clone(),
            });
        }
        if self.send_closed {
            return Err(Status::internal("send half already closed"));
        }
        let encoded = self
            .codec
            .serialize(message)
            .map_err(|e| Status::internal(format!("failed to encode stream message: {e}")))?;

        let remaining = self.ctx.remaining(self.default_timeout);
        let result = {
            let ctx = &self.ctx;
            let conn = &self.conn;
            let window = &self.window;
            let id = self.id;
            let max_payload = self.max_payload;
            guarded(
                remaining,
                ctx,
                send_body(conn, window, id, &encoded, max_payload, false),
            )
            .await
        };
        if let Err(status) = &result {
            self.fail(status.clone());
        }
        result
    }

    /// Receives the next message.
    ///
    /// Suspends until a message, an end-of-stream signal, or a terminal
    /// status arrives. Returns `Ok(None)` on clean completion.
    ///
    /// # Errors
    ///
    /// The peer's terminal status on an unsuccessful completion,
    /// `DeadlineExceeded`/`Canceled` when the context fires, or
    /// `Internal` on an undecodable message.
    pub async fn recv<T>(&mut self) -> Result<Option<T>, Status>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Some(terminal) = &self.terminal {
            return match terminal.code() {
                Code::Ok => Ok(None),
                _ => Err(terminal.clone()),
            };
        }
        loop {
            let remaining = self.ctx.remaining(self.default_timeout);
            let event = {
                let ctx = &self.ctx;
                let events = &mut self.events;
                guarded(remaining, ctx, async move { Ok(events.recv().await) }).await
            };
            let event = match event {
                Ok(event) => event,
                Err(status) => {
                    self.fail(status.clone());
                    return Err(status);
                }
            };
            match event {
                Some(StreamEvent::Headers(attachments)) => {
                    self.response_attachments.merge(attachments);
                }
                Some(StreamEvent::Data {
                    payload,
                    end_message,
                }) => {
                    self.assembly.extend_from_slice(&payload);
                    if end_message {
                        let message = std::mem::take(&mut self.assembly);
                        match self.codec.deserialize(&message) {
                            Ok(value) => return Ok(Some(value)),
                            Err(e) => {
                                let status = Status::internal(format!(
                                    "failed to decode stream message: {e}"
                                ));
                                self.fail(status.clone());
                                return Err(status);
                            }
                        }
                    }
                }
                Some(StreamEvent::Trailers {
                    status,
                    attachments,
                }) => {
                    self.trailer_attachments.merge(attachments);
                    self.terminal = Some(status.clone());
                    self.guard.finish();
                    return match status.code() {
                        Code::Ok => Ok(None),
                        _ => Err(status),
                    };
                }
                Some(StreamEvent::Reset(status)) => {
                    self.terminal = Some(status.clone());
                    self.guard.finish();
                    return Err(status);
                }
                None => {
                    let status = Status::unavailable("connection closed");
                    self.terminal = Some(status.clone());
                    self.guard.finish();
                    return Err(status);
                }
            }
        }
    }

    /// Half-closes the send direction. Idempotent.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the half-close frame cannot be written.
    pub async fn close_send(&mut self) -> Result<(), Status> {
        if self.send_closed || self.terminal.is_some() {
            return Ok(());
        }
        self.send_closed = true;
        self.conn
            .send_frame(Frame::Data {
                stream_id: self.id,
                payload: Bytes::new(),
                end_message: false,
                end_stream: true,
            })
            .await
    }

    /// Marks the stream failed and releases it.
    fn fail(&mut self, status: Status) {
        self.terminal = Some(status.clone());
        self.guard.abort(&status);
    }
}

/// Runs `fut` under the call's deadline and cancellation signal.
pub(crate) async fn guarded<T, F>(
    remaining: Option<Duration>,
    ctx: &CallContext,
    fut: F,
) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    let watched = async {
        tokio::select! {
            _ = ctx.cancelled() => Err(Status::canceled("call canceled")),
            out = fut => out,
        }
    };
    match remaining {
        Some(limit) => match tokio::time::timeout(limit, watched).await {
            Ok(out) => out,
            Err(_) => Err(Status::deadline_exceeded("call deadline expired")),
        },
        None => watched.await,
    }
}

/// Writes one message as chunked data frames, consuming one window
/// credit per frame. `half_close` marks the final chunk with
/// `end_stream`.
async fn send_body(
    conn: &Connection,
    window: &Semaphore,
    id: StreamId,
    body: &[u8],
    max_payload: usize,
    half_close: bool,
) -> Result<(), Status> {
    if body.is_empty() {
        acquire_credit(window).await?;
        return conn
            .send_frame(Frame::Data {
                stream_id: id,
                payload: Bytes::new(),
                end_message: true,
                end_stream: half_close,
            })
            .await;
    }
    let last = (body.len() - 1) / max_payload;
    for (index, chunk) in body.chunks(max_payload).enumerate() {
        acquire_credit(window).await?;
        conn.send_frame(Frame::Data {
            stream_id: id,
            payload: Bytes::copy_from_slice(chunk),
            end_message: index == last,
            end_stream: half_close && index == last,
        })
        .await?;
    }
    Ok(())
}

async fn acquire_credit(window: &Semaphore) -> Result<(), Status> {
    let permit = window
        .acquire()
        .await
        .map_err(|_| Status::unavailable("stream window closed"))?;
    // Credit is consumed permanently; the peer replenishes it with
    // window updates.
    permit.forget();
    Ok(())
}
