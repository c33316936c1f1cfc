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

//! One multiplexed connection: stream registry, frame demultiplexer, and
//! one-shot teardown.

use crate::status::Status;
use crate::transport::frame::Frame;
use crate::transport::link::{FrameSink, FrameSource};
use crate::transport::stream::{OpenStream, StreamEvent, StreamGuard, StreamId, StreamSlot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lifecycle of a connection.
///
/// A connection wraps an already-established transport, so it starts
/// `Ready`; dialing happens before construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Transport established; calls may be placed.
    Ready,
    /// Teardown in progress: no new streams, in-flight streams are being
    /// failed.
    Draining,
    /// Fully closed. Terminal; entered exactly once.
    Closed,
}

const STATE_READY: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_CLOSED: u8 = 2;

fn state_from_u8(value: u8) -> ConnState {
    match value {
        STATE_READY => ConnState::Ready,
        STATE_DRAINING => ConnState::Draining,
        _ => ConnState::Closed,
    }
}

type StreamRegistry = Arc<StdMutex<HashMap<StreamId, StreamSlot>>>;

/// A multiplexed connection to one remote endpoint.
///
/// Owns the frame transport, the stream registry, and the demultiplexer
/// task that routes inbound frames to their streams. All of it is shared
/// by every concurrent caller of one client; registration and removal of
/// streams are guarded by a mutex, and teardown runs exactly once behind
/// an atomic gate.
pub(crate) struct Connection {
    state: Arc<AtomicU8>,
    destroyed: Arc<AtomicBool>,
    next_stream_id: AtomicU64,
    streams: StreamRegistry,
    // Taken (dropped) by destroy so the transport's write half is
    // released with the connection, not with the client value.
    writer: Arc<Mutex<Option<Box<dyn FrameSink>>>>,
    demux: StdMutex<Option<JoinHandle<()>>>,
    stream_buffer: usize,
    initial_window: usize,
}

impl Connection {
    /// Wraps an established frame transport and spawns the demultiplexer.
    pub(crate) fn new(
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
        stream_buffer: usize,
        initial_window: usize,
    ) -> Arc<Self> {
        let state = Arc::new(AtomicU8::new(STATE_READY));
        let destroyed = Arc::new(AtomicBool::new(false));
        let streams: StreamRegistry = Arc::new(StdMutex::new(HashMap::new()));

        let demux = tokio::spawn(demux_loop(
            source,
            Arc::clone(&streams),
            Arc::clone(&state),
            Arc::clone(&destroyed),
        ));

        Arc::new(Self {
            state,
            destroyed,
            next_stream_id: AtomicU64::new(1),
            streams,
            writer: Arc::new(Mutex::new(Some(sink))),
            demux: StdMutex::new(Some(demux)),
            stream_buffer,
            initial_window,
        })
    }

    /// Current lifecycle state.
    pub(crate) fn state(&self) -> ConnState {
        state_from_u8(self.state.load(Ordering::Acquire))
    }

    /// Snapshot availability: `true` only when ready and not destroyed.
    pub(crate) fn is_available(&self) -> bool {
        self.state() == ConnState::Ready && !self.destroyed.load(Ordering::Acquire)
    }

    /// Number of streams currently registered.
    pub(crate) fn active_streams(&self) -> usize {
        self.streams.lock().expect("stream registry poisoned").len()
    }

    /// Allocates and registers a new stream.
    ///
    /// # Errors
    ///
    /// Fails fast with `Unavailable` when the connection is not ready.
    pub(crate) fn open_stream(self: &Arc<Self>) -> Result<OpenStream, Status> {
        if !self.is_available() {
            return Err(Status::unavailable("connection is not available"));
        }
        let id = StreamId::from_u64(self.next_stream_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let window = Arc::new(Semaphore::new(self.initial_window));
        let slot = StreamSlot {
            events: tx,
            window: Arc::clone(&window),
        };
        self.streams
            .lock()
            .expect("stream registry poisoned")
            .insert(id, slot);
        debug!(stream = %id, "stream opened");
        Ok(OpenStream {
            id,
            events: rx,
            window,
            guard: StreamGuard::new(id, Arc::clone(self)),
        })
    }

    /// Removes a stream from the registry. Idempotent; returns whether
    /// the stream was still registered.
    pub(crate) fn release(&self, id: StreamId) -> bool {
        let removed = self
            .streams
            .lock()
            .expect("stream registry poisoned")
            .remove(&id)
            .is_some();
        if removed {
            debug!(stream = %id, "stream released");
        }
        removed
    }

    /// Sends one frame over the shared writer.
    pub(crate) async fn send_frame(&self, frame: Frame) -> Result<(), Status> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Status::unavailable("connection destroyed"));
        }
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(Status::unavailable("connection destroyed"));
        };
        sink.send(frame).await.map_err(|e| {
            self.state.store(STATE_CLOSED, Ordering::Release);
            Status::unavailable(format!("transport send failed: {e}"))
        })
    }

    /// Best-effort reset notification to the peer, usable from
    /// synchronous contexts.
    pub(crate) fn spawn_reset(&self, id: StreamId, status: &Status) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        let frame = Frame::Reset {
            stream_id: id,
            code: status.code().wire_value(),
            message: status.message().to_string(),
        };
        let writer = Arc::clone(&self.writer);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Some(sink) = writer.lock().await.as_mut() {
                    let _ = sink.send(frame).await;
                }
            });
        }
    }

    /// One-shot teardown: drains the connection, aborts the
    /// demultiplexer, fails every registered stream with `Unavailable`,
    /// and releases the transport's write half.
    ///
    /// Safe to call concurrently from any number of tasks; the release
    /// body runs exactly once and later calls return immediately.
    pub(crate) fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("connection destroy");
        self.state.store(STATE_DRAINING, Ordering::Release);
        if let Some(handle) = self
            .demux
            .lock()
            .expect("demux handle poisoned")
            .take()
        {
            handle.abort();
        }
        let slots: Vec<StreamSlot> = {
            let mut streams = self.streams.lock().expect("stream registry poisoned");
            streams.drain().map(|(_, slot)| slot).collect()
        };
        for slot in slots {
            // Closing the window wakes senders suspended on credit; the
            // reset event covers receivers.
            slot.window.close();
            let _ = slot.events.try_send(StreamEvent::Reset(Status::unavailable(
                "client closed",
            )));
        }
        // Drop the sink so the transport's write half closes now. A
        // concurrent send may hold the lock, so take it from a task when
        // a runtime is available.
        let writer = Arc::clone(&self.writer);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                writer.lock().await.take();
            });
        } else if let Ok(mut sink) = writer.try_lock() {
            sink.take();
        }
        self.state.store(STATE_CLOSED, Ordering::Release);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(handle) = self.demux.lock().ok().and_then(|mut h| h.take()) {
            handle.abort();
        }
    }
}

/// Routes inbound frames to their streams until the transport ends.
async fn demux_loop(
    mut source: Box<dyn FrameSource>,
    streams: StreamRegistry,
    state: Arc<AtomicU8>,
    destroyed: Arc<AtomicBool>,
) {
    loop {
        match source.recv().await {
            Ok(Some(frame)) => route_frame(frame, &streams).await,
            Ok(None) => {
                debug!("transport ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "transport receive failed");
                break;
            }
        }
    }
    // Connection loss: every in-flight call resolves Unavailable; sibling
    // isolation is moot because nothing survives the transport.
    if !destroyed.load(Ordering::Acquire) {
        state.store(STATE_CLOSED, Ordering::Release);
        let slots: Vec<StreamSlot> = {
            let mut registry = streams.lock().expect("stream registry poisoned");
            registry.drain().map(|(_, slot)| slot).collect()
        };
        for slot in slots {
            slot.window.close();
            let _ = slot
                .events
                .try_send(StreamEvent::Reset(Status::unavailable("connection lost")));
        }
    }
}

async fn route_frame(frame: Frame, streams: &StreamRegistry) {
    let id = frame.stream_id();
    let target = {
        let registry = streams.lock().expect("stream registry poisoned");
        registry
            .get(&id)
            .map(|slot| (slot.events.clone(), Arc::clone(&slot.window)))
    };
    let Some((events, window)) = target else {
        // Stream already released; late frames are dropped.
        debug!(stream = %id, "frame for unknown stream dropped");
        return;
    };
    let event = match frame {
        Frame::Headers { attachments, .. } => StreamEvent::Headers(attachments),
        Frame::Data {
            payload,
            end_message,
            ..
        } => StreamEvent::Data {
            payload,
            end_message,
        },
        Frame::Trailers {
            code,
            message,
            attachments,
            ..
        } => StreamEvent::Trailers {
            status: Status::from_wire(code, message),
            attachments,
        },
        Frame::Reset { code, message, .. } => {
            StreamEvent::Reset(Status::from_wire(code, message))
        }
        Frame::WindowUpdate { increment, .. } => {
            window.add_permits(increment as usize);
            return;
        }
    };
    // Delivery failure means the receiver is gone; the slot will be
    // cleaned up by its guard.
    let _ = events.send(event).await;
}
