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

//! Stream identity and per-stream routing state.

use crate::status::{Attachments, Status};
use crate::transport::connection::Connection;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Identifier of one logical call multiplexed over a connection.
///
/// Stream ids are connection-scoped: each connection allocates them from
/// its own monotonically increasing counter, so an id is never reused
/// within one connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(u64);

impl StreamId {
    /// Creates a stream id from a raw value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stream({})", self.0)
    }
}

/// Events the connection demultiplexer routes to one stream.
#[derive(Debug)]
pub(crate) enum StreamEvent {
    /// Response metadata arrived.
    Headers(Attachments),
    /// A body chunk arrived; `end_message` closes the current message.
    Data {
        /// Chunk payload.
        payload: Bytes,
        /// `true` on the final chunk of a message.
        end_message: bool,
    },
    /// Terminal status and trailing attachments arrived.
    Trailers {
        /// The mapped terminal status.
        status: Status,
        /// Trailing attachments.
        attachments: Attachments,
    },
    /// The stream was aborted (peer reset, connection loss, or local
    /// teardown).
    Reset(Status),
}

/// Registry entry for one in-flight stream.
#[derive(Debug)]
pub(crate) struct StreamSlot {
    /// Event channel into the stream's owner.
    pub(crate) events: mpsc::Sender<StreamEvent>,
    /// Send-side flow-control window, replenished by peer window updates.
    pub(crate) window: Arc<Semaphore>,
}

/// A freshly allocated stream: its id, event receiver, window, and the
/// release guard.
pub(crate) struct OpenStream {
    pub(crate) id: StreamId,
    pub(crate) events: mpsc::Receiver<StreamEvent>,
    pub(crate) window: Arc<Semaphore>,
    pub(crate) guard: StreamGuard,
}

/// RAII guard ensuring a stream is released from its connection exactly
/// once on every exit path.
///
/// Dropping the guard without an explicit outcome counts as an abnormal
/// exit: the registry entry is removed and a best-effort reset is sent to
/// the peer.
pub(crate) struct StreamGuard {
    id: StreamId,
    conn: Arc<Connection>,
    released: bool,
}

impl StreamGuard {
    pub(crate) fn new(id: StreamId, conn: Arc<Connection>) -> Self {
        Self {
            id,
            conn,
            released: false,
        }
    }

    /// Releases the stream after a clean completion (terminal status
    /// already exchanged); no reset is sent.
    pub(crate) fn finish(&mut self) {
        if !self.released {
            self.released = true;
            self.conn.release(self.id);
        }
    }

    /// Releases the stream after a local failure and notifies the peer
    /// with a best-effort reset frame.
    pub(crate) fn abort(&mut self, status: &Status) {
        if self.released {
            return;
        }
        self.released = true;
        self.conn.release(self.id);
        self.conn.spawn_reset(self.id, status);
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.conn.release(self.id);
            self.conn
                .spawn_reset(self.id, &Status::canceled("stream dropped"));
        }
    }
}
