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

//! Wire units exchanged with the underlying stream transport.
//!
//! A [`Frame`] is the smallest unit the transport controller sends or
//! receives. Frames from different logical streams interleave freely on
//! one connection; the `stream_id` field routes each frame to its stream.
//! Within one stream, ordering is preserved: headers before body before
//! half-close on the request side, headers before body before trailers on
//! the response side.

use crate::status::Attachments;
use crate::transport::stream::StreamId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One multiplexed wire unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Frame {
    /// Opening metadata for a stream: the call path, the codec-kind
    /// identifier, and request attachments. On the response side, carries
    /// the peer's response attachments.
    Headers {
        /// The stream this frame belongs to.
        stream_id: StreamId,
        /// Call path of the form `/{interface}/{method}`.
        path: String,
        /// Codec-kind identifier so the peer selects a matching codec.
        codec: String,
        /// Request (or response) attachments.
        attachments: Attachments,
    },

    /// A body chunk. Messages larger than the per-frame limit span
    /// several `Data` frames; `end_message` marks the final chunk of one
    /// message, `end_stream` half-closes the sender's direction.
    Data {
        /// The stream this frame belongs to.
        stream_id: StreamId,
        /// Chunk payload; may be empty on a bare half-close.
        payload: Bytes,
        /// `true` on the last chunk of a message.
        end_message: bool,
        /// `true` when the sender half-closes its direction.
        end_stream: bool,
    },

    /// Terminal status plus trailing attachments, sent by the peer at
    /// call completion.
    Trailers {
        /// The stream this frame belongs to.
        stream_id: StreamId,
        /// Wire status code; unrecognized values map to `Unknown`.
        code: u32,
        /// Status message.
        message: String,
        /// Trailing attachments.
        attachments: Attachments,
    },

    /// Abnormal stream termination. Affects only the named stream.
    Reset {
        /// The stream being reset.
        stream_id: StreamId,
        /// Wire status code describing the reset.
        code: u32,
        /// Status message.
        message: String,
    },

    /// Flow-control credit grant for one stream.
    WindowUpdate {
        /// The stream receiving credit.
        stream_id: StreamId,
        /// Number of additional frames the sender may transmit.
        increment: u32,
    },
}

impl Frame {
    /// Returns the stream this frame belongs to.
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        match self {
            Self::Headers { stream_id, .. }
            | Self::Data { stream_id, .. }
            | Self::Trailers { stream_id, .. }
            | Self::Reset { stream_id, .. }
            | Self::WindowUpdate { stream_id, .. } => *stream_id,
        }
    }
}
