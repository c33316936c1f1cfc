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

//! Transport-layer error types.

use thiserror::Error;

/// Errors produced by the underlying frame transport.
///
/// These are connection-level failures. At the controller boundary they
/// are mapped onto [`Code::Unavailable`](crate::status::Code::Unavailable)
/// for the affected call; they never crash the process or corrupt sibling
/// streams.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has been closed and cannot carry further frames.
    #[error("transport closed")]
    Closed,

    /// The connection to the peer was lost.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Human-readable description of the loss.
        reason: String,
    },

    /// An I/O error from the underlying socket.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame exceeded the transport's maximum size.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A frame could not be decoded from the wire.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}
