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

//! Frame transport abstraction.
//!
//! The controller does not know how frames travel; it only requires a
//! send half ([`FrameSink`]) and a receive half ([`FrameSource`]). The
//! crate ships an in-memory pair (testing and in-process use) and a
//! length-prefixed TCP link; wire framing or TLS details of any richer
//! transport belong to the implementation, not to this crate.

use crate::transport::{Frame, TransportError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// The send half of a frame transport.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Sends one frame, suspending until the transport accepts it.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the transport can no longer carry
    /// frames.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;
}

/// The receive half of a frame transport.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` on clean end of transport.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on connection loss or a malformed
    /// frame.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError>;
}

/// In-memory send half. See [`pair`].
#[derive(Debug)]
pub struct MemorySink {
    tx: mpsc::Sender<Frame>,
}

/// In-memory receive half. See [`pair`].
#[derive(Debug)]
pub struct MemorySource {
    rx: mpsc::Receiver<Frame>,
}

/// Creates two connected in-memory frame transports.
///
/// Frames sent on one side's sink arrive at the other side's source, in
/// order. Dropping a side closes the transport for its peer.
///
/// # Example
///
/// ```rust
/// use triple_client::transport::{pair, Frame, FrameSink, FrameSource};
/// use triple_client::transport::StreamId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ((mut client_sink, _client_source), (_server_sink, mut server_source)) = pair(16);
///
/// client_sink
///     .send(Frame::WindowUpdate {
///         stream_id: StreamId::from_u64(1),
///         increment: 4,
///     })
///     .await?;
///
/// let frame = server_source.recv().await?.unwrap();
/// assert_eq!(frame.stream_id().as_u64(), 1);
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn pair(buffer: usize) -> ((MemorySink, MemorySource), (MemorySink, MemorySource)) {
    let (tx1, rx1) = mpsc::channel(buffer);
    let (tx2, rx2) = mpsc::channel(buffer);
    (
        (MemorySink { tx: tx1 }, MemorySource { rx: rx2 }),
        (MemorySink { tx: tx2 }, MemorySource { rx: rx1 }),
    )
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        Ok(self.rx.recv().await)
    }
}
