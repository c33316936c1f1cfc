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

//! Length-prefixed frame transport over TCP.
//!
//! Each frame is serialized with postcard and preceded by a 4-byte
//! big-endian length:
//!
//! ```text
//! +------------------+-------------------+
//! | Length (4 bytes) | Payload (N bytes) |
//! +------------------+-------------------+
//! ```
//!
//! Frames above [`MAX_WIRE_FRAME`] are rejected on both directions.

use crate::transport::{Frame, FrameSink, FrameSource, TransportError};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Maximum encoded frame size on the wire (16 MB).
pub const MAX_WIRE_FRAME: usize = 16 * 1024 * 1024;

/// Send half of a TCP frame link.
#[derive(Debug)]
pub struct TcpFrameSink {
    writer: OwnedWriteHalf,
}

/// Receive half of a TCP frame link.
#[derive(Debug)]
pub struct TcpFrameSource {
    reader: OwnedReadHalf,
}

/// Dials `addr` and returns the two halves of a TCP frame link.
///
/// # Errors
///
/// Returns a [`TransportError::Io`] if the connection cannot be
/// established.
pub async fn connect(addr: &str) -> Result<(TcpFrameSink, TcpFrameSource), TransportError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let (reader, writer) = stream.into_split();
    Ok((TcpFrameSink { writer }, TcpFrameSource { reader }))
}

/// Wraps an accepted `TcpStream` into a frame link.
///
/// Useful for peers that accept inbound connections carrying this
/// crate's framing.
#[must_use]
pub fn from_stream(stream: TcpStream) -> (TcpFrameSink, TcpFrameSource) {
    let (reader, writer) = stream.into_split();
    (TcpFrameSink { writer }, TcpFrameSource { reader })
}

#[async_trait]
impl FrameSink for TcpFrameSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let payload = postcard::to_allocvec(&frame)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        if payload.len() > MAX_WIRE_FRAME {
            return Err(TransportError::FrameTooLarge {
                size: payload.len(),
                limit: MAX_WIRE_FRAME,
            });
        }
        let len = payload.len() as u32;
        self.writer.write_all(&len.to_be_bytes()).await?;
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl FrameSource for TcpFrameSource {
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_WIRE_FRAME {
            return Err(TransportError::FrameTooLarge {
                size: len,
                limit: MAX_WIRE_FRAME,
            });
        }
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        let frame = postcard::from_bytes(&payload)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        Ok(Some(frame))
    }
}
