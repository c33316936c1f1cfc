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

//! Connection management and stream multiplexing.
//!
//! One [`TransportController`] owns one connection to one remote
//! endpoint. Concurrent calls each get their own logical stream; a
//! demultiplexer task routes inbound frames to the stream they belong
//! to, so calls never observe each other's data. Transports plug in
//! through the [`FrameSink`]/[`FrameSource`] traits; the crate ships an
//! in-memory [`pair`] and a length-prefixed [`tcp`] link.

mod connection;
mod controller;
mod error;
mod frame;
mod link;
mod stream;
pub mod tcp;

pub use connection::ConnState;
pub use controller::{StreamHandle, TransportController};
pub use error::TransportError;
pub use frame::Frame;
pub use link::{pair, FrameSink, FrameSource, MemorySink, MemorySource};
pub use stream::StreamId;
