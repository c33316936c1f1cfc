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

//! Immutable client configuration.

use std::time::Duration;

/// Default per-call timeout applied when a context carries no deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default maximum payload carried by one data frame.
pub const DEFAULT_MAX_FRAME_PAYLOAD: usize = 16 * 1024;

/// Default send window, in frames, granted to each new stream.
pub const DEFAULT_INITIAL_WINDOW: usize = 64;

/// Default per-stream inbound event buffer.
pub const DEFAULT_STREAM_BUFFER: usize = 32;

/// Configuration captured at client construction and read-only for the
/// client's lifetime.
///
/// Unset fields fall back to usable defaults, so a bare
/// `ClientOptions::new(endpoint)` is a working configuration.
///
/// # Example
///
/// ```rust
/// use triple_client::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("127.0.0.1:20000")
///     .with_default_timeout(Duration::from_secs(5))
///     .with_max_frame_payload(4 * 1024);
///
/// assert_eq!(options.endpoint(), "127.0.0.1:20000");
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    endpoint: String,
    default_timeout: Option<Duration>,
    max_frame_payload: usize,
    initial_window: usize,
    stream_buffer: usize,
}

impl ClientOptions {
    /// Creates options for the given remote endpoint with defaults for
    /// everything else.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            default_timeout: Some(DEFAULT_TIMEOUT),
            max_frame_payload: DEFAULT_MAX_FRAME_PAYLOAD,
            initial_window: DEFAULT_INITIAL_WINDOW,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Sets the fallback timeout for contexts without a deadline.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Removes the fallback timeout; calls without a context deadline
    /// wait indefinitely.
    #[must_use]
    pub fn with_no_default_timeout(mut self) -> Self {
        self.default_timeout = None;
        self
    }

    /// Sets the maximum payload per data frame. Larger bodies are
    /// chunked.
    #[must_use]
    pub fn with_max_frame_payload(mut self, bytes: usize) -> Self {
        self.max_frame_payload = bytes.max(1);
        self
    }

    /// Sets the initial send window, in frames, for each new stream.
    #[must_use]
    pub fn with_initial_window(mut self, frames: usize) -> Self {
        self.initial_window = frames.max(1);
        self
    }

    /// Sets the per-stream inbound event buffer capacity.
    #[must_use]
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }

    /// The remote endpoint address.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The fallback timeout, if any.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Maximum payload per data frame.
    #[must_use]
    pub fn max_frame_payload(&self) -> usize {
        self.max_frame_payload
    }

    /// Initial per-stream send window in frames.
    #[must_use]
    pub fn initial_window(&self) -> usize {
        self.initial_window
    }

    /// Per-stream inbound event buffer capacity.
    #[must_use]
    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }
}
