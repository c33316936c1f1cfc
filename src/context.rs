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

//! Call-scoped context: deadline, cancellation, interface key, and request
//! attachments.
//!
//! Every invocation carries a [`CallContext`]. The context is an explicit
//! type with named fields — required values such as the dynamic-mode
//! interface key are validated at the API boundary instead of being looked
//! up dynamically from an opaque bag.

use crate::status::Attachments;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// A cloneable cancellation signal shared between a caller and its calls.
///
/// Cancelling the token resolves every pending operation carrying it with
/// `Code::Canceled`. Tokens are cheap to clone; all clones observe the
/// same signal.
///
/// # Example
///
/// ```rust
/// use triple_client::context::CancelToken;
///
/// # async fn example() {
/// let token = CancelToken::new();
/// let watcher = token.clone();
///
/// tokio::spawn(async move {
///     token.cancel();
/// });
///
/// watcher.cancelled().await;
/// assert!(watcher.is_cancelled());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates a new, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Fires the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` if the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspends until the token is cancelled.
    ///
    /// Never resolves if every handle capable of cancelling is dropped
    /// without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // All senders gone without a cancel; stay pending forever.
        futures::future::pending::<()>().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call context consumed by [`TripleClient`](crate::client::TripleClient)
/// operations.
///
/// A context carries the dynamic-mode interface key, an absolute deadline
/// derived from [`with_timeout`](CallContext::with_timeout), request
/// attachments, and an optional [`CancelToken`].
///
/// # Example
///
/// ```rust
/// use triple_client::context::CallContext;
/// use std::time::Duration;
///
/// let ctx = CallContext::new()
///     .with_interface("com.example.IGreeter")
///     .with_timeout(Duration::from_secs(3))
///     .with_attachment("trace-id", "abc123");
///
/// assert_eq!(ctx.interface(), Some("com.example.IGreeter"));
/// assert!(ctx.deadline().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    interface: Option<String>,
    deadline: Option<Instant>,
    attachments: Attachments,
    cancel: Option<CancelToken>,
}

impl CallContext {
    /// Creates an empty context: no interface key, no deadline, no
    /// attachments, no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interface key used to build dynamic-mode call paths.
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Sets the call deadline to `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Sets an absolute call deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Adds a request attachment. The last write to a key wins.
    #[must_use]
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key, value);
        self
    }

    /// Attaches a cancellation token to this call.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the interface key, if set.
    #[must_use]
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Returns the absolute deadline, if set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the request attachments.
    #[must_use]
    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Returns the cancellation token, if one is attached.
    #[must_use]
    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// Suspends until this call is cancelled; pending forever if no token
    /// is attached.
    pub(crate) async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => futures::future::pending().await,
        }
    }

    /// Time left until the deadline, saturating at zero once it has
    /// passed. `None` means no deadline.
    pub(crate) fn remaining(&self, fallback: Option<Duration>) -> Option<Duration> {
        let deadline = match self.deadline {
            Some(deadline) => Some(deadline),
            None => fallback.map(|d| Instant::now() + d),
        };
        deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}
