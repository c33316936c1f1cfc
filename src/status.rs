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

//! Typed RPC outcomes: status codes, attachments, and the combined
//! error-with-attachment model.
//!
//! Every call made through this crate resolves to exactly one [`Code`].
//! Remote status codes map bidirectionally onto this taxonomy; an
//! unrecognized wire value maps to [`Code::Unknown`] rather than being
//! dropped or treated as success. Alongside the status, each call carries
//! an [`Attachments`] map — string-keyed metadata exchanged with the peer
//! — and the two are combined in [`ErrorWithAttachment`], the outcome type
//! returned by unary invocations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The closed taxonomy of RPC status codes.
///
/// The numeric wire values follow the widely used RPC status numbering so
/// that statuses produced by this client are indistinguishable in
/// semantics from the wire protocol it interoperates with.
///
/// # Example
///
/// ```rust
/// use triple_client::status::Code;
///
/// assert_eq!(Code::from_wire(14), Code::Unavailable);
/// assert_eq!(Code::Unavailable.wire_value(), 14);
///
/// // Unrecognized values never disappear; they map to Unknown.
/// assert_eq!(Code::from_wire(999), Code::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    /// The call completed successfully.
    Ok,
    /// The call was canceled by the caller.
    Canceled,
    /// The peer reported a status this client does not recognize.
    Unknown,
    /// The caller supplied an invalid argument (detected locally, before
    /// any transport contact).
    InvalidArgument,
    /// The call's deadline expired before a terminal status arrived.
    DeadlineExceeded,
    /// The named method is not part of the bound service.
    Unimplemented,
    /// An internal failure, such as a malformed response body.
    Internal,
    /// The connection is closed, draining, or otherwise unusable.
    Unavailable,
}

impl Code {
    /// Maps a wire status code to its local kind.
    ///
    /// Unrecognized values map to [`Code::Unknown`].
    #[must_use]
    pub const fn from_wire(value: u32) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Canceled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    /// Returns the wire value for this kind.
    #[must_use]
    pub const fn wire_value(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::Canceled => 1,
            Self::Unknown => 2,
            Self::InvalidArgument => 3,
            Self::DeadlineExceeded => 4,
            Self::Unimplemented => 12,
            Self::Internal => 13,
            Self::Unavailable => 14,
        }
    }

    /// Returns the canonical lower-case name of this code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid argument",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A terminal RPC status: a [`Code`] plus a human-readable message.
///
/// `Status` is the error type surfaced by every operation in this crate.
/// It is serializable because it travels in trailer frames.
///
/// # Example
///
/// ```rust
/// use triple_client::status::{Code, Status};
///
/// let status = Status::unavailable("connection closed");
/// assert_eq!(status.code(), Code::Unavailable);
/// assert!(status.to_string().contains("connection closed"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    /// Creates a status with the given code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a `Canceled` status.
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(Code::Canceled, message)
    }

    /// Creates an `Unknown` status.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    /// Creates an `InvalidArgument` status.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// Creates a `DeadlineExceeded` status.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    /// Creates an `Unimplemented` status.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    /// Creates an `Internal` status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// Creates an `Unavailable` status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Reconstructs a status from its wire representation.
    ///
    /// Unrecognized codes become [`Code::Unknown`] with the original
    /// message preserved.
    #[must_use]
    pub fn from_wire(code: u32, message: impl Into<String>) -> Self {
        Self::new(Code::from_wire(code), message)
    }

    /// Returns the status code.
    #[must_use]
    pub const fn code(&self) -> Code {
        self.code
    }

    /// Returns the status message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}

/// Call-scoped, string-keyed metadata exchanged alongside payloads.
///
/// Attachments travel as request metadata and come back on response and
/// trailer metadata. Insertion order is irrelevant and the last write to a
/// key wins. The empty map is the zero value; an absent map never occurs.
///
/// # Example
///
/// ```rust
/// use triple_client::status::Attachments;
///
/// let mut attachments = Attachments::new();
/// attachments.insert("trace-id", "abc");
/// attachments.insert("trace-id", "def"); // last write wins
/// assert_eq!(attachments.get("trace-id"), Some("def"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachments {
    entries: HashMap<String, String>,
}

impl Attachments {
    /// Creates an empty attachment map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair. The last write to a key wins.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Merges `other` into `self`, overwriting colliding keys.
    pub fn merge(&mut self, other: Attachments) {
        self.entries.extend(other.entries);
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attachments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attachments = Self::new();
        for (k, v) in iter {
            attachments.insert(k, v);
        }
        attachments
    }
}

/// The combined outcome of a unary invocation.
///
/// A pair of an optional [`Status`] and an [`Attachments`] map. The call
/// succeeded if and only if `error()` is `None`; the presence or absence
/// of attachments implies nothing about success.
///
/// # Example
///
/// ```rust
/// use triple_client::status::{Attachments, ErrorWithAttachment, Status};
///
/// let ok = ErrorWithAttachment::ok(Attachments::new());
/// assert!(ok.is_ok());
///
/// let failed = ErrorWithAttachment::from_status(Status::internal("boom"));
/// assert!(failed.into_result().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ErrorWithAttachment {
    error: Option<Status>,
    attachments: Attachments,
}

impl ErrorWithAttachment {
    /// Creates an outcome from an optional error and an attachment map.
    #[must_use]
    pub fn new(error: Option<Status>, attachments: Attachments) -> Self {
        Self { error, attachments }
    }

    /// Creates a successful outcome carrying the given attachments.
    #[must_use]
    pub fn ok(attachments: Attachments) -> Self {
        Self::new(None, attachments)
    }

    /// Creates a failed outcome with an empty attachment map.
    #[must_use]
    pub fn from_status(status: Status) -> Self {
        Self::new(Some(status), Attachments::new())
    }

    /// Returns `true` if the call succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Status> {
        self.error.as_ref()
    }

    /// Returns the attachments returned by the peer for this call.
    #[must_use]
    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Converts the outcome into a `Result`, yielding the attachments on
    /// success.
    pub fn into_result(self) -> Result<Attachments, Status> {
        match self.error {
            Some(status) => Err(status),
            None => Ok(self.attachments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_round_trip() {
        for code in [
            Code::Ok,
            Code::Canceled,
            Code::Unknown,
            Code::InvalidArgument,
            Code::DeadlineExceeded,
            Code::Unimplemented,
            Code::Internal,
            Code::Unavailable,
        ] {
            assert_eq!(Code::from_wire(code.wire_value()), code);
        }
    }

    #[test]
    fn test_unrecognized_wire_code_maps_to_unknown() {
        assert_eq!(Code::from_wire(7), Code::Unknown);
        assert_eq!(Code::from_wire(999), Code::Unknown);
        assert_eq!(Code::from_wire(u32::MAX), Code::Unknown);
    }

    #[test]
    fn test_status_display() {
        let status = Status::deadline_exceeded("call timed out");
        let text = status.to_string();
        assert!(text.contains("deadline exceeded"));
        assert!(text.contains("call timed out"));
    }

    #[test]
    fn test_status_from_wire_preserves_message() {
        let status = Status::from_wire(55, "vendor specific failure");
        assert_eq!(status.code(), Code::Unknown);
        assert_eq!(status.message(), "vendor specific failure");
    }

    #[test]
    fn test_attachments_last_write_wins() {
        let mut attachments = Attachments::new();
        attachments.insert("key", "first");
        attachments.insert("key", "second");
        assert_eq!(attachments.get("key"), Some("second"));
        assert_eq!(attachments.len(), 1);
    }

    #[test]
    fn test_attachments_merge_overwrites() {
        let mut base: Attachments = [("a", "1"), ("b", "2")].into_iter().collect();
        let update: Attachments = [("b", "3"), ("c", "4")].into_iter().collect();
        base.merge(update);
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("3"));
        assert_eq!(base.get("c"), Some("4"));
    }

    #[test]
    fn test_attachments_zero_value() {
        let attachments = Attachments::new();
        assert!(attachments.is_empty());
        assert_eq!(attachments.len(), 0);
    }

    #[test]
    fn test_error_with_attachment_success_ignores_attachments() {
        let attachments: Attachments = [("k", "v")].into_iter().collect();
        let outcome = ErrorWithAttachment::ok(attachments);
        assert!(outcome.is_ok());
        assert_eq!(outcome.attachments().get("k"), Some("v"));
    }

    #[test]
    fn test_error_with_attachment_into_result() {
        let ok = ErrorWithAttachment::ok(Attachments::new());
        assert!(ok.into_result().is_ok());

        let failed = ErrorWithAttachment::from_status(Status::internal("boom"));
        let err = failed.into_result().unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    #[test]
    fn test_status_serde_round_trip() {
        let status = Status::unavailable("draining");
        let bytes = serde_json::to_vec(&status).unwrap();
        let decoded: Status = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, status);
    }
}
