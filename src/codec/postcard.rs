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

//! Structured binary codec backed by postcard.

use crate::codec::{Codec, DecodeError, EncodeError};

/// Compact, structured binary codec.
///
/// This is the codec for the typed invocation path: selecting it at
/// construction enables the stub-bound method table. Payloads are small
/// and fast to encode, at the cost of not being human-readable.
///
/// # Example
///
/// ```rust
/// use triple_client::codec::{Codec, PostcardCodec};
///
/// let codec = PostcardCodec::new();
/// assert_eq!(codec.name(), "postcard");
/// assert!(codec.structured());
/// ```
#[derive(Clone, Debug, Default)]
pub struct PostcardCodec;

impl PostcardCodec {
    /// Creates a new postcard codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for PostcardCodec {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, EncodeError>
    where
        T: serde::Serialize + ?Sized,
    {
        postcard::to_allocvec(value).map_err(Into::into)
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DecodeError>
    where
        T: serde::de::DeserializeOwned,
    {
        postcard::from_bytes(bytes).map_err(Into::into)
    }

    fn name(&self) -> &'static str {
        "postcard"
    }

    fn structured(&self) -> bool {
        true
    }
}
