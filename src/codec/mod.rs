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

//! Pluggable serialization codecs.
//!
//! A codec is selected once, at client construction, and never swapped
//! afterward. Two concrete variants ship with the crate:
//!
//! - [`PostcardCodec`]: a structured binary codec for the typed,
//!   stub-bound invocation style;
//! - [`JsonCodec`]: a generic parameter-list codec for the dynamic,
//!   path-addressed style.
//!
//! External serializers plug in by implementing [`Codec`]; the value of
//! [`Codec::name`] is the codec-kind identifier carried in request
//! metadata so the peer can select the matching deserializer.

mod error;
mod json;
mod postcard;

pub use error::{DecodeError, EncodeError};
pub use json::JsonCodec;
pub use postcard::PostcardCodec;

/// Serialize/deserialize strategy bound to a client at construction.
///
/// Implementations must be thread-safe; one codec instance is shared by
/// every concurrent call on a client.
///
/// # Example
///
/// ```rust
/// use triple_client::codec::{Codec, PostcardCodec};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct Greeting {
///     name: String,
/// }
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = PostcardCodec::new();
/// let bytes = codec.serialize(&Greeting { name: "triple".into() })?;
/// let decoded: Greeting = codec.deserialize(&bytes)?;
/// assert_eq!(decoded.name, "triple");
/// # Ok(())
/// # }
/// ```
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if the value cannot be represented in
    /// this codec's format.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, EncodeError>
    where
        T: serde::Serialize + ?Sized;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] on malformed input. Failures are always
    /// reported; a decode error never produces a silent default value.
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DecodeError>
    where
        T: serde::de::DeserializeOwned;

    /// The codec-kind identifier carried in request metadata.
    fn name(&self) -> &'static str;

    /// Whether this codec supports the typed, stub-bound invocation
    /// style. Clients only build a method table when the selected codec
    /// is structured.
    fn structured(&self) -> bool;
}
