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

//! Generic parameter-list codec backed by JSON.

use crate::codec::{Codec, DecodeError, EncodeError};

/// Human-readable codec for the dynamic, path-addressed invocation style.
///
/// Dynamic-mode argument lists serialize naturally as JSON arrays (pass a
/// tuple or `Vec` of parameters), which makes this the codec of choice for
/// non-structured peers. Selecting it leaves the client in dynamic mode;
/// no method table is built.
///
/// # Example
///
/// ```rust
/// use triple_client::codec::{Codec, JsonCodec};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = JsonCodec::new();
/// let bytes = codec.serialize(&("hello", 3))?;
/// assert_eq!(bytes, br#"["hello",3]"#);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a new JSON codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, EncodeError>
    where
        T: serde::Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(Into::into)
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DecodeError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(Into::into)
    }

    fn name(&self) -> &'static str {
        "json"
    }

    fn structured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_parameter_list() {
        let codec = JsonCodec::new();
        let bytes = codec.serialize(&("BigUnaryTest", 7, true)).unwrap();
        let decoded: (String, i32, bool) = codec.deserialize(&bytes).unwrap();
        assert_eq!(decoded, ("BigUnaryTest".to_string(), 7, true));
    }

    #[test]
    fn test_json_invalid_data() {
        let codec = JsonCodec::new();
        let result: Result<Vec<i32>, _> = codec.deserialize(b"not json {");
        assert!(result.is_err());
    }

    #[test]
    fn test_json_is_dynamic() {
        let codec = JsonCodec::new();
        assert_eq!(codec.name(), "json");
        assert!(!codec.structured());
    }
}
