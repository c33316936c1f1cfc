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

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod context;
pub mod options;
pub mod status;
pub mod transport;

pub use client::{ClientOptions, TripleClient};
pub use codec::{Codec, JsonCodec, PostcardCodec};
pub use context::{CallContext, CancelToken};
pub use status::{Attachments, Code, ErrorWithAttachment, Status};
