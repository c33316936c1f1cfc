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

//! The invocation dispatcher.
//!
//! [`TripleClient`] is the whole external surface: `invoke`, `request`,
//! `stream_request`, `close`, and `is_available`, plus construction. The
//! typed-mode binding types ([`ServiceBinder`], [`MethodTable`],
//! [`TripleConn`]) live here as well.

mod client;
mod stub;

pub use crate::options::ClientOptions;
pub use client::TripleClient;
pub use stub::{
    BoundMethod, MethodReply, MethodTable, MethodTableBuilder, ReplySlot, ServiceBinder,
    TripleConn,
};
