//! Proxy module
//!
//! Prepares inbound Messages API requests, relays them to the upstream and
//! writes the result back to the caller.

pub mod headers;
pub mod logging;
pub mod relay;
pub mod request;
pub mod writer;

pub use relay::{MessagesRelay, RelayOutcome, MESSAGES_PATH};
pub use request::{is_streaming_request, PreparedRequest};
pub use writer::{ChannelResponse, ChannelWriter, ResponseHead, ResponseWriter};
