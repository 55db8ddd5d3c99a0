//! Real-time event socket: frame codec, connection and protocol exchanges.

pub mod connection;
pub mod frame;
pub mod protocol;

pub use connection::{EventSocket, ProxyTarget, SocketParams, WsEventSocket};
pub use frame::Frame;
pub use protocol::{ProtocolClient, fetch_project_tree, pull_doc_content};
