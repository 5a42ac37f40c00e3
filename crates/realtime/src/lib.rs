//! Client side of the Kindred real-time layer plus the frame format shared
//! with the `/ws` hub in `kindred-api`.

pub mod chat;
pub mod client;
pub mod error;
pub mod protocol;
pub mod state;
pub mod transport;

pub use chat::{ChatError, ChatSession};
pub use client::{ClientConfig, Handler, RealtimeClient};
pub use error::RealtimeError;
pub use protocol::{Ack, Frame, LocalFailure, MessagePayload};
pub use state::{ConnectionState, ConnectionStatus};
pub use transport::{Connector, Link, MemoryConnector, ServerEnd, WsConnector};
