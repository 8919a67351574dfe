#![forbid(unsafe_code)]

//! Realtime channel adapter: one push connection per identity, with bounded reconnects.

mod adapter;
mod reconnect;
mod transport;
mod types;

pub use adapter::{ChannelSubscription, RealtimeChannelAdapter};
pub use reconnect::ReconnectPolicy;
pub use transport::{
	BoxedConnectionControl, BoxedConnectionEvents, ConnectionControlApi, ConnectionEventsApi, RealtimeTransport,
	WebSocketTransport,
};
pub use types::{ChannelEvent, ChannelState, InboundMessage};
