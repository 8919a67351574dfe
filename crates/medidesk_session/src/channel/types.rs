use medidesk_domain::{ChatMessage, Identity, UserId};
use medidesk_protocol::InboundMessagePayload;

/// Connection lifecycle as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
	Disconnected,
	Connecting,
	Connected,
	Reconnecting { attempt: u32 },
}

/// An inbound chat message tagged with the conversation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
	pub conversation: UserId,
	pub message: ChatMessage,
}

impl From<InboundMessagePayload> for InboundMessage {
	fn from(p: InboundMessagePayload) -> Self {
		Self {
			conversation: p.chat_id,
			message: p.message,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
	Connecting {
		identity: Identity,
	},
	Connected {
		identity: Identity,
	},
	Reconnecting {
		attempt: u32,
		next_retry_in_ms: u64,
	},
	/// `permanent` is set once retries are exhausted or the channel was closed on purpose.
	Disconnected {
		reason: String,
		permanent: bool,
	},
	Message(InboundMessage),
	/// Server-reported `error` event; informational.
	ServerError {
		message: String,
	},
}
