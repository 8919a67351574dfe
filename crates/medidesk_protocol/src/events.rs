#![forbid(unsafe_code)]

use medidesk_domain::{ChatMessage, Identity, Role, UserId};
use serde::{Deserialize, Serialize};

/// Event names carried in the envelope's `event` field.
pub mod names {
	pub const REGISTER: &str = "register";
	pub const RECEIVE_MESSAGE: &str = "receiveMessage";
	pub const ERROR: &str = "error";
}

/// Handshake sent right after the transport connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayload {
	#[serde(rename = "userId")]
	pub user_id: UserId,
	pub role: Role,
}

impl From<&Identity> for RegisterPayload {
	fn from(identity: &Identity) -> Self {
		Self {
			user_id: identity.id.clone(),
			role: identity.role,
		}
	}
}

/// A pushed chat message tagged with the conversation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessagePayload {
	#[serde(flatten)]
	pub message: ChatMessage,
	/// Counterpart whose conversation this message belongs to.
	#[serde(rename = "chatId")]
	pub chat_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	#[serde(default)]
	pub message: String,
}

/// Events a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
	Register(RegisterPayload),
}

impl ClientEvent {
	pub const fn name(&self) -> &'static str {
		match self {
			ClientEvent::Register(_) => names::REGISTER,
		}
	}
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
	ReceiveMessage(InboundMessagePayload),
	Error(ErrorPayload),
	/// Event name this client does not handle.
	Unknown { event: String },
}

impl ServerEvent {
	pub fn name(&self) -> &str {
		match self {
			ServerEvent::ReceiveMessage(_) => names::RECEIVE_MESSAGE,
			ServerEvent::Error(_) => names::ERROR,
			ServerEvent::Unknown { event } => event,
		}
	}
}
