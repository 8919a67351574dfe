#![forbid(unsafe_code)]

use medidesk_client_core::ClientCoreError;
use thiserror::Error;

/// Errors surfaced by the chat session core.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
	/// Credential missing, expired or rejected; the session must re-authenticate.
	#[error("authentication failed: {0}")]
	Auth(String),

	#[error("network error: {0}")]
	Network(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("validation failed: {0}")]
	Validation(String),

	#[error("realtime channel error: {0}")]
	Channel(String),

	#[error("no identity is set")]
	NoIdentity,

	#[error("no conversation is open")]
	NoOpenConversation,

	#[error("send failed: {0}")]
	Send(Box<ChatError>),

	#[error("fetch failed: {0}")]
	Fetch(Box<ChatError>),
}

impl ChatError {
	/// True when this error (or the one it wraps) means the credential is no longer valid.
	pub fn is_auth(&self) -> bool {
		match self {
			ChatError::Auth(_) => true,
			ChatError::Send(inner) | ChatError::Fetch(inner) => inner.is_auth(),
			_ => false,
		}
	}

	/// Innermost error, looking through `Send`/`Fetch` wrappers.
	pub fn root(&self) -> &ChatError {
		match self {
			ChatError::Send(inner) | ChatError::Fetch(inner) => inner.root(),
			other => other,
		}
	}

	pub(crate) fn fetch(inner: ChatError) -> Self {
		ChatError::Fetch(Box::new(inner))
	}

	pub(crate) fn send(inner: ChatError) -> Self {
		ChatError::Send(Box::new(inner))
	}
}

impl From<ClientCoreError> for ChatError {
	fn from(e: ClientCoreError) -> Self {
		match e {
			ClientCoreError::Auth(msg) => ChatError::Auth(msg),
			ClientCoreError::Network(msg) => ChatError::Network(msg),
			ClientCoreError::NotFound(msg) => ChatError::NotFound(msg),
			ClientCoreError::Validation(msg) => ChatError::Validation(msg),
			ClientCoreError::Protocol(msg) => ChatError::Network(format!("unexpected response: {msg}")),
			ClientCoreError::Framing(e) => ChatError::Channel(e.to_string()),
			ClientCoreError::Channel(msg) => ChatError::Channel(msg),
			ClientCoreError::Other(msg) => ChatError::Network(msg),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn auth_is_visible_through_wrappers() {
		let err = ChatError::send(ChatError::Auth("expired".to_string()));
		assert!(err.is_auth());
		assert!(matches!(err.root(), ChatError::Auth(_)));
		assert!(!ChatError::fetch(ChatError::Network("down".to_string())).is_auth());
	}

	#[test]
	fn client_errors_map_onto_the_session_taxonomy() {
		assert!(ChatError::from(ClientCoreError::Auth("401".to_string())).is_auth());
		assert!(matches!(
			ChatError::from(ClientCoreError::Protocol("bad json".to_string())),
			ChatError::Network(_)
		));
		assert!(matches!(
			ChatError::from(ClientCoreError::NotFound("chat".to_string())),
			ChatError::NotFound(_)
		));
	}
}
