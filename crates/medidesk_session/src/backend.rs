#![forbid(unsafe_code)]

use async_trait::async_trait;
use medidesk_client_core::{ApiClient, Directory};
use medidesk_domain::{ChatMessage, UserId};

use crate::error::ChatError;
use crate::identity::Credential;

/// REST collaborators the chat session depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
	async fn fetch_directory(&self, credential: &Credential) -> Result<Directory, ChatError>;

	async fn fetch_history(&self, credential: &Credential, counterpart: &UserId) -> Result<Vec<ChatMessage>, ChatError>;

	/// Returns the message as persisted by the server.
	async fn send_message(
		&self,
		credential: &Credential,
		counterpart: &UserId,
		content: &str,
	) -> Result<ChatMessage, ChatError>;

	async fn mark_seen(&self, credential: &Credential, counterpart: &UserId) -> Result<(), ChatError>;
}

#[async_trait]
impl ChatBackend for ApiClient {
	async fn fetch_directory(&self, credential: &Credential) -> Result<Directory, ChatError> {
		Ok(ApiClient::fetch_directory(self, &credential.token).await?)
	}

	async fn fetch_history(&self, credential: &Credential, counterpart: &UserId) -> Result<Vec<ChatMessage>, ChatError> {
		Ok(ApiClient::fetch_history(self, &credential.token, counterpart).await?)
	}

	async fn send_message(
		&self,
		credential: &Credential,
		counterpart: &UserId,
		content: &str,
	) -> Result<ChatMessage, ChatError> {
		Ok(ApiClient::send_message(self, &credential.token, &credential.identity, counterpart, content).await?)
	}

	async fn mark_seen(&self, credential: &Credential, counterpart: &UserId) -> Result<(), ChatError> {
		Ok(ApiClient::mark_seen(self, &credential.token, counterpart).await?)
	}
}
