#![forbid(unsafe_code)]

use std::sync::Arc;

use medidesk_domain::{ChatMessage, UserId};
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::channel::InboundMessage;
use crate::directory::DirectoryCache;
use crate::error::ChatError;
use crate::identity::{Credential, SessionIdentityStore};
use crate::messages::MessageStore;

/// A history fetch started by [`ChatSessionController::begin_selection`].
///
/// Completing a ticket whose generation is no longer current is a no-op.
#[derive(Debug, Clone)]
pub struct SelectionTicket {
	pub generation: u64,
	pub counterpart: UserId,
	pub credential: Credential,
}

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
	/// Appended to the open conversation.
	Appended,
	/// Counted as unseen for another conversation; carries the new count.
	Unseen(u32),
}

pub struct ChatSessionController {
	identity: Arc<SessionIdentityStore>,
	directory: Arc<DirectoryCache>,
	backend: Arc<dyn ChatBackend>,
	messages: MessageStore,
	open: Option<UserId>,
	generation: u64,
	draft: String,
}

impl ChatSessionController {
	pub fn new(
		identity: Arc<SessionIdentityStore>,
		directory: Arc<DirectoryCache>,
		backend: Arc<dyn ChatBackend>,
	) -> Self {
		Self {
			identity,
			directory,
			backend,
			messages: MessageStore::new(),
			open: None,
			generation: 0,
			draft: String::new(),
		}
	}

	pub fn identity_store(&self) -> &Arc<SessionIdentityStore> {
		&self.identity
	}

	pub fn directory(&self) -> &Arc<DirectoryCache> {
		&self.directory
	}

	pub fn backend(&self) -> &Arc<dyn ChatBackend> {
		&self.backend
	}

	pub fn open_conversation(&self) -> Option<&UserId> {
		self.open.as_ref()
	}

	pub fn messages(&self) -> &[ChatMessage] {
		self.messages.messages()
	}

	pub fn draft(&self) -> &str {
		&self.draft
	}

	pub fn set_draft(&mut self, text: impl Into<String>) {
		self.draft = text.into();
	}

	/// Open `counterpart`, load its history and mark it seen.
	///
	/// Reselecting the open conversation refetches.
	pub async fn select_counterpart(&mut self, counterpart: &UserId) -> Result<(), ChatError> {
		let ticket = self.begin_selection(counterpart)?;
		let history = self
			.backend
			.fetch_history(&ticket.credential, &ticket.counterpart)
			.await;
		self.complete_selection(ticket, history).await
	}

	/// First half of a selection: switch the open conversation and empty the
	/// message list. The caller fetches history and hands it to
	/// [`complete_selection`](Self::complete_selection).
	pub fn begin_selection(&mut self, counterpart: &UserId) -> Result<SelectionTicket, ChatError> {
		let credential = self.identity.current_credential().ok_or(ChatError::NoIdentity)?;
		self.generation += 1;
		self.open = Some(counterpart.clone());
		self.messages.open(counterpart.clone());
		debug!(counterpart = %counterpart, generation = self.generation, "conversation selected");
		Ok(SelectionTicket {
			generation: self.generation,
			counterpart: counterpart.clone(),
			credential,
		})
	}

	pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
		ticket.generation == self.generation && self.open.as_ref() == Some(&ticket.counterpart)
	}

	/// Apply a history result. Stale tickets are dropped; messages appended
	/// while the fetch was in flight are kept after the history.
	pub async fn complete_selection(
		&mut self,
		ticket: SelectionTicket,
		history: Result<Vec<ChatMessage>, ChatError>,
	) -> Result<(), ChatError> {
		if !self.is_current(&ticket) {
			debug!(
				counterpart = %ticket.counterpart,
				generation = ticket.generation,
				current = self.generation,
				"discarding stale history"
			);
			return Ok(());
		}

		let history = history.map_err(|e| self.observe(ChatError::fetch(e)))?;
		info!(counterpart = %ticket.counterpart, messages = history.len(), "history loaded");
		self.messages.load_history(history);

		if self.directory.unseen(&ticket.counterpart) > 0 {
			self.mark_seen(&ticket.credential, &ticket.counterpart).await?;
		}
		Ok(())
	}

	pub fn close_conversation(&mut self) {
		if let Some(counterpart) = self.open.take() {
			debug!(counterpart = %counterpart, "conversation closed");
		}
		self.generation += 1;
		self.messages.clear();
	}

	/// Send to the open conversation.
	///
	/// Blank content is ignored and returns `Ok(None)`. On success the message
	/// the server stored is appended and returned.
	pub async fn send_message(&mut self, content: &str) -> Result<Option<ChatMessage>, ChatError> {
		if content.trim().is_empty() {
			debug!("ignoring blank message");
			return Ok(None);
		}
		let counterpart = self.open.clone().ok_or(ChatError::NoOpenConversation)?;
		let credential = self.identity.current_credential().ok_or(ChatError::NoIdentity)?;

		match self.backend.send_message(&credential, &counterpart, content).await {
			Ok(message) => {
				debug!(counterpart = %counterpart, message_id = %message.id, "message sent");
				self.messages.append(message.clone());
				Ok(Some(message))
			}
			Err(e) => Err(self.observe(ChatError::send(e))),
		}
	}

	/// Send the current draft; it is cleared only when the send succeeds.
	pub async fn send_draft(&mut self) -> Result<Option<ChatMessage>, ChatError> {
		let content = self.draft.clone();
		let sent = self.send_message(&content).await?;
		if sent.is_some() {
			self.draft.clear();
		}
		Ok(sent)
	}

	/// Merge a pushed message into the message list or the unseen counts.
	pub async fn handle_inbound_event(&mut self, event: InboundMessage) -> Result<InboundOutcome, ChatError> {
		if self.open.as_ref() != Some(&event.conversation) {
			let count = self.directory.increment_unseen(&event.conversation);
			return Ok(InboundOutcome::Unseen(count));
		}

		self.messages.append(event.message);
		if self.directory.unseen(&event.conversation) > 0 {
			let credential = self.identity.current_credential().ok_or(ChatError::NoIdentity)?;
			self.mark_seen(&credential, &event.conversation).await?;
		}
		Ok(InboundOutcome::Appended)
	}

	/// Reload the directory for the current identity.
	pub async fn refresh_directory(&self) -> Result<(), ChatError> {
		self.directory.refresh(self.backend.as_ref(), &self.identity).await
	}

	/// Forget per-identity state after the identity changed.
	pub fn reset(&mut self) {
		self.close_conversation();
		self.draft.clear();
		self.directory.reset();
	}

	async fn mark_seen(&self, credential: &Credential, counterpart: &UserId) -> Result<(), ChatError> {
		match self.backend.mark_seen(credential, counterpart).await {
			Ok(()) => {
				self.directory.clear_unseen(counterpart);
				Ok(())
			}
			Err(e) => {
				warn!(counterpart = %counterpart, error = %e, "mark seen failed");
				Err(self.observe(e))
			}
		}
	}

	/// Clear the identity when the credential was rejected.
	fn observe(&self, err: ChatError) -> ChatError {
		if err.is_auth() {
			warn!(error = %err, "credential rejected, clearing session identity");
			self.identity.clear();
		}
		err
	}
}
