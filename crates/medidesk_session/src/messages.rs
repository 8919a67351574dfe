#![forbid(unsafe_code)]

use medidesk_domain::{ChatMessage, UserId};

/// Messages of the single open conversation, oldest first.
#[derive(Debug, Default)]
pub struct MessageStore {
	conversation: Option<UserId>,
	messages: Vec<ChatMessage>,
}

impl MessageStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Switch to `counterpart`; the list is emptied until history arrives.
	pub fn open(&mut self, counterpart: UserId) {
		self.conversation = Some(counterpart);
		self.messages.clear();
	}

	pub fn replace_all(&mut self, messages: Vec<ChatMessage>) {
		self.messages = messages;
	}

	/// Install fetched history underneath whatever was appended since
	/// [`open`](Self::open). Appended messages the history already contains are
	/// dropped; the rest keep their arrival order after the history.
	pub fn load_history(&mut self, history: Vec<ChatMessage>) {
		let live = std::mem::replace(&mut self.messages, history);
		let live: Vec<ChatMessage> = live
			.into_iter()
			.filter(|m| !self.messages.iter().any(|h| h.id == m.id))
			.collect();
		self.messages.extend(live);
	}

	pub fn append(&mut self, message: ChatMessage) {
		self.messages.push(message);
	}

	pub fn clear(&mut self) {
		self.conversation = None;
		self.messages.clear();
	}

	pub fn messages(&self) -> &[ChatMessage] {
		&self.messages
	}

	pub fn conversation(&self) -> Option<&UserId> {
		self.conversation.as_ref()
	}

	pub fn len(&self) -> usize {
		self.messages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use medidesk_domain::{MessageId, Role};

	use super::*;

	fn msg(id: &str) -> ChatMessage {
		ChatMessage {
			id: MessageId::new(id).unwrap(),
			sender_role: Role::Counterpart,
			content: format!("body {id}"),
			timestamp: String::new(),
		}
	}

	#[test]
	fn open_clears_previous_conversation() {
		let mut store = MessageStore::new();
		store.open(UserId::new("u1").unwrap());
		store.replace_all(vec![msg("m1"), msg("m2")]);
		store.append(msg("m3"));
		assert_eq!(store.len(), 3);
		assert_eq!(store.messages()[2].id.as_str(), "m3");

		store.open(UserId::new("u2").unwrap());
		assert!(store.is_empty());
		assert_eq!(store.conversation().unwrap().as_str(), "u2");

		store.clear();
		assert!(store.conversation().is_none());
	}

	#[test]
	fn history_keeps_messages_that_arrived_while_loading() {
		let mut store = MessageStore::new();
		store.open(UserId::new("u1").unwrap());
		store.append(msg("live-1"));
		store.append(msg("h2"));
		store.append(msg("live-2"));

		store.load_history(vec![msg("h1"), msg("h2")]);

		let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
		assert_eq!(ids, vec!["h1", "h2", "live-1", "live-2"]);
	}
}
