use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context as _;
use medidesk_client_core::{ApiClient, ClientConfig};
use medidesk_domain::{ChatMessage, MessageId, UserId};
use medidesk_session::{
	ChannelEvent, ChatBackend, ChatCommand, ChatSessionController, ChatSessionHandle, ChatUpdate, DirectoryCache,
	DirectorySnapshot, RealtimeChannelAdapter, SessionConfig, SessionIdentityStore, WebSocketTransport,
	start_chat_session,
};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::debug;

/// Interactive chat: status and messages on stdout, input lines from stdin.
pub async fn run_chat(
	api: ApiClient,
	identity: Arc<SessionIdentityStore>,
	cfg: &SessionConfig,
	client_cfg: ClientConfig,
	with: Option<UserId>,
) -> anyhow::Result<()> {
	let backend: Arc<dyn ChatBackend> = Arc::new(api);
	let controller = ChatSessionController::new(identity, Arc::new(DirectoryCache::new()), backend);
	let adapter = RealtimeChannelAdapter::spawn(Arc::new(WebSocketTransport::new(client_cfg)), cfg.reconnect);
	let (handle, mut updates, task) = start_chat_session(controller, adapter);

	if let Some(counterpart) = with {
		handle.select(counterpart).await.map_err(anyhow::Error::msg)?;
	}

	let mut view = ChatView::default();
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdin_open = true;

	loop {
		tokio::select! {
			update = updates.recv() => match update {
				None | Some(ChatUpdate::Closed) => break,
				Some(ChatUpdate::ReloginRequired(reason)) => {
					println!("! {reason}");
					println!("! session expired; run `medidesk_client login` again");
					let _ = handle.close().await;
				}
				Some(update) => view.render(update),
			},

			line = lines.next_line(), if stdin_open => match line.context("read stdin")? {
				Some(line) => {
					if !handle_input(&handle, line.trim()).await {
						let _ = handle.close().await;
					}
				}
				None => {
					stdin_open = false;
					let _ = handle.close().await;
				}
			},

			_ = tokio::signal::ctrl_c() => {
				debug!("interrupted");
				let _ = handle.close().await;
			}
		}
	}

	task.await.context("chat session task")?;
	Ok(())
}

/// Returns `false` when the user asked to quit.
async fn handle_input(handle: &ChatSessionHandle, line: &str) -> bool {
	let command = match line.split_once(' ').unwrap_or((line, "")) {
		("/quit", _) => return false,
		("/back", _) => ChatCommand::Back,
		("/refresh", _) => ChatCommand::RefreshDirectory,
		("/retry", _) => ChatCommand::SendDraft,
		("/open", id) => match UserId::new(id.trim()) {
			Ok(id) => ChatCommand::Select(id),
			Err(e) => {
				println!("! invalid user id: {e}");
				return true;
			}
		},
		_ if line.is_empty() => return true,
		_ => {
			if handle.send(ChatCommand::SetDraft(line.to_string())).await.is_err() {
				return false;
			}
			ChatCommand::SendDraft
		}
	};
	handle.send(command).await.is_ok()
}

#[derive(Default)]
struct ChatView {
	directory: Arc<DirectorySnapshot>,
	conversation: Option<UserId>,
	/// Printed messages of the open conversation; history can land under live messages.
	shown: HashSet<MessageId>,
}

impl ChatView {
	fn render(&mut self, update: ChatUpdate) {
		match update {
			ChatUpdate::Directory(snapshot) => {
				self.directory = snapshot;
				println!("-- directory ({} unseen) --", self.directory.total_unseen());
				for c in &self.directory.counterparts {
					match self.directory.unseen(&c.id) {
						0 => println!("  {}  {}", c.id, c.display_name),
						n => println!("  {}  {}  ({n} unseen)", c.id, c.display_name),
					}
				}
			}
			ChatUpdate::Messages { conversation, messages } => self.render_messages(conversation, &messages),
			ChatUpdate::Draft(draft) if !draft.is_empty() => println!("! unsent: {draft} (/retry to resend)"),
			ChatUpdate::Draft(_) => {}
			ChatUpdate::Channel(event) => match event {
				ChannelEvent::Connecting { .. } => println!("* connecting"),
				ChannelEvent::Connected { identity } => println!("* connected as {identity}"),
				ChannelEvent::Reconnecting {
					attempt,
					next_retry_in_ms,
				} => println!("* connection lost, retry {attempt} in {next_retry_in_ms}ms"),
				ChannelEvent::Disconnected { reason, permanent: true } => println!("* disconnected: {reason}"),
				ChannelEvent::Disconnected { .. } => {}
				ChannelEvent::ServerError { message } => println!("* server: {message}"),
				ChannelEvent::Message(_) => {}
			},
			ChatUpdate::Notification(text) => println!("! {text}"),
			ChatUpdate::ReloginRequired(text) => println!("! {text}"),
			ChatUpdate::Closed => {}
		}
	}

	fn render_messages(&mut self, conversation: Option<UserId>, messages: &[ChatMessage]) {
		if conversation != self.conversation {
			self.conversation = conversation;
			self.shown.clear();
			match &self.conversation {
				Some(id) => {
					let name = self
						.directory
						.counterparts
						.iter()
						.find(|c| &c.id == id)
						.map(|c| c.display_name.as_str())
						.unwrap_or(id.as_str());
					println!("== {name} ==");
				}
				None => println!("== no conversation open =="),
			}
		}
		if messages.is_empty() {
			self.shown.clear();
		}
		for m in messages {
			if self.shown.insert(m.id.clone()) {
				let who = if m.is_from_operator() { "you" } else { "them" };
				println!("[{}] {who}: {}", m.timestamp, m.content);
			}
		}
	}
}
