#![forbid(unsafe_code)]

use std::sync::Arc;

use medidesk_domain::{ChatMessage, UserId};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, RealtimeChannelAdapter};
use crate::controller::{ChatSessionController, InboundOutcome, SelectionTicket};
use crate::directory::DirectorySnapshot;
use crate::error::ChatError;
use crate::identity::Credential;

const COMMAND_QUEUE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
	/// Open a conversation (always refetches history).
	Select(UserId),
	/// Leave the open conversation.
	Back,
	/// Send `text` to the open conversation.
	Send(String),
	SetDraft(String),
	SendDraft,
	RefreshDirectory,
	/// End the session: channel closed, in-flight fetches aborted.
	Close,
}

/// State published for the view layer.
#[derive(Debug, Clone)]
pub enum ChatUpdate {
	Directory(Arc<DirectorySnapshot>),
	Messages {
		conversation: Option<UserId>,
		messages: Vec<ChatMessage>,
	},
	/// The draft after a send attempt: empty once sent, retained after a failure.
	Draft(String),
	/// Channel status change (never `ChannelEvent::Message`).
	Channel(ChannelEvent),
	/// Transient failure worth showing; the session keeps running.
	Notification(String),
	/// The credential was rejected; the identity has been cleared.
	ReloginRequired(String),
	Closed,
}

/// Sends commands to a running chat session.
#[derive(Clone)]
pub struct ChatSessionHandle {
	cmd_tx: mpsc::Sender<ChatCommand>,
}

impl ChatSessionHandle {
	pub async fn send(&self, command: ChatCommand) -> Result<(), String> {
		self.cmd_tx
			.send(command)
			.await
			.map_err(|_| "chat session is not running".to_string())
	}

	pub async fn select(&self, counterpart: UserId) -> Result<(), String> {
		self.send(ChatCommand::Select(counterpart)).await
	}

	pub async fn send_message(&self, text: impl Into<String>) -> Result<(), String> {
		self.send(ChatCommand::Send(text.into())).await
	}

	pub async fn close(&self) -> Result<(), String> {
		self.send(ChatCommand::Close).await
	}
}

/// Spawn [`run_chat_session`] on the current runtime.
pub fn start_chat_session(
	controller: ChatSessionController,
	adapter: RealtimeChannelAdapter,
) -> (ChatSessionHandle, mpsc::UnboundedReceiver<ChatUpdate>, JoinHandle<()>) {
	let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
	let (update_tx, update_rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(run_chat_session(controller, adapter, cmd_rx, update_tx));
	(ChatSessionHandle { cmd_tx }, update_rx, task)
}

type HistoryResult = (SelectionTicket, Result<Vec<ChatMessage>, ChatError>);

/// Serializes UI commands, channel events and history completions onto one controller.
pub async fn run_chat_session(
	mut controller: ChatSessionController,
	adapter: RealtimeChannelAdapter,
	mut cmd_rx: mpsc::Receiver<ChatCommand>,
	update_tx: mpsc::UnboundedSender<ChatUpdate>,
) {
	let mut events = adapter.subscribe();
	let mut identity_rx = controller.identity_store().subscribe();
	let mut directory_rx = controller.directory().subscribe();
	let mut fetches: JoinSet<HistoryResult> = JoinSet::new();
	let mut reconnecting = false;

	let initial = identity_rx.borrow_and_update().clone();
	apply_identity(&mut controller, &adapter, initial, &update_tx).await;

	loop {
		tokio::select! {
			cmd = cmd_rx.recv() => {
				let Some(cmd) = cmd else {
					debug!("chat command channel closed");
					break;
				};
				if cmd == ChatCommand::Close {
					break;
				}
				handle_command(&mut controller, &mut fetches, cmd, &update_tx).await;
			}

			Some(event) = events.recv() => match event {
				ChannelEvent::Message(message) => match controller.handle_inbound_event(message).await {
					Ok(InboundOutcome::Appended) => publish_messages(&controller, &update_tx),
					Ok(InboundOutcome::Unseen(_)) => {}
					Err(e) => report(&update_tx, e),
				},
				ChannelEvent::Connected { identity } => {
					let _ = update_tx.send(ChatUpdate::Channel(ChannelEvent::Connected { identity }));
					if reconnecting {
						reconnecting = false;
						// Messages may have arrived while the channel was down.
						if let Err(e) = controller.refresh_directory().await {
							report(&update_tx, e);
						}
					}
				}
				other => {
					if matches!(other, ChannelEvent::Reconnecting { .. } | ChannelEvent::Disconnected { permanent: false, .. }) {
						reconnecting = true;
					}
					let _ = update_tx.send(ChatUpdate::Channel(other));
				}
			},

			changed = identity_rx.changed() => {
				if changed.is_err() {
					warn!("identity store dropped, ending chat session");
					break;
				}
				let credential = identity_rx.borrow_and_update().clone();
				fetches.abort_all();
				reconnecting = false;
				apply_identity(&mut controller, &adapter, credential, &update_tx).await;
			}

			changed = directory_rx.changed() => {
				if changed.is_err() {
					break;
				}
				let snapshot = directory_rx.borrow_and_update().clone();
				let _ = update_tx.send(ChatUpdate::Directory(snapshot));
			}

			Some(joined) = fetches.join_next() => match joined {
				Ok((ticket, history)) => {
					let current = controller.is_current(&ticket);
					match controller.complete_selection(ticket, history).await {
						Ok(()) if current => publish_messages(&controller, &update_tx),
						Ok(()) => {}
						Err(e) => report(&update_tx, e),
					}
				}
				Err(e) if e.is_cancelled() => {}
				Err(e) => warn!(error = %e, "history fetch task failed"),
			},
		}
	}

	fetches.abort_all();
	adapter.shutdown().await;
	info!("chat session ended");
	let _ = update_tx.send(ChatUpdate::Closed);
}

async fn handle_command(
	controller: &mut ChatSessionController,
	fetches: &mut JoinSet<HistoryResult>,
	cmd: ChatCommand,
	update_tx: &mpsc::UnboundedSender<ChatUpdate>,
) {
	match cmd {
		ChatCommand::Select(counterpart) => match controller.begin_selection(&counterpart) {
			Ok(ticket) => {
				publish_messages(controller, update_tx);
				let backend = controller.backend().clone();
				fetches.spawn(async move {
					let history = backend.fetch_history(&ticket.credential, &ticket.counterpart).await;
					(ticket, history)
				});
			}
			Err(e) => report(update_tx, e),
		},
		ChatCommand::Back => {
			fetches.abort_all();
			controller.close_conversation();
			publish_messages(controller, update_tx);
		}
		ChatCommand::Send(text) => match controller.send_message(&text).await {
			Ok(Some(_)) => publish_messages(controller, update_tx),
			Ok(None) => {}
			Err(e) => report(update_tx, e),
		},
		ChatCommand::SetDraft(text) => controller.set_draft(text),
		ChatCommand::SendDraft => match controller.send_draft().await {
			Ok(Some(_)) => {
				publish_messages(controller, update_tx);
				let _ = update_tx.send(ChatUpdate::Draft(String::new()));
			}
			Ok(None) => {}
			Err(e) => {
				let _ = update_tx.send(ChatUpdate::Draft(controller.draft().to_string()));
				report(update_tx, e);
			}
		},
		ChatCommand::RefreshDirectory => {
			if let Err(e) = controller.refresh_directory().await {
				report(update_tx, e);
			}
		}
		ChatCommand::Close => {}
	}
}

async fn apply_identity(
	controller: &mut ChatSessionController,
	adapter: &RealtimeChannelAdapter,
	credential: Option<Credential>,
	update_tx: &mpsc::UnboundedSender<ChatUpdate>,
) {
	controller.reset();
	publish_messages(controller, update_tx);

	let Some(credential) = credential else {
		adapter.close().await;
		return;
	};

	info!(identity = %credential.identity, "starting chat session for identity");
	if let Err(e) = adapter.open(credential.identity).await {
		report(update_tx, e);
	}
	if let Err(e) = controller.refresh_directory().await {
		report(update_tx, e);
	}
}

fn publish_messages(controller: &ChatSessionController, update_tx: &mpsc::UnboundedSender<ChatUpdate>) {
	let _ = update_tx.send(ChatUpdate::Messages {
		conversation: controller.open_conversation().cloned(),
		messages: controller.messages().to_vec(),
	});
}

fn report(update_tx: &mpsc::UnboundedSender<ChatUpdate>, err: ChatError) {
	if err.is_auth() {
		let _ = update_tx.send(ChatUpdate::ReloginRequired(err.to_string()));
		return;
	}
	match err.root() {
		ChatError::Validation(msg) => debug!(%msg, "validation error suppressed"),
		_ => {
			warn!(error = %err, "chat session error");
			let _ = update_tx.send(ChatUpdate::Notification(err.to_string()));
		}
	}
}
