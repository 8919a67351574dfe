use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use medidesk_domain::Identity;
use medidesk_protocol::{ClientEvent, RegisterPayload, ServerEvent};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::reconnect::ReconnectPolicy;
use super::transport::{BoxedConnectionControl, BoxedConnectionEvents, RealtimeTransport};
use super::types::{ChannelEvent, ChannelState, InboundMessage};
use crate::error::ChatError;

const NOT_RUNNING: &str = "channel task is not running";

type MessageHandler = Box<dyn FnMut(&InboundMessage) + Send>;

enum Listener {
	Events(mpsc::UnboundedSender<ChannelEvent>),
	Messages(MessageHandler),
}

enum ChannelCommand {
	Open {
		identity: Identity,
		reply: oneshot::Sender<Result<(), ChatError>>,
	},
	Close {
		reply: oneshot::Sender<()>,
	},
	Subscribe {
		id: u64,
		listener: Listener,
	},
	Unsubscribe {
		id: u64,
	},
	Shutdown {
		reply: Option<oneshot::Sender<()>>,
	},
}

enum ConnectionSignal {
	Event { connection: u64, event: ServerEvent },
	Ended { connection: u64, reason: String },
}

/// Handle to the task that owns the single realtime connection.
///
/// Dropping the handle shuts the task down and releases the connection.
pub struct RealtimeChannelAdapter {
	cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
	state_rx: watch::Receiver<ChannelState>,
	next_listener: AtomicU64,
	task: Option<JoinHandle<()>>,
}

/// Live registration with the adapter. Unregisters on drop.
pub struct ChannelSubscription {
	id: u64,
	cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
	events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
}

impl ChannelSubscription {
	/// Next channel event. Always `None` for handler-based subscriptions.
	pub async fn recv(&mut self) -> Option<ChannelEvent> {
		match self.events.as_mut() {
			Some(rx) => rx.recv().await,
			None => None,
		}
	}
}

impl Drop for ChannelSubscription {
	fn drop(&mut self) {
		let _ = self.cmd_tx.send(ChannelCommand::Unsubscribe { id: self.id });
	}
}

impl RealtimeChannelAdapter {
	/// Spawn the channel task on the current runtime.
	pub fn spawn(transport: Arc<dyn RealtimeTransport>, policy: ReconnectPolicy) -> Self {
		let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
		let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
		let (signal_tx, signal_rx) = mpsc::unbounded_channel();

		let task = ChannelTask {
			transport,
			policy,
			state_tx,
			signal_tx,
			listeners: HashMap::new(),
			target: None,
			live: None,
			next_connection: 0,
			reconnect_attempt: 0,
			reconnect_deadline: None,
		};
		let handle = tokio::spawn(task.run(cmd_rx, signal_rx));

		Self {
			cmd_tx,
			state_rx,
			next_listener: AtomicU64::new(1),
			task: Some(handle),
		}
	}

	/// Connect for `identity` and send `register`.
	///
	/// A no-op when already connected for the same identity. A different identity
	/// closes the current connection before the new one is opened. On failure a
	/// retry is already scheduled when this returns.
	pub async fn open(&self, identity: Identity) -> Result<(), ChatError> {
		let (reply, rx) = oneshot::channel();
		self.cmd_tx
			.send(ChannelCommand::Open { identity, reply })
			.map_err(|_| ChatError::Channel(NOT_RUNNING.to_string()))?;
		rx.await.map_err(|_| ChatError::Channel(NOT_RUNNING.to_string()))?
	}

	/// Tear the connection down and stop retrying. Idempotent.
	pub async fn close(&self) {
		let (reply, rx) = oneshot::channel();
		if self.cmd_tx.send(ChannelCommand::Close { reply }).is_ok() {
			let _ = rx.await;
		}
	}

	/// Receive every channel event (status changes and messages).
	pub fn subscribe(&self) -> ChannelSubscription {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut sub = self.register_listener(Listener::Events(tx));
		sub.events = Some(rx);
		sub
	}

	/// Invoke `handler` for every inbound chat message, in arrival order.
	pub fn on_message<F>(&self, handler: F) -> ChannelSubscription
	where
		F: FnMut(&InboundMessage) + Send + 'static,
	{
		self.register_listener(Listener::Messages(Box::new(handler)))
	}

	fn register_listener(&self, listener: Listener) -> ChannelSubscription {
		let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
		if self.cmd_tx.send(ChannelCommand::Subscribe { id, listener }).is_err() {
			debug!(listener = id, "subscribing to a stopped channel task");
		}
		ChannelSubscription {
			id,
			cmd_tx: self.cmd_tx.clone(),
			events: None,
		}
	}

	pub fn state(&self) -> ChannelState {
		*self.state_rx.borrow()
	}

	pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
		self.state_rx.clone()
	}

	/// Close the connection and wait for the task to exit.
	pub async fn shutdown(mut self) {
		let (reply, rx) = oneshot::channel();
		if self.cmd_tx.send(ChannelCommand::Shutdown { reply: Some(reply) }).is_ok() {
			let _ = rx.await;
		}
		if let Some(task) = self.task.take() {
			let _ = task.await;
		}
	}
}

impl Drop for RealtimeChannelAdapter {
	fn drop(&mut self) {
		if self.task.is_some() {
			let _ = self.cmd_tx.send(ChannelCommand::Shutdown { reply: None });
		}
	}
}

struct LiveConnection {
	id: u64,
	identity: Identity,
	control: BoxedConnectionControl,
	events_task: JoinHandle<()>,
}

struct ChannelTask {
	transport: Arc<dyn RealtimeTransport>,
	policy: ReconnectPolicy,
	state_tx: watch::Sender<ChannelState>,
	signal_tx: mpsc::UnboundedSender<ConnectionSignal>,
	listeners: HashMap<u64, Listener>,
	target: Option<Identity>,
	live: Option<LiveConnection>,
	next_connection: u64,
	reconnect_attempt: u32,
	reconnect_deadline: Option<Instant>,
}

impl ChannelTask {
	async fn run(
		mut self,
		mut cmd_rx: mpsc::UnboundedReceiver<ChannelCommand>,
		mut signal_rx: mpsc::UnboundedReceiver<ConnectionSignal>,
	) {
		loop {
			let deadline = self.reconnect_deadline;
			tokio::select! {
				cmd = cmd_rx.recv() => match cmd {
					Some(ChannelCommand::Open { identity, reply }) => {
						let res = self.open(identity).await;
						let _ = reply.send(res);
					}
					Some(ChannelCommand::Close { reply }) => {
						self.close("closed").await;
						let _ = reply.send(());
					}
					Some(ChannelCommand::Subscribe { id, listener }) => {
						self.listeners.insert(id, listener);
					}
					Some(ChannelCommand::Unsubscribe { id }) => {
						if self.listeners.remove(&id).is_some() {
							debug!(listener = id, "channel listener removed");
						}
					}
					Some(ChannelCommand::Shutdown { reply }) => {
						self.close("shutdown").await;
						if let Some(reply) = reply {
							let _ = reply.send(());
						}
						break;
					}
					None => {
						self.close("adapter dropped").await;
						break;
					}
				},

				Some(signal) = signal_rx.recv() => self.on_signal(signal).await,

				_ = async {
					if let Some(deadline) = deadline {
						tokio::time::sleep_until(deadline).await;
					}
				}, if deadline.is_some() => {
					self.reconnect_deadline = None;
					if let Some(identity) = self.target.clone() {
						info!(identity = %identity, attempt = self.reconnect_attempt, "reconnecting realtime channel");
						let _ = self.connect(identity).await;
					}
				}
			}
		}
		debug!("channel task stopped");
	}

	async fn open(&mut self, identity: Identity) -> Result<(), ChatError> {
		if let Some(live) = self.live.as_ref()
			&& live.identity == identity
		{
			debug!(identity = %identity, "channel already open for identity");
			return Ok(());
		}

		if self.teardown().await {
			info!(identity = %identity, "identity changed, previous connection closed");
		}
		self.target = Some(identity.clone());
		self.reconnect_attempt = 0;
		self.reconnect_deadline = None;
		self.connect(identity).await
	}

	async fn close(&mut self, reason: &str) {
		let had_connection = self.teardown().await;
		let had_target = self.target.take().is_some();
		self.reconnect_attempt = 0;
		self.reconnect_deadline = None;

		if had_connection || had_target {
			info!(reason, "realtime channel closed");
			self.set_state(ChannelState::Disconnected);
			self.broadcast(ChannelEvent::Disconnected {
				reason: reason.to_string(),
				permanent: true,
			});
		}
	}

	/// Release the live connection, if any. The events task is aborted before
	/// the transport is disconnected so no late events escape.
	async fn teardown(&mut self) -> bool {
		let Some(mut live) = self.live.take() else {
			return false;
		};
		live.events_task.abort();
		live.control.disconnect().await;
		debug!(identity = %live.identity, connection = live.id, "realtime connection released");
		true
	}

	async fn connect(&mut self, identity: Identity) -> Result<(), ChatError> {
		self.set_state(ChannelState::Connecting);
		self.broadcast(ChannelEvent::Connecting {
			identity: identity.clone(),
		});

		match self.establish(&identity).await {
			Ok((id, control, events)) => {
				let events_task = spawn_events_loop(id, events, self.signal_tx.clone());
				self.live = Some(LiveConnection {
					id,
					identity: identity.clone(),
					control,
					events_task,
				});
				self.reconnect_attempt = 0;
				info!(identity = %identity, connection = id, "realtime channel registered");
				self.set_state(ChannelState::Connected);
				self.broadcast(ChannelEvent::Connected { identity });
				Ok(())
			}
			Err(e) => {
				warn!(identity = %identity, error = %e, "realtime connect failed");
				self.schedule_retry(e.to_string());
				Err(e)
			}
		}
	}

	async fn establish(
		&mut self,
		identity: &Identity,
	) -> Result<(u64, BoxedConnectionControl, BoxedConnectionEvents), ChatError> {
		let (mut control, events) = self.transport.connect(identity).await?;
		if let Err(e) = control.emit(ClientEvent::Register(RegisterPayload::from(identity))).await {
			control.disconnect().await;
			return Err(e);
		}
		self.next_connection += 1;
		Ok((self.next_connection, control, events))
	}

	fn schedule_retry(&mut self, reason: String) {
		self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
		match self.policy.schedule(self.reconnect_attempt) {
			Some((deadline, ms)) => {
				self.reconnect_deadline = Some(deadline);
				self.set_state(ChannelState::Reconnecting {
					attempt: self.reconnect_attempt,
				});
				self.broadcast(ChannelEvent::Reconnecting {
					attempt: self.reconnect_attempt,
					next_retry_in_ms: ms,
				});
			}
			None => {
				warn!(attempts = self.policy.max_attempts, "realtime reconnect attempts exhausted");
				self.reconnect_deadline = None;
				self.set_state(ChannelState::Disconnected);
				self.broadcast(ChannelEvent::Disconnected {
					reason,
					permanent: true,
				});
			}
		}
	}

	async fn on_signal(&mut self, signal: ConnectionSignal) {
		let current = self.live.as_ref().map(|l| l.id);
		match signal {
			ConnectionSignal::Event { connection, event } if current == Some(connection) => self.dispatch(event),
			ConnectionSignal::Ended { connection, reason } if current == Some(connection) => {
				warn!(connection, %reason, "realtime connection dropped");
				if let Some(mut live) = self.live.take() {
					live.control.disconnect().await;
				}
				self.broadcast(ChannelEvent::Disconnected {
					reason: reason.clone(),
					permanent: false,
				});
				self.schedule_retry(reason);
			}
			ConnectionSignal::Event { connection, .. } | ConnectionSignal::Ended { connection, .. } => {
				debug!(connection, "ignoring signal from a released connection");
			}
		}
	}

	fn dispatch(&mut self, event: ServerEvent) {
		match event {
			ServerEvent::ReceiveMessage(payload) => {
				let message = InboundMessage::from(payload);
				debug!(conversation = %message.conversation, message_id = %message.message.id, "inbound message");
				self.broadcast(ChannelEvent::Message(message));
			}
			ServerEvent::Error(payload) => {
				warn!(message = %payload.message, "realtime server reported an error");
				self.broadcast(ChannelEvent::ServerError {
					message: payload.message,
				});
			}
			ServerEvent::Unknown { event } => {
				debug!(%event, "ignoring unknown realtime event");
			}
		}
	}

	fn broadcast(&mut self, event: ChannelEvent) {
		self.listeners.retain(|id, listener| match listener {
			Listener::Events(tx) => {
				let alive = tx.send(event.clone()).is_ok();
				if !alive {
					debug!(listener = id, "dropping closed channel listener");
				}
				alive
			}
			Listener::Messages(handler) => {
				if let ChannelEvent::Message(message) = &event {
					handler(message);
				}
				true
			}
		});
	}

	fn set_state(&self, state: ChannelState) {
		self.state_tx.send_if_modified(|current| {
			if *current == state {
				return false;
			}
			*current = state;
			true
		});
	}
}

fn spawn_events_loop(
	connection: u64,
	mut events: BoxedConnectionEvents,
	signal_tx: mpsc::UnboundedSender<ConnectionSignal>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		let forward = signal_tx.clone();
		let res = events
			.run_events_loop(Box::new(move |event| {
				let _ = forward.send(ConnectionSignal::Event { connection, event });
			}))
			.await;

		let reason = match res {
			Ok(()) => "events stream closed".to_string(),
			Err(e) => e.to_string(),
		};
		let _ = signal_tx.send(ConnectionSignal::Ended { connection, reason });
	})
}
