#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use medidesk_client_core::{Directory, SecretString};
use medidesk_domain::{ChatMessage, Identity, MessageId, Role, UserId};
use medidesk_protocol::{ClientEvent, InboundMessagePayload, ServerEvent};
use medidesk_session::channel::{
	BoxedConnectionControl, BoxedConnectionEvents, ConnectionControlApi, ConnectionEventsApi, RealtimeTransport,
};
use medidesk_session::{ChannelEvent, ChannelSubscription, ChatBackend, ChatError, Credential};
use medidesk_util::env::{env_string, parse_env_bool};
use tokio::sync::{Notify, mpsc};

static LOG_INIT: OnceLock<()> = OnceLock::new();

pub fn init_test_logging() {
	LOG_INIT.get_or_init(|| {
		if !env_string("MEDIDESK_TEST_LOG").and_then(|v| parse_env_bool(&v)).unwrap_or(false) {
			return;
		}

		let _ = tracing_subscriber::fmt()
			.with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
			.with_target(false)
			.try_init();
	});
}

pub fn uid(s: &str) -> UserId {
	UserId::new(s).expect("valid UserId")
}

pub fn operator(id: &str) -> Identity {
	Identity::operator(uid(id))
}

pub fn credential(id: &str) -> Credential {
	Credential::new(operator(id), SecretString::new(format!("tok-{id}")))
}

pub fn msg(id: &str, sender: Role, content: &str) -> ChatMessage {
	ChatMessage {
		id: MessageId::new(id).expect("valid MessageId"),
		sender_role: sender,
		content: content.to_string(),
		timestamp: "2025-01-02T10:00:00Z".to_string(),
	}
}

pub fn receive(conversation: &str, id: &str) -> ServerEvent {
	ServerEvent::ReceiveMessage(InboundMessagePayload {
		message: msg(id, Role::Counterpart, "ping"),
		chat_id: uid(conversation),
	})
}

/// Next event within two seconds.
pub async fn next_event(sub: &mut ChannelSubscription) -> ChannelEvent {
	tokio::time::timeout(Duration::from_secs(2), sub.recv())
		.await
		.expect("channel event in time")
		.expect("subscription open")
}

/// Skip events until one matches `pred`.
pub async fn wait_for(sub: &mut ChannelSubscription, pred: impl Fn(&ChannelEvent) -> bool) -> ChannelEvent {
	loop {
		let event = next_event(sub).await;
		if pred(&event) {
			return event;
		}
	}
}

#[derive(Default)]
pub struct TransportLog {
	/// Identity id per successful connect, in order.
	pub connects: Vec<String>,
	pub attempts: u32,
	pub emitted: Vec<(u64, String)>,
	pub live: HashSet<u64>,
	pub max_live: usize,
	pub disconnected: Vec<u64>,
	feeds: HashMap<u64, mpsc::UnboundedSender<ServerEvent>>,
	fail_next: u32,
}

/// In-memory transport whose connections the test drives by hand.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
	log: Arc<Mutex<TransportLog>>,
}

impl ScriptedTransport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_log<R>(&self, f: impl FnOnce(&TransportLog) -> R) -> R {
		f(&self.log.lock().unwrap())
	}

	pub fn fail_next(&self, n: u32) {
		self.log.lock().unwrap().fail_next = n;
	}

	/// Push a server event on connection `id`.
	pub fn push(&self, id: u64, event: ServerEvent) {
		let log = self.log.lock().unwrap();
		log.feeds.get(&id).expect("known connection").send(event).expect("events loop running");
	}

	/// End connection `id` from the server side.
	pub fn drop_connection(&self, id: u64) {
		self.log.lock().unwrap().feeds.remove(&id);
	}

	pub fn live_count(&self) -> usize {
		self.log.lock().unwrap().live.len()
	}

	pub async fn wait_until_released(&self) {
		for _ in 0..200 {
			if self.live_count() == 0 {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("connection was not released");
	}
}

impl RealtimeTransport for ScriptedTransport {
	fn connect<'a>(
		&'a self,
		identity: &'a Identity,
	) -> Pin<Box<dyn Future<Output = Result<(BoxedConnectionControl, BoxedConnectionEvents), ChatError>> + Send + 'a>> {
		Box::pin(async move {
			let mut log = self.log.lock().unwrap();
			log.attempts += 1;
			if log.fail_next > 0 {
				log.fail_next -= 1;
				return Err(ChatError::Channel("scripted connect failure".to_string()));
			}

			log.connects.push(identity.id.as_str().to_string());
			let id = log.connects.len() as u64;
			log.live.insert(id);
			log.max_live = log.max_live.max(log.live.len());
			let (tx, rx) = mpsc::unbounded_channel();
			log.feeds.insert(id, tx);

			let control = ScriptedControl {
				id,
				log: self.log.clone(),
			};
			Ok((
				Box::new(control) as BoxedConnectionControl,
				Box::new(ScriptedEvents { rx }) as BoxedConnectionEvents,
			))
		})
	}
}

struct ScriptedControl {
	id: u64,
	log: Arc<Mutex<TransportLog>>,
}

impl ConnectionControlApi for ScriptedControl {
	fn emit<'a>(&'a mut self, event: ClientEvent) -> Pin<Box<dyn Future<Output = Result<(), ChatError>> + Send + 'a>> {
		Box::pin(async move {
			self.log.lock().unwrap().emitted.push((self.id, event.name().to_string()));
			Ok(())
		})
	}

	fn disconnect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
		Box::pin(async move {
			let mut log = self.log.lock().unwrap();
			if log.live.remove(&self.id) {
				log.disconnected.push(self.id);
			}
			log.feeds.remove(&self.id);
		})
	}
}

struct ScriptedEvents {
	rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl ConnectionEventsApi for ScriptedEvents {
	fn run_events_loop<'a>(
		&'a mut self,
		mut on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> Pin<Box<dyn Future<Output = Result<(), ChatError>> + Send + 'a>> {
		Box::pin(async move {
			while let Some(event) = self.rx.recv().await {
				on_event(event);
			}
			Ok(())
		})
	}
}

#[derive(Default)]
pub struct BackendState {
	pub directory: Directory,
	pub histories: HashMap<UserId, Vec<ChatMessage>>,
	pub calls: Vec<String>,
	pub fail_history: Option<ChatError>,
	pub fail_send: Option<ChatError>,
	pub sent: u32,
	/// History fetches for these counterparts wait until released.
	pub held: HashMap<UserId, Arc<Notify>>,
}

/// In-memory `ChatBackend`.
#[derive(Default)]
pub struct FakeBackend {
	pub state: Mutex<BackendState>,
}

impl FakeBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn calls(&self) -> Vec<String> {
		self.state.lock().unwrap().calls.clone()
	}

	/// Make history fetches for `counterpart` block until [`release_history`](Self::release_history).
	pub fn hold_history(&self, counterpart: &str) {
		self.state.lock().unwrap().held.insert(uid(counterpart), Arc::new(Notify::new()));
	}

	pub fn release_history(&self, counterpart: &str) {
		if let Some(gate) = self.state.lock().unwrap().held.remove(&uid(counterpart)) {
			gate.notify_one();
		}
	}

	fn record(&self, call: String) {
		self.state.lock().unwrap().calls.push(call);
	}
}

#[async_trait]
impl ChatBackend for FakeBackend {
	async fn fetch_directory(&self, _credential: &Credential) -> Result<Directory, ChatError> {
		self.record("directory".to_string());
		Ok(self.state.lock().unwrap().directory.clone())
	}

	async fn fetch_history(&self, _credential: &Credential, counterpart: &UserId) -> Result<Vec<ChatMessage>, ChatError> {
		self.record(format!("history:{counterpart}"));
		let gate = self.state.lock().unwrap().held.get(counterpart).cloned();
		if let Some(gate) = gate {
			gate.notified().await;
		}
		let state = self.state.lock().unwrap();
		if let Some(err) = state.fail_history.clone() {
			return Err(err);
		}
		Ok(state.histories.get(counterpart).cloned().unwrap_or_default())
	}

	async fn send_message(
		&self,
		_credential: &Credential,
		counterpart: &UserId,
		content: &str,
	) -> Result<ChatMessage, ChatError> {
		self.record(format!("send:{counterpart}:{content}"));
		let mut state = self.state.lock().unwrap();
		if let Some(err) = state.fail_send.clone() {
			return Err(err);
		}
		state.sent += 1;
		Ok(msg(&format!("srv-{}", state.sent), Role::Operator, content))
	}

	async fn mark_seen(&self, _credential: &Credential, counterpart: &UserId) -> Result<(), ChatError> {
		self.record(format!("mark:{counterpart}"));
		Ok(())
	}
}
