#![forbid(unsafe_code)]

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt as _, StreamExt as _};
use medidesk_domain::Identity;
use medidesk_protocol::{ClientEvent, FramingError, RegisterPayload, ServerEvent, decode_server_event, encode_client_event};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::{ClientConfig, ClientCoreError};

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Sending half of a realtime connection (register, close).
pub struct RealtimeControl {
	sink: SplitSink<WsStream, Message>,
	identity: Identity,
	max_frame_bytes: usize,
	closed: bool,
}

/// Receiving half of a realtime connection.
pub struct RealtimeEvents {
	stream: SplitStream<WsStream>,
	max_frame_bytes: usize,
}

/// Open the realtime channel for `identity` and send the `register` handshake.
pub async fn connect_realtime(
	cfg: &ClientConfig,
	identity: &Identity,
) -> Result<(RealtimeControl, RealtimeEvents), ClientCoreError> {
	let (mut control, events) = open_realtime(cfg, identity).await?;
	control.register().await?;
	Ok((control, events))
}

/// Transport-level connect only; the caller is responsible for registering.
pub async fn open_realtime(
	cfg: &ClientConfig,
	identity: &Identity,
) -> Result<(RealtimeControl, RealtimeEvents), ClientCoreError> {
	let url = cfg.backend.realtime_url(identity.id.as_str(), identity.role.as_str());
	debug!(%url, "connecting realtime channel");

	let connect_timeout = cfg.connect_timeout;
	let (ws, _resp) = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str()))
		.await
		.map_err(|_| ClientCoreError::Channel(format!("connect timeout after {connect_timeout:?}")))?
		.map_err(|e| ClientCoreError::Channel(format!("connect failed: {e}")))?;

	let (sink, stream) = ws.split();
	info!(identity = %identity, "realtime channel connected");

	let control = RealtimeControl {
		sink,
		identity: identity.clone(),
		max_frame_bytes: cfg.max_frame_bytes,
		closed: false,
	};
	let events = RealtimeEvents {
		stream,
		max_frame_bytes: cfg.max_frame_bytes,
	};
	Ok((control, events))
}

impl RealtimeControl {
	pub fn identity(&self) -> &Identity {
		&self.identity
	}

	/// Associate this connection with the identity it was opened for.
	pub async fn register(&mut self) -> Result<(), ClientCoreError> {
		let event = ClientEvent::Register(RegisterPayload::from(&self.identity));
		self.emit(&event).await
	}

	pub async fn emit(&mut self, event: &ClientEvent) -> Result<(), ClientCoreError> {
		if self.closed {
			return Err(ClientCoreError::Channel("connection already closed".to_string()));
		}
		let frame = encode_client_event(event, self.max_frame_bytes)?;
		debug!(event = event.name(), "emitting realtime event");
		self.sink
			.send(Message::Text(frame.into()))
			.await
			.map_err(|e| ClientCoreError::Channel(format!("send {}: {e}", event.name())))
	}

	/// Send a close frame. Idempotent.
	pub async fn close(&mut self) {
		if self.closed {
			return;
		}
		self.closed = true;
		if let Err(e) = self.sink.send(Message::Close(None)).await {
			debug!(error = %e, "close frame not delivered");
		}
		let _ = self.sink.close().await;
	}
}

impl RealtimeEvents {
	/// Next server event; `None` once the connection has closed.
	///
	/// Undecodable frames are logged and skipped; oversize frames end the connection.
	pub async fn next_event(&mut self) -> Option<Result<ServerEvent, ClientCoreError>> {
		loop {
			let msg = match self.stream.next().await? {
				Ok(msg) => msg,
				Err(e) => return Some(Err(ClientCoreError::Channel(e.to_string()))),
			};

			match msg {
				Message::Text(text) => match decode_server_event(text.as_str(), self.max_frame_bytes) {
					Ok(event) => return Some(Ok(event)),
					Err(e @ FramingError::FrameTooLarge { .. }) => return Some(Err(ClientCoreError::Framing(e))),
					Err(e) => {
						warn!(error = %e, "dropping undecodable realtime frame");
					}
				},
				Message::Close(frame) => {
					info!(?frame, "realtime channel closed by server");
					return None;
				}
				Message::Binary(_) => {
					debug!("ignoring binary realtime frame");
				}
				_ => {}
			}
		}
	}

	/// Run the events loop until close or error.
	pub async fn run_events_loop<F>(&mut self, mut on_event: F) -> Result<(), ClientCoreError>
	where
		F: FnMut(ServerEvent),
	{
		while let Some(event) = self.next_event().await {
			on_event(event?);
		}
		info!("realtime events stream closed");
		Ok(())
	}
}
