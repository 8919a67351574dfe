use std::future::Future;
use std::pin::Pin;

use medidesk_client_core::{ClientConfig, RealtimeControl, RealtimeEvents, open_realtime};
use medidesk_domain::Identity;
use medidesk_protocol::{ClientEvent, ServerEvent};

use crate::error::ChatError;

pub type BoxedConnectionControl = Box<dyn ConnectionControlApi>;
pub type BoxedConnectionEvents = Box<dyn ConnectionEventsApi>;

/// Opens push connections. Implementations only establish the transport;
/// the adapter sends the `register` handshake itself.
pub trait RealtimeTransport: Send + Sync {
	fn connect<'a>(
		&'a self,
		identity: &'a Identity,
	) -> Pin<Box<dyn Future<Output = Result<(BoxedConnectionControl, BoxedConnectionEvents), ChatError>> + Send + 'a>>;
}

pub trait ConnectionControlApi: Send {
	fn emit<'a>(&'a mut self, event: ClientEvent) -> Pin<Box<dyn Future<Output = Result<(), ChatError>> + Send + 'a>>;

	fn disconnect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

pub trait ConnectionEventsApi: Send {
	/// Runs until the connection ends; `Ok` on a clean close.
	fn run_events_loop<'a>(
		&'a mut self,
		on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> Pin<Box<dyn Future<Output = Result<(), ChatError>> + Send + 'a>>;
}

/// Websocket transport backed by `medidesk_client_core`.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
	cfg: ClientConfig,
}

impl WebSocketTransport {
	pub fn new(cfg: ClientConfig) -> Self {
		Self { cfg }
	}
}

impl RealtimeTransport for WebSocketTransport {
	fn connect<'a>(
		&'a self,
		identity: &'a Identity,
	) -> Pin<Box<dyn Future<Output = Result<(BoxedConnectionControl, BoxedConnectionEvents), ChatError>> + Send + 'a>> {
		Box::pin(async move {
			let (control, events) = open_realtime(&self.cfg, identity).await?;
			Ok((Box::new(control) as BoxedConnectionControl, Box::new(events) as BoxedConnectionEvents))
		})
	}
}

impl ConnectionControlApi for RealtimeControl {
	fn emit<'a>(&'a mut self, event: ClientEvent) -> Pin<Box<dyn Future<Output = Result<(), ChatError>> + Send + 'a>> {
		Box::pin(async move { Ok(RealtimeControl::emit(self, &event).await?) })
	}

	fn disconnect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
		Box::pin(RealtimeControl::close(self))
	}
}

impl ConnectionEventsApi for RealtimeEvents {
	fn run_events_loop<'a>(
		&'a mut self,
		on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> Pin<Box<dyn Future<Output = Result<(), ChatError>> + Send + 'a>> {
		Box::pin(async move { Ok(RealtimeEvents::run_events_loop(self, on_event).await?) })
	}
}
