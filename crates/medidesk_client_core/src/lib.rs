#![forbid(unsafe_code)]

use std::fmt;
use std::time::Duration;

use medidesk_protocol::FramingError;
use medidesk_protocol::framing::DEFAULT_MAX_FRAME_SIZE;
use medidesk_util::endpoint::BackendEndpoint;

pub mod api;
pub mod realtime;

pub use api::{ApiClient, Directory, LoginResponse};
pub use realtime::{RealtimeControl, RealtimeEvents, connect_realtime, open_realtime};

/// Backend used when nothing else is configured (local dev).
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4000";

/// Client configuration shared by the REST and realtime connections.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Backend base endpoint (`http(s)://host[:port]`).
	pub backend: BackendEndpoint,

	/// Value of the `User-Agent` header.
	pub client_name: String,

	/// Timeout applied to every REST request.
	pub request_timeout: Duration,

	/// Timeout for the websocket connect.
	pub connect_timeout: Duration,

	/// Maximum inbound/outbound realtime frame size.
	pub max_frame_bytes: usize,
}

impl ClientConfig {
	/// Parse a backend URL in `http(s)://host[:port]` form.
	pub fn parse_backend_url(url: &str) -> Result<BackendEndpoint, ClientCoreError> {
		BackendEndpoint::parse(url)
			.map_err(|msg| ClientCoreError::Validation(format!("invalid backend url (expected http(s)://host[:port]): {msg}")))
	}

	/// Convenience: create a config from a backend URL.
	pub fn from_backend_url(url: &str) -> Result<Self, ClientCoreError> {
		Ok(Self {
			backend: Self::parse_backend_url(url)?,
			..Self::default()
		})
	}
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			backend: BackendEndpoint {
				scheme: medidesk_util::endpoint::Scheme::Http,
				host: "localhost".to_string(),
				port: Some(4000),
			},
			client_name: format!("medidesk-client-core/{}", env!("CARGO_PKG_VERSION")),
			request_timeout: Duration::from_secs(15),
			connect_timeout: Duration::from_secs(10),
			max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
		}
	}
}

/// Errors for client core operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientCoreError {
	/// Credential missing, expired or rejected (401/403).
	#[error("authentication failed: {0}")]
	Auth(String),

	/// Transport failure or unexpected server status.
	#[error("network error: {0}")]
	Network(String),

	/// Requested resource does not exist (404).
	#[error("not found: {0}")]
	NotFound(String),

	/// Request rejected as invalid, locally or by the server.
	#[error("validation failed: {0}")]
	Validation(String),

	/// Response did not have the expected shape.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// Realtime framing error.
	#[error(transparent)]
	Framing(#[from] FramingError),

	/// Realtime channel failure.
	#[error("channel error: {0}")]
	Channel(String),

	/// Other error.
	#[error("error: {0}")]
	Other(String),
}

impl ClientCoreError {
	pub fn is_auth(&self) -> bool {
		matches!(self, ClientCoreError::Auth(_))
	}
}

impl From<anyhow::Error> for ClientCoreError {
	fn from(e: anyhow::Error) -> Self {
		ClientCoreError::Other(format!("{e:#}"))
	}
}

/// Wrapper that redacts in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
	pub fn new(s: impl Into<String>) -> Self {
		Self(s.into())
	}

	/// Access the inner secret string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretString(<redacted>)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<redacted>")
	}
}
