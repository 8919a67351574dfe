#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent, names};

/// Default maximum text frame size for v1.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024; // 1 MiB

#[derive(Debug, Error)]
pub enum FramingError {
	#[error("frame exceeds maximum size: len={len} max={max}")]
	FrameTooLarge {
		len: usize,
		max: usize,
	},

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("unexpected frame: {0}")]
	UnexpectedFrame(String),
}

/// JSON text frame `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	pub event: String,
	#[serde(default)]
	pub data: serde_json::Value,
}

impl Envelope {
	pub fn new(event: impl Into<String>, data: impl Serialize) -> Result<Self, FramingError> {
		Ok(Self {
			event: event.into(),
			data: serde_json::to_value(data)?,
		})
	}
}

/// Encode an envelope into a text frame.
pub fn encode_frame(envelope: &Envelope, max_frame_size: usize) -> Result<String, FramingError> {
	if envelope.event.trim().is_empty() {
		return Err(FramingError::UnexpectedFrame("empty event name".to_string()));
	}

	let text = serde_json::to_string(envelope)?;
	if text.len() > max_frame_size {
		return Err(FramingError::FrameTooLarge {
			len: text.len(),
			max: max_frame_size,
		});
	}
	Ok(text)
}

/// Encode a frame using `DEFAULT_MAX_FRAME_SIZE`.
pub fn encode_frame_default(envelope: &Envelope) -> Result<String, FramingError> {
	encode_frame(envelope, DEFAULT_MAX_FRAME_SIZE)
}

/// Encode a client event into a text frame.
pub fn encode_client_event(event: &ClientEvent, max_frame_size: usize) -> Result<String, FramingError> {
	let envelope = match event {
		ClientEvent::Register(payload) => Envelope::new(event.name(), payload)?,
	};
	encode_frame(&envelope, max_frame_size)
}

/// Decode a single text frame into its envelope.
pub fn decode_frame(src: &str, max_frame_size: usize) -> Result<Envelope, FramingError> {
	if src.len() > max_frame_size {
		return Err(FramingError::FrameTooLarge {
			len: src.len(),
			max: max_frame_size,
		});
	}

	let envelope: Envelope = serde_json::from_str(src)?;
	if envelope.event.trim().is_empty() {
		return Err(FramingError::UnexpectedFrame("empty event name".to_string()));
	}
	Ok(envelope)
}

/// Decode a text frame pushed by the server.
///
/// Unrecognized event names decode to `ServerEvent::Unknown` rather than an error.
pub fn decode_server_event(src: &str, max_frame_size: usize) -> Result<ServerEvent, FramingError> {
	let envelope = decode_frame(src, max_frame_size)?;
	let event = match envelope.event.as_str() {
		names::RECEIVE_MESSAGE => ServerEvent::ReceiveMessage(serde_json::from_value(envelope.data)?),
		names::ERROR => ServerEvent::Error(serde_json::from_value(envelope.data)?),
		_ => ServerEvent::Unknown { event: envelope.event },
	};
	Ok(event)
}
