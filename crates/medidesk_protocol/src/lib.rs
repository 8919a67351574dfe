#![forbid(unsafe_code)]

pub mod events;
pub mod framing;

pub use events::{ClientEvent, ErrorPayload, InboundMessagePayload, RegisterPayload, ServerEvent};
pub use framing::{
	DEFAULT_MAX_FRAME_SIZE, Envelope, FramingError, decode_frame, decode_server_event, encode_client_event,
	encode_frame, encode_frame_default,
};

/// Protocol version constants.
pub mod version {
	/// Current realtime protocol major version (v1).
	pub const PROTOCOL_MAJOR: u32 = 1;
	/// Current realtime protocol minor version.
	pub const PROTOCOL_MINOR: u32 = 0;

	/// Compact representation useful for logs.
	pub const PROTOCOL_VERSION_U32: u32 = (PROTOCOL_MAJOR << 16) | PROTOCOL_MINOR;
}
