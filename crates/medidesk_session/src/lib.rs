#![forbid(unsafe_code)]

//! Chat session core: identity, directory, message history, realtime channel and
//! the controller that ties them together.

pub mod backend;
pub mod channel;
pub mod config;
pub mod controller;
pub mod directory;
pub mod driver;
pub mod error;
pub mod identity;
pub mod messages;
pub mod secrets;

pub use backend::ChatBackend;
pub use channel::{
	ChannelEvent, ChannelState, ChannelSubscription, InboundMessage, RealtimeChannelAdapter, ReconnectPolicy,
	RealtimeTransport, WebSocketTransport,
};
pub use config::{SessionConfig, load_session_config, load_session_config_from_path};
pub use controller::{ChatSessionController, InboundOutcome, SelectionTicket};
pub use directory::{DirectoryCache, DirectorySnapshot};
pub use driver::{ChatCommand, ChatSessionHandle, ChatUpdate, run_chat_session, start_chat_session};
pub use error::ChatError;
pub use identity::{Credential, SessionIdentityStore};
pub use messages::MessageStore;
pub use secrets::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
