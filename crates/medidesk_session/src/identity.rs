#![forbid(unsafe_code)]

use std::sync::Arc;

use medidesk_client_core::SecretString;
use medidesk_domain::Identity;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::secrets::{CredentialStore, MemoryCredentialStore};

/// An authenticated identity together with the token that proves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
	pub identity: Identity,
	pub token: SecretString,
}

impl Credential {
	pub fn new(identity: Identity, token: SecretString) -> Self {
		Self { identity, token }
	}
}

/// Holds the current session identity and notifies subscribers when it changes.
///
/// The token is written through to a [`CredentialStore`] so a restart can restore it.
pub struct SessionIdentityStore {
	current: watch::Sender<Option<Credential>>,
	persistence: Arc<dyn CredentialStore>,
}

impl SessionIdentityStore {
	pub fn new(persistence: Arc<dyn CredentialStore>) -> Self {
		let (current, _) = watch::channel(None);
		Self { current, persistence }
	}

	/// Store backed by process memory only.
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryCredentialStore::new()))
	}

	/// Replace the current identity. Subscribers are notified only on an actual change.
	pub fn set_identity(&self, credential: Option<Credential>) {
		match &credential {
			Some(cred) => {
				if let Err(e) = self.persistence.save(&cred.token) {
					warn!(error = %e, "failed to persist credential");
				}
			}
			None => {
				if let Err(e) = self.persistence.discard() {
					warn!(error = %e, "failed to discard persisted credential");
				}
			}
		}

		let changed = self.current.send_if_modified(|slot| {
			if *slot == credential {
				return false;
			}
			*slot = credential.clone();
			true
		});
		if changed {
			match &credential {
				Some(cred) => info!(identity = %cred.identity, "session identity set"),
				None => info!("session identity cleared"),
			}
		}
	}

	/// Drop the identity and its persisted token (logout or rejected credential).
	pub fn clear(&self) {
		self.set_identity(None);
	}

	pub fn current_identity(&self) -> Option<Identity> {
		self.current.borrow().as_ref().map(|c| c.identity.clone())
	}

	pub fn current_credential(&self) -> Option<Credential> {
		self.current.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
		self.current.subscribe()
	}

	/// Token persisted by an earlier session, if any. The caller re-validates it.
	pub fn restore(&self) -> Option<SecretString> {
		match self.persistence.load() {
			Ok(token) => {
				debug!(found = token.is_some(), "restored persisted credential");
				token
			}
			Err(e) => {
				warn!(error = %e, "failed to read persisted credential");
				None
			}
		}
	}
}
