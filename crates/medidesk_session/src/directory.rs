#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use medidesk_domain::{Counterpart, UserId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::error::ChatError;
use crate::identity::SessionIdentityStore;

/// Immutable view of the directory at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
	pub counterparts: Vec<Counterpart>,
	/// Only nonzero counts are present.
	pub unseen: HashMap<UserId, u32>,
}

impl DirectorySnapshot {
	pub fn unseen(&self, id: &UserId) -> u32 {
		self.unseen.get(id).copied().unwrap_or(0)
	}

	pub fn total_unseen(&self) -> u32 {
		self.unseen.values().sum()
	}
}

/// Counterparts available for chat plus per-counterpart unseen counts.
///
/// Every mutation publishes a fresh snapshot to subscribers.
pub struct DirectoryCache {
	snapshot: watch::Sender<Arc<DirectorySnapshot>>,
}

impl DirectoryCache {
	pub fn new() -> Self {
		let (snapshot, _) = watch::channel(Arc::new(DirectorySnapshot::default()));
		Self { snapshot }
	}

	/// Reload from the backend for the current identity.
	///
	/// A rejected credential clears the identity. A result fetched for an identity
	/// that is no longer current is dropped.
	pub async fn refresh(&self, backend: &dyn ChatBackend, identity: &SessionIdentityStore) -> Result<(), ChatError> {
		let credential = identity.current_credential().ok_or(ChatError::NoIdentity)?;

		let directory = match backend.fetch_directory(&credential).await {
			Ok(directory) => directory,
			Err(e) => {
				if e.is_auth() {
					warn!(error = %e, "directory fetch rejected credential");
					identity.clear();
				}
				return Err(ChatError::fetch(e));
			}
		};

		if identity.current_identity().as_ref() != Some(&credential.identity) {
			debug!("identity changed during directory fetch, dropping result");
			return Ok(());
		}

		let unseen = directory.unseen.into_iter().filter(|(_, n)| *n > 0).collect();
		info!(counterparts = directory.counterparts.len(), "directory refreshed");
		self.snapshot.send_replace(Arc::new(DirectorySnapshot {
			counterparts: directory.counterparts,
			unseen,
		}));
		Ok(())
	}

	pub fn list_counterparts(&self) -> Vec<Counterpart> {
		self.snapshot.borrow().counterparts.clone()
	}

	pub fn find(&self, id: &UserId) -> Option<Counterpart> {
		self.snapshot.borrow().counterparts.iter().find(|c| &c.id == id).cloned()
	}

	pub fn unseen(&self, id: &UserId) -> u32 {
		self.snapshot.borrow().unseen(id)
	}

	/// Bump the unseen count for `id` and return the new value.
	pub fn increment_unseen(&self, id: &UserId) -> u32 {
		let mut count = 0;
		self.snapshot.send_modify(|snapshot| {
			let next = Arc::make_mut(snapshot);
			let entry = next.unseen.entry(id.clone()).or_insert(0);
			*entry = entry.saturating_add(1);
			count = *entry;
		});
		debug!(counterpart = %id, unseen = count, "unseen incremented");
		count
	}

	/// Drop the unseen entry for `id`. No notification if there was none.
	pub fn clear_unseen(&self, id: &UserId) {
		self.snapshot.send_if_modified(|snapshot| {
			if !snapshot.unseen.contains_key(id) {
				return false;
			}
			Arc::make_mut(snapshot).unseen.remove(id);
			true
		});
	}

	/// Forget everything (identity change).
	pub fn reset(&self) {
		self.snapshot.send_if_modified(|snapshot| {
			if snapshot.counterparts.is_empty() && snapshot.unseen.is_empty() {
				return false;
			}
			*snapshot = Arc::new(DirectorySnapshot::default());
			true
		});
	}

	pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
		self.snapshot.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<Arc<DirectorySnapshot>> {
		self.snapshot.subscribe()
	}
}

impl Default for DirectoryCache {
	fn default() -> Self {
		Self::new()
	}
}
