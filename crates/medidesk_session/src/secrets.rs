#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use medidesk_client_core::SecretString;
use tracing::{debug, warn};

use crate::config::settings_dir;

const KEYRING_SERVICE: &str = "medidesk";
const TOKEN_ACCOUNT: &str = "auth_token";
const BEARER_PREFIX: &str = "Bearer ";

/// Durable storage for the session credential.
pub trait CredentialStore: Send + Sync {
	fn save(&self, token: &SecretString) -> anyhow::Result<()>;
	fn load(&self) -> anyhow::Result<Option<SecretString>>;
	fn discard(&self) -> anyhow::Result<()>;
}

/// OS keyring first, `secrets.json` in the settings dir as a fallback.
pub struct KeyringCredentialStore {
	account: String,
	fallback_path: PathBuf,
	use_keyring: bool,
}

impl KeyringCredentialStore {
	pub fn new() -> Self {
		Self {
			account: TOKEN_ACCOUNT.to_string(),
			fallback_path: settings_dir().join("secrets.json"),
			use_keyring: true,
		}
	}

	/// Skip the keyring entirely and persist to `path`.
	pub fn file_only(path: impl Into<PathBuf>) -> Self {
		Self {
			account: TOKEN_ACCOUNT.to_string(),
			fallback_path: path.into(),
			use_keyring: false,
		}
	}

	fn entry(&self) -> Option<keyring::Entry> {
		if !self.use_keyring {
			return None;
		}
		keyring::Entry::new(KEYRING_SERVICE, &self.account).ok()
	}

	fn save_fallback(&self, value: &str) -> anyhow::Result<()> {
		let mut map = read_fallback(&self.fallback_path)?;
		map.insert(self.account.clone(), value.to_string());
		write_fallback(&self.fallback_path, &map)
	}

	fn load_fallback(&self) -> anyhow::Result<Option<String>> {
		let map = read_fallback(&self.fallback_path)?;
		Ok(map.get(&self.account).cloned())
	}

	fn discard_fallback(&self) -> anyhow::Result<()> {
		let mut map = read_fallback(&self.fallback_path)?;
		if map.remove(&self.account).is_some() {
			write_fallback(&self.fallback_path, &map)?;
		}
		Ok(())
	}
}

impl Default for KeyringCredentialStore {
	fn default() -> Self {
		Self::new()
	}
}

impl CredentialStore for KeyringCredentialStore {
	fn save(&self, token: &SecretString) -> anyhow::Result<()> {
		// Stored with the scheme prefix so older sessions read back the same shape.
		let value = format!("{BEARER_PREFIX}{}", token.expose());
		if let Some(entry) = self.entry() {
			match entry.set_password(&value) {
				Ok(()) => return Ok(()),
				Err(e) => warn!(error = %e, "keyring unavailable, falling back to secrets file"),
			}
		}
		self.save_fallback(&value)
	}

	fn load(&self) -> anyhow::Result<Option<SecretString>> {
		let raw = match self.entry().map(|entry| entry.get_password()) {
			Some(Ok(value)) => Some(value),
			Some(Err(keyring::Error::NoEntry)) | None => self.load_fallback()?,
			Some(Err(e)) => {
				debug!(error = %e, "keyring read failed, trying secrets file");
				self.load_fallback()?
			}
		};
		Ok(raw.and_then(|value| normalize_token(&value)))
	}

	fn discard(&self) -> anyhow::Result<()> {
		if let Some(entry) = self.entry() {
			match entry.delete_credential() {
				Ok(()) | Err(keyring::Error::NoEntry) => {}
				Err(e) => warn!(error = %e, "failed to delete keyring credential"),
			}
		}
		self.discard_fallback()
	}
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
	token: Mutex<Option<SecretString>>,
}

impl MemoryCredentialStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_token(token: SecretString) -> Self {
		Self {
			token: Mutex::new(Some(token)),
		}
	}
}

impl CredentialStore for MemoryCredentialStore {
	fn save(&self, token: &SecretString) -> anyhow::Result<()> {
		let mut slot = self.token.lock().map_err(|_| anyhow::anyhow!("credential lock poisoned"))?;
		*slot = Some(token.clone());
		Ok(())
	}

	fn load(&self) -> anyhow::Result<Option<SecretString>> {
		let slot = self.token.lock().map_err(|_| anyhow::anyhow!("credential lock poisoned"))?;
		Ok(slot.as_ref().and_then(|t| normalize_token(t.expose())))
	}

	fn discard(&self) -> anyhow::Result<()> {
		let mut slot = self.token.lock().map_err(|_| anyhow::anyhow!("credential lock poisoned"))?;
		*slot = None;
		Ok(())
	}
}

/// Strip an optional `Bearer ` prefix; blank tokens count as absent.
fn normalize_token(raw: &str) -> Option<SecretString> {
	let raw = raw.trim();
	let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw).trim();
	if token.is_empty() {
		None
	} else {
		Some(SecretString::new(token))
	}
}

fn read_fallback(path: &Path) -> anyhow::Result<HashMap<String, String>> {
	match std::fs::read_to_string(path) {
		Ok(content) => serde_json::from_str(&content).with_context(|| format!("parse {}", path.display())),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
		Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
	}
}

fn write_fallback(path: &Path, map: &HashMap<String, String>) -> anyhow::Result<()> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
	}
	let content = serde_json::to_string_pretty(map)?;
	std::fs::write(path, content).with_context(|| format!("write {}", path.display()))
}
