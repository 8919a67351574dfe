#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use medidesk_client_core::{ClientConfig, DEFAULT_BACKEND_URL};
use medidesk_util::endpoint::validate_backend_endpoint;
use medidesk_util::env::{env_string, parse_env_nonzero_u64};
use serde::Deserialize;
use tracing::{info, warn};

use crate::channel::ReconnectPolicy;

/// Settings directory: `<config dir>/medidesk`, falling back to `~/.config/medidesk`.
pub fn settings_dir() -> PathBuf {
	if let Some(dir) = dirs::config_dir() {
		return dir.join("medidesk");
	}
	dirs::home_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join(".config")
		.join("medidesk")
}

/// Default config path: `~/.config/medidesk/config.toml`.
pub fn default_config_path() -> PathBuf {
	settings_dir().join("config.toml")
}

/// Load the session config from TOML and env overrides.
pub fn load_session_config() -> anyhow::Result<SessionConfig> {
	load_session_config_from_path(&default_config_path())
}

/// Same as `load_session_config` but with an explicit config path.
pub fn load_session_config_from_path(path: &Path) -> anyhow::Result<SessionConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = SessionConfig::from_file(file_cfg);
	apply_env_overrides(&mut cfg, env_string);
	cfg.validate()?;
	Ok(cfg)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	/// Backend base URL, `http(s)://host[:port]`.
	pub backend_url: String,
	pub request_timeout: Option<Duration>,
	pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			backend_url: DEFAULT_BACKEND_URL.to_string(),
			request_timeout: None,
			reconnect: ReconnectPolicy::default(),
		}
	}
}

impl SessionConfig {
	fn from_file(file: FileConfig) -> Self {
		let defaults = ReconnectPolicy::default();
		let reconnect = ReconnectPolicy {
			max_attempts: file.reconnect.max_attempts.unwrap_or(defaults.max_attempts),
			base_delay: file
				.reconnect
				.base_delay_ms
				.filter(|v| *v > 0)
				.map(Duration::from_millis)
				.unwrap_or(defaults.base_delay),
			max_delay: file
				.reconnect
				.max_delay_ms
				.filter(|v| *v > 0)
				.map(Duration::from_millis)
				.unwrap_or(defaults.max_delay),
		};

		Self {
			backend_url: file
				.backend_url
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
			request_timeout: file.request_timeout_ms.filter(|v| *v > 0).map(Duration::from_millis),
			reconnect,
		}
	}

	fn validate(&mut self) -> anyhow::Result<()> {
		validate_backend_endpoint(&self.backend_url)
			.map_err(|e| anyhow!("invalid backend_url {:?}: {e}", self.backend_url))?;

		if self.reconnect.base_delay > self.reconnect.max_delay {
			warn!(
				base_ms = self.reconnect.base_delay.as_millis(),
				max_ms = self.reconnect.max_delay.as_millis(),
				"reconnect config: base_delay > max_delay; swapping"
			);
			std::mem::swap(&mut self.reconnect.base_delay, &mut self.reconnect.max_delay);
		}
		Ok(())
	}

	/// REST/realtime client config for this session.
	pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
		let mut cfg = ClientConfig::from_backend_url(&self.backend_url)?;
		if let Some(timeout) = self.request_timeout {
			cfg.request_timeout = timeout;
		}
		Ok(cfg)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	backend_url: Option<String>,
	request_timeout_ms: Option<u64>,

	#[serde(default)]
	reconnect: FileReconnectSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileReconnectSettings {
	max_attempts: Option<u32>,
	base_delay_ms: Option<u64>,
	max_delay_ms: Option<u64>,
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(cfg: &mut SessionConfig, lookup: impl Fn(&str) -> Option<String>) {
	if let Some(v) = lookup("MEDIDESK_BACKEND_URL") {
		cfg.backend_url = v;
		info!("session config: backend_url overridden by env");
	}

	if let Some(v) = lookup("MEDIDESK_REQUEST_TIMEOUT_MS")
		&& let Some(ms) = parse_env_nonzero_u64(&v)
	{
		cfg.request_timeout = Some(Duration::from_millis(ms));
		info!(ms, "session config: request_timeout overridden by env");
	}

	if let Some(v) = lookup("MEDIDESK_RECONNECT_MAX_ATTEMPTS")
		&& let Ok(attempts) = v.trim().parse::<u32>()
	{
		cfg.reconnect.max_attempts = attempts;
		info!(attempts, "reconnect config: max_attempts overridden by env");
	}

	if let Some(v) = lookup("MEDIDESK_RECONNECT_BASE_DELAY_MS")
		&& let Some(base_ms) = parse_env_nonzero_u64(&v)
	{
		cfg.reconnect.base_delay = Duration::from_millis(base_ms);
		info!(base_ms, "reconnect config: base_delay overridden by env");
	}

	if let Some(v) = lookup("MEDIDESK_RECONNECT_MAX_DELAY_MS")
		&& let Some(max_ms) = parse_env_nonzero_u64(&v)
	{
		cfg.reconnect.max_delay = Duration::from_millis(max_ms);
		info!(max_ms, "reconnect config: max_delay overridden by env");
	}
}
