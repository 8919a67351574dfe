#![forbid(unsafe_code)]

pub mod endpoint {
	/// Path the realtime channel is served on.
	pub const REALTIME_PATH: &str = "/realtime";

	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum Scheme {
		Http,
		Https,
	}

	impl Scheme {
		pub const fn as_str(self) -> &'static str {
			match self {
				Scheme::Http => "http",
				Scheme::Https => "https",
			}
		}

		/// Websocket scheme matching this transport security.
		pub const fn websocket(self) -> &'static str {
			match self {
				Scheme::Http => "ws",
				Scheme::Https => "wss",
			}
		}
	}

	/// Parsed `http(s)://host[:port]` backend endpoint.
	#[derive(Debug, Clone, PartialEq, Eq, Hash)]
	pub struct BackendEndpoint {
		pub scheme: Scheme,
		pub host: String,
		pub port: Option<u16>,
	}

	impl BackendEndpoint {
		/// Returns `host[:port]` (IPv6 stays bracketed).
		pub fn authority(&self) -> String {
			match self.port {
				Some(port) => format!("{}:{port}", self.host),
				None => self.host.clone(),
			}
		}

		/// Base URL without trailing slash, e.g. `https://api.example.com`.
		pub fn base_url(&self) -> String {
			format!("{}://{}", self.scheme.as_str(), self.authority())
		}

		/// Absolute URL for an API path.
		pub fn url(&self, path: &str) -> String {
			if path.starts_with('/') {
				format!("{}{path}", self.base_url())
			} else {
				format!("{}/{path}", self.base_url())
			}
		}

		/// Websocket URL of the realtime channel for a registered user.
		pub fn realtime_url(&self, user_id: &str, role: &str) -> String {
			let query = url::form_urlencoded::Serializer::new(String::new())
				.append_pair("userId", user_id)
				.append_pair("role", role)
				.finish();
			format!(
				"{}://{}{}?{query}",
				self.scheme.websocket(),
				self.authority(),
				REALTIME_PATH
			)
		}

		/// Parse a backend endpoint string in the form `http(s)://host[:port]`.
		///
		/// A single trailing slash is tolerated; any other path is rejected.
		pub fn parse(s: &str) -> Result<Self, String> {
			let s = s.trim();
			if s.is_empty() {
				return Err("endpoint must be non-empty (expected http(s)://host[:port])".to_string());
			}

			let (scheme, rest) = if let Some(rest) = s.strip_prefix("https://") {
				(Scheme::Https, rest)
			} else if let Some(rest) = s.strip_prefix("http://") {
				(Scheme::Http, rest)
			} else {
				return Err(format!("invalid endpoint (expected http(s)://host[:port]): {s}"));
			};

			let rest = rest.strip_suffix('/').unwrap_or(rest);
			if rest.contains('/') || rest.contains('?') || rest.contains('#') {
				return Err(format!(
					"invalid endpoint (expected http(s)://host[:port] without path/query/fragment): {s}"
				));
			}

			let (host, port) = split_host_port(rest).map_err(|e| format!("{e}: {s}"))?;
			if host.is_empty() {
				return Err(format!("invalid endpoint host (expected http(s)://host[:port]): {s}"));
			}

			if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
				return Err(format!(
					"invalid endpoint host (IPv6 must be bracketed like http://[::1]:4000): {s}"
				));
			}

			Ok(Self {
				scheme,
				host: host.to_string(),
				port,
			})
		}
	}

	fn split_host_port(rest: &str) -> Result<(&str, Option<u16>), &'static str> {
		// Bracketed IPv6 without a port ends in `]`.
		if rest.ends_with(']') {
			return Ok((rest.trim(), None));
		}

		let Some((host, port_str)) = rest.rsplit_once(':') else {
			return Ok((rest.trim(), None));
		};

		// Unbracketed IPv6 literal; let the host check reject it.
		if host.contains(':') && !host.starts_with('[') {
			return Ok((rest.trim(), None));
		}

		let port: u16 = port_str
			.trim()
			.parse()
			.map_err(|_| "invalid endpoint port (expected 1..=65535)")?;
		if port == 0 {
			return Err("invalid endpoint port (expected 1..=65535)");
		}
		Ok((host.trim(), Some(port)))
	}

	/// Validate `http(s)://host[:port]`.
	pub fn validate_backend_endpoint(s: &str) -> Result<(), String> {
		let _ = BackendEndpoint::parse(s)?;
		Ok(())
	}

}

pub mod env {
	/// Non-empty, trimmed value of an environment variable.
	pub fn env_string(name: &str) -> Option<String> {
		std::env::var(name)
			.ok()
			.map(|v| v.trim().to_string())
			.filter(|v| !v.is_empty())
	}

	/// Accepts `1/0`, `true/false`, `yes/no`, `on/off` (case-insensitive).
	pub fn parse_env_bool(v: &str) -> Option<bool> {
		match v.trim().to_ascii_lowercase().as_str() {
			"1" | "true" | "yes" | "on" => Some(true),
			"0" | "false" | "no" | "off" => Some(false),
			_ => None,
		}
	}

	/// Parse an unsigned integer env value, rejecting zero.
	pub fn parse_env_nonzero_u64(v: &str) -> Option<u64> {
		v.trim().parse::<u64>().ok().filter(|n| *n > 0)
	}

}
