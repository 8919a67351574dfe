#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod admin;
pub mod schedule;

pub use admin::{
	AppointmentDoctor, AppointmentPatient, CaptchaKeys, DashboardSummary, Doctor, LoginRole, NewDoctor, StaffRole,
};
pub use schedule::{Appointment, AppointmentGroup};

/// Which side of a conversation a participant is on.
///
/// On the wire the operator is `admin` and the counterpart is `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
	#[serde(rename = "admin", alias = "operator")]
	Operator,
	#[serde(rename = "user", alias = "counterpart")]
	Counterpart,
}

impl Role {
	/// Stable wire identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Operator => "admin",
			Role::Counterpart => "user",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("unknown role: {0}")]
	UnknownRole(String),
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

impl FromStr for Role {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}

		match s.to_ascii_lowercase().as_str() {
			"admin" | "operator" => Ok(Role::Operator),
			"user" | "counterpart" | "patient" => Ok(Role::Counterpart),
			other => Err(ParseIdError::UnknownRole(other.to_string())),
		}
	}
}

/// Backend-assigned user identifier (operators and counterparts alike).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
	/// Create a non-empty `UserId`.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}
	pub fn as_str(&self) -> &str {
		&self.0
	}
	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for UserId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		UserId::new(s.to_string())
	}
}

/// Backend-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
	/// Create a non-empty message id.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// The authenticated principal a session runs as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
	#[serde(rename = "_id")]
	pub id: UserId,
	#[serde(default = "default_identity_role")]
	pub role: Role,
}

fn default_identity_role() -> Role {
	Role::Operator
}

impl Identity {
	pub fn new(id: UserId, role: Role) -> Self {
		Self { id, role }
	}

	/// Shorthand for an operator identity.
	pub fn operator(id: UserId) -> Self {
		Self::new(id, Role::Operator)
	}
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.role, self.id)
	}
}

/// A user the operator can chat with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
	#[serde(rename = "_id")]
	pub id: UserId,
	#[serde(rename = "name")]
	pub display_name: String,
	#[serde(rename = "image", default, skip_serializing_if = "Option::is_none")]
	pub avatar_ref: Option<String>,
}

impl Counterpart {
	pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
		Self {
			id,
			display_name: display_name.into(),
			avatar_ref: None,
		}
	}
}

/// A single chat message as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	#[serde(rename = "_id")]
	pub id: MessageId,
	#[serde(rename = "sender")]
	pub sender_role: Role,
	pub content: String,
	/// Backend timestamp, kept verbatim.
	#[serde(default)]
	pub timestamp: String,
}

impl ChatMessage {
	pub fn is_from_operator(&self) -> bool {
		self.sender_role == Role::Operator
	}
}
