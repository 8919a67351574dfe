#![forbid(unsafe_code)]

//! REST client for the dashboard backend.
//!
//! Every response is checked in three steps: HTTP status, the `status`/`success`
//! envelope flag, then the typed body. Failures map onto `ClientCoreError` so
//! callers can react to `Auth` (re-login) separately from transient `Network` errors.

use std::collections::HashMap;

use medidesk_domain::{
	Appointment, CaptchaKeys, ChatMessage, Counterpart, DashboardSummary, Doctor, Identity, LoginRole, NewDoctor, UserId,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{ClientConfig, ClientCoreError, SecretString};

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginResponse {
	pub token: SecretString,
	pub identity: Identity,
}

/// Counterparts available for chat and their unseen counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
	/// Server-provided order.
	pub counterparts: Vec<Counterpart>,
	pub unseen: HashMap<UserId, u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
	token: String,
	data: AccountBody,
}

/// Staff account record. Only the id matters here: admins and doctors both
/// act as the operator, and their `role` strings are not chat roles.
#[derive(Debug, Deserialize)]
struct AccountBody {
	#[serde(rename = "_id")]
	id: UserId,
}

impl From<AccountBody> for Identity {
	fn from(account: AccountBody) -> Self {
		Identity::operator(account.id)
	}
}

#[derive(Debug, Deserialize)]
struct DataBody<T> {
	data: T,
}

#[derive(Debug, Deserialize)]
struct DirectoryBody {
	#[serde(default)]
	users: Vec<Counterpart>,
	#[serde(rename = "unseenMessages", default)]
	unseen_messages: Option<HashMap<UserId, u32>>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
	#[serde(default)]
	messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct SentBody {
	message: ChatMessage,
}

#[derive(Debug, serde::Serialize)]
struct SendRequest<'a> {
	#[serde(rename = "senderRole")]
	sender_role: &'a str,
	#[serde(rename = "senderId")]
	sender_id: &'a str,
	content: &'a str,
	#[serde(rename = "receiverId")]
	receiver_id: &'a str,
}

/// Map a non-success HTTP status onto the error taxonomy.
pub fn classify_status(status: StatusCode, context: &str, message: &str) -> ClientCoreError {
	let detail = format!("{context}: status={status} message={message}");
	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientCoreError::Auth(detail),
		StatusCode::NOT_FOUND => ClientCoreError::NotFound(detail),
		StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
			ClientCoreError::Validation(detail)
		}
		_ => ClientCoreError::Network(detail),
	}
}

#[derive(Debug, Clone)]
pub struct ApiClient {
	cfg: ClientConfig,
	client: reqwest::Client,
}

impl ApiClient {
	pub fn new(cfg: ClientConfig) -> Result<Self, ClientCoreError> {
		let client = reqwest::Client::builder()
			.user_agent(cfg.client_name.clone())
			.timeout(cfg.request_timeout)
			.build()
			.map_err(|e| ClientCoreError::Other(format!("build http client: {e}")))?;
		Ok(Self { cfg, client })
	}

	pub fn config(&self) -> &ClientConfig {
		&self.cfg
	}

	fn url(&self, path: &str) -> String {
		self.cfg.backend.url(path)
	}

	fn bearer(token: &SecretString) -> Result<String, ClientCoreError> {
		if token.is_empty() {
			return Err(ClientCoreError::Auth("missing access token".to_string()));
		}
		Ok(format!("Bearer {}", token.expose().trim()))
	}

	async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<serde_json::Value, ClientCoreError> {
		let resp = request
			.send()
			.await
			.map_err(|e| ClientCoreError::Network(format!("{context}: {e}")))?;

		let status = resp.status();
		let body = resp
			.bytes()
			.await
			.map_err(|e| ClientCoreError::Network(format!("{context}: read body: {e}")))?;

		if !status.is_success() {
			let message = serde_json::from_slice::<ErrorBody>(&body)
				.ok()
				.and_then(|b| b.message)
				.unwrap_or_default();
			debug!(%status, context, "request failed");
			return Err(classify_status(status, context, &message));
		}

		let value: serde_json::Value = if body.is_empty() {
			serde_json::Value::Null
		} else {
			serde_json::from_slice(&body).map_err(|e| ClientCoreError::Protocol(format!("{context}: invalid json: {e}")))?
		};

		let message = value.get("message").and_then(|m| m.as_str()).unwrap_or_default();
		if let Some(flag) = value.get("status").and_then(|s| s.as_str())
			&& flag != "success"
		{
			return Err(ClientCoreError::Validation(format!("{context}: status={flag} message={message}")));
		}
		if value.get("success").and_then(|s| s.as_bool()) == Some(false) {
			return Err(ClientCoreError::Validation(format!("{context}: success=false message={message}")));
		}

		Ok(value)
	}

	async fn send_typed<T: DeserializeOwned>(
		&self,
		request: reqwest::RequestBuilder,
		context: &str,
	) -> Result<T, ClientCoreError> {
		let value = self.send(request, context).await?;
		serde_json::from_value(value).map_err(|e| ClientCoreError::Protocol(format!("{context}: unexpected body: {e}")))
	}

	/// Authenticate against the admin or doctor login endpoint.
	pub async fn login(&self, role: LoginRole, email: &str, password: &str) -> Result<LoginResponse, ClientCoreError> {
		if email.trim().is_empty() || password.is_empty() {
			return Err(ClientCoreError::Validation("email and password are required".to_string()));
		}

		let body = serde_json::json!({ "email": email.trim(), "password": password });
		let request = self.client.post(self.url(role.login_path())).json(&body);
		let parsed: LoginBody = self.send_typed(request, "login").await?;

		info!(role = %role, user = %parsed.data.id, "logged in");
		Ok(LoginResponse {
			token: SecretString::new(parsed.token),
			identity: parsed.data.into(),
		})
	}

	/// Identity behind a token; used to re-validate a restored credential.
	pub async fn current_admin(&self, token: &SecretString) -> Result<Identity, ClientCoreError> {
		let request = self
			.client
			.get(self.url("/api/v1/admin/getAdmin"))
			.header("Authorization", Self::bearer(token)?);
		let body: DataBody<AccountBody> = self.send_typed(request, "get admin").await?;
		Ok(body.data.into())
	}

	/// Doctors visible to the admin; admin accounts are filtered out.
	pub async fn list_doctors(&self, token: &SecretString) -> Result<Vec<Doctor>, ClientCoreError> {
		let request = self
			.client
			.get(self.url("/api/v1/admin/doctors"))
			.header("Authorization", Self::bearer(token)?);
		let body: DataBody<Vec<Doctor>> = match self.send_typed(request, "list doctors").await {
			Ok(body) => body,
			Err(ClientCoreError::NotFound(_)) => return Ok(Vec::new()),
			Err(e) => return Err(e),
		};
		Ok(body.data.into_iter().filter(|d| !d.is_admin()).collect())
	}

	pub async fn change_doctor_availability(&self, token: &SecretString, doctor_id: &str) -> Result<(), ClientCoreError> {
		if doctor_id.trim().is_empty() {
			return Err(ClientCoreError::Validation("doctor id is required".to_string()));
		}
		let request = self
			.client
			.post(self.url("/api/v1/admin/doctors/changeAvailability"))
			.header("Authorization", Self::bearer(token)?)
			.json(&serde_json::json!({ "docId": doctor_id.trim() }));
		self.send(request, "change availability").await?;
		Ok(())
	}

	/// Register a doctor; required fields are checked before any request is made.
	pub async fn add_doctor(&self, token: &SecretString, doctor: &NewDoctor) -> Result<(), ClientCoreError> {
		let missing = doctor.missing_fields();
		if !missing.is_empty() {
			return Err(ClientCoreError::Validation(format!("missing fields: {}", missing.join(", "))));
		}

		let mut form = reqwest::multipart::Form::new();
		for (name, value) in doctor.form_fields() {
			form = form.text(name, value);
		}
		let file_name = if doctor.image_file_name.trim().is_empty() {
			"image".to_string()
		} else {
			doctor.image_file_name.clone()
		};
		form = form.part("image", reqwest::multipart::Part::bytes(doctor.image.clone()).file_name(file_name));

		let request = self
			.client
			.post(self.url("/api/v1/admin/add-doctor"))
			.header("Authorization", Self::bearer(token)?)
			.multipart(form);
		self.send(request, "add doctor").await?;
		info!(email = %doctor.email.trim(), "doctor added");
		Ok(())
	}

	pub async fn list_appointments(&self, token: &SecretString) -> Result<Vec<Appointment>, ClientCoreError> {
		let request = self
			.client
			.get(self.url("/api/v1/admin/getAllAppointments"))
			.header("Authorization", Self::bearer(token)?);
		let body: DataBody<Vec<Appointment>> = self.send_typed(request, "list appointments").await?;
		Ok(body.data)
	}

	pub async fn delete_appointment(&self, token: &SecretString, appointment_id: &str) -> Result<(), ClientCoreError> {
		if appointment_id.trim().is_empty() {
			return Err(ClientCoreError::Validation("appointment id is required".to_string()));
		}
		let path = format!("/api/v1/admin/deleteAppointmentAdmin/{}", appointment_id.trim());
		let request = self
			.client
			.delete(self.url(&path))
			.header("Authorization", Self::bearer(token)?);
		self.send(request, "delete appointment").await?;
		info!(appointment = %appointment_id.trim(), "appointment deleted");
		Ok(())
	}

	pub async fn dashboard(&self, token: &SecretString) -> Result<DashboardSummary, ClientCoreError> {
		let request = self
			.client
			.get(self.url("/api/v1/admin/dashboard-admin"))
			.header("Authorization", Self::bearer(token)?);
		let body: DataBody<DashboardSummary> = self.send_typed(request, "dashboard").await?;
		Ok(body.data)
	}

	pub async fn update_captcha(&self, token: &SecretString, keys: &CaptchaKeys) -> Result<(), ClientCoreError> {
		if keys.site_key.trim().is_empty() || keys.secret_key.trim().is_empty() {
			return Err(ClientCoreError::Validation("site key and secret key are required".to_string()));
		}
		let request = self
			.client
			.post(self.url("/api/v1/UpdateCaptcha"))
			.header("Authorization", Self::bearer(token)?)
			.json(keys);
		self.send(request, "update captcha").await?;
		Ok(())
	}

	/// Counterparts the operator can chat with, plus unseen counts.
	pub async fn fetch_directory(&self, token: &SecretString) -> Result<Directory, ClientCoreError> {
		let request = self
			.client
			.get(self.url("/api/v1/message/users"))
			.header("Authorization", Self::bearer(token)?);
		let body: DirectoryBody = self.send_typed(request, "fetch directory").await?;

		let unseen: HashMap<UserId, u32> = body
			.unseen_messages
			.unwrap_or_default()
			.into_iter()
			.filter(|(_, n)| *n > 0)
			.collect();
		debug!(counterparts = body.users.len(), unseen = unseen.len(), "directory fetched");
		Ok(Directory {
			counterparts: body.users,
			unseen,
		})
	}

	pub async fn fetch_history(
		&self,
		token: &SecretString,
		counterpart: &UserId,
	) -> Result<Vec<ChatMessage>, ClientCoreError> {
		let path = format!("/api/v1/message/admin/{counterpart}");
		let request = self
			.client
			.get(self.url(&path))
			.header("Authorization", Self::bearer(token)?);
		let body: HistoryBody = self.send_typed(request, "fetch history").await?;
		Ok(body.messages)
	}

	/// Send as `sender`; returns the message as stored by the server.
	pub async fn send_message(
		&self,
		token: &SecretString,
		sender: &Identity,
		counterpart: &UserId,
		content: &str,
	) -> Result<ChatMessage, ClientCoreError> {
		if content.trim().is_empty() {
			return Err(ClientCoreError::Validation("message content is empty".to_string()));
		}
		let body = SendRequest {
			sender_role: sender.role.as_str(),
			sender_id: sender.id.as_str(),
			content,
			receiver_id: counterpart.as_str(),
		};
		let request = self
			.client
			.post(self.url("/api/v1/message/send"))
			.header("Authorization", Self::bearer(token)?)
			.json(&body);
		let sent: SentBody = self.send_typed(request, "send message").await?;
		Ok(sent.message)
	}

	pub async fn mark_seen(&self, token: &SecretString, counterpart: &UserId) -> Result<(), ClientCoreError> {
		let path = format!("/api/v1/message/mark/{counterpart}");
		let request = self
			.client
			.get(self.url(&path))
			.header("Authorization", Self::bearer(token)?);
		if let Err(e) = self.send(request, "mark seen").await {
			warn!(counterpart = %counterpart, error = %e, "mark seen failed");
			return Err(e);
		}
		Ok(())
	}
}
