//! Records managed through the admin dashboard.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::schedule::Appointment;

/// Which login endpoint a staff member authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoginRole {
	#[default]
	Admin,
	Doctor,
}

impl LoginRole {
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginRole::Admin => "admin",
			LoginRole::Doctor => "doctor",
		}
	}

	/// Backend path of the login endpoint for this role.
	pub const fn login_path(self) -> &'static str {
		match self {
			LoginRole::Admin => "/api/v1/admin/login",
			LoginRole::Doctor => "/api/v1/doctor/login",
		}
	}
}

impl fmt::Display for LoginRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl core::str::FromStr for LoginRole {
	type Err = crate::ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"" => Err(crate::ParseIdError::Empty),
			"admin" => Ok(LoginRole::Admin),
			"doctor" => Ok(LoginRole::Doctor),
			other => Err(crate::ParseIdError::UnknownRole(other.to_string())),
		}
	}
}

/// Role carried on staff records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
	#[default]
	Doctor,
	Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
	#[serde(rename = "_id")]
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub role: StaffRole,
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub image: String,
	#[serde(default)]
	pub degree: String,
	#[serde(default)]
	pub speciality: String,
	#[serde(default)]
	pub experience: String,
	#[serde(default)]
	pub is_available: bool,
	#[serde(default)]
	pub fee: f64,
}

impl Doctor {
	pub fn is_admin(&self) -> bool {
		self.role == StaffRole::Admin
	}
}

/// Form contents for registering a doctor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDoctor {
	pub name: String,
	pub email: String,
	pub password: String,
	pub speciality: String,
	pub degree: String,
	pub experience: String,
	pub description: String,
	pub fee: f64,
	pub address: String,
	pub image_file_name: String,
	pub image: Vec<u8>,
}

impl NewDoctor {
	/// Names of required fields that are blank.
	pub fn missing_fields(&self) -> Vec<&'static str> {
		let mut missing = Vec::new();
		let text_fields = [
			("name", &self.name),
			("email", &self.email),
			("password", &self.password),
			("speciality", &self.speciality),
			("degree", &self.degree),
			("experience", &self.experience),
			("address", &self.address),
		];
		for (name, value) in text_fields {
			if value.trim().is_empty() {
				missing.push(name);
			}
		}
		if self.image.is_empty() {
			missing.push("image");
		}
		missing
	}

	/// Text form fields in submission order; `role` is always `doctor`.
	pub fn form_fields(&self) -> Vec<(&'static str, String)> {
		vec![
			("name", self.name.trim().to_string()),
			("email", self.email.trim().to_string()),
			("password", self.password.clone()),
			("speciality", self.speciality.trim().to_string()),
			("degree", self.degree.trim().to_string()),
			("experience", self.experience.trim().to_string()),
			("description", self.description.trim().to_string()),
			("fee", self.fee.to_string()),
			("address", self.address.trim().to_string()),
			("role", StaffRole::Doctor.as_form_value().to_string()),
		]
	}
}

impl StaffRole {
	pub const fn as_form_value(self) -> &'static str {
		match self {
			StaffRole::Doctor => "doctor",
			StaffRole::Admin => "admin",
		}
	}
}

/// Doctor summary embedded in appointment records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppointmentDoctor {
	pub name: String,
	#[serde(default)]
	pub image: String,
	#[serde(default)]
	pub speciality: String,
}

/// Patient summary embedded in appointment records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppointmentPatient {
	pub name: String,
	#[serde(rename = "phoneno", default, skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gender: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dob: Option<String>,
}

/// Landing-page totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
	#[serde(default)]
	pub doctors: u64,
	#[serde(default)]
	pub appointments: u64,
	#[serde(default)]
	pub users: u64,
	#[serde(default)]
	pub latest_appointments: Vec<Appointment>,
}

/// reCAPTCHA key pair configured for the public site.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaKeys {
	pub site_key: String,
	pub secret_key: String,
}

impl fmt::Debug for CaptchaKeys {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CaptchaKeys")
			.field("site_key", &self.site_key)
			.field("secret_key", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn doctor_decodes_backend_shape() {
		let raw = r#"{"_id":"d1","name":"Dr. Rao","role":"doctor","isAvailable":true,"fee":40,"speciality":"ENT"}"#;
		let d: Doctor = serde_json::from_str(raw).unwrap();
		assert!(d.is_available);
		assert!(!d.is_admin());
		assert_eq!(d.fee, 40.0);
	}

	#[test]
	fn new_doctor_reports_missing_fields() {
		let form = NewDoctor {
			name: "Dr. Rao".to_string(),
			email: " ".to_string(),
			..NewDoctor::default()
		};
		let missing = form.missing_fields();
		assert!(missing.contains(&"email"));
		assert!(missing.contains(&"image"));
		assert!(!missing.contains(&"name"));
		assert!(!missing.contains(&"description"));
	}

	#[test]
	fn captcha_debug_redacts_secret() {
		let keys = CaptchaKeys {
			site_key: "site".to_string(),
			secret_key: "hunter2".to_string(),
		};
		assert!(!format!("{keys:?}").contains("hunter2"));
	}

	#[test]
	fn login_role_paths() {
		assert_eq!("doctor".parse::<LoginRole>().unwrap().login_path(), "/api/v1/doctor/login");
		assert_eq!(LoginRole::default().login_path(), "/api/v1/admin/login");
	}
}
