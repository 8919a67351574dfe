//! Appointment records and the upcoming-week grouping used by the appointments view.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ParseIdError;
use crate::admin::{AppointmentDoctor, AppointmentPatient};

/// Number of days after today that still count as upcoming.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Appointment {
	#[serde(rename = "_id")]
	pub id: String,
	/// Slot date as `"<day> <month>_<year>"`.
	#[serde(rename = "Slotdate", default)]
	pub slot_date: String,
	#[serde(rename = "timeSlot", default)]
	pub time_slot: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date: Option<String>,
	#[serde(default)]
	pub doctor: AppointmentDoctor,
	#[serde(default)]
	pub user: AppointmentPatient,
	#[serde(default)]
	pub amount: f64,
	#[serde(default)]
	pub payment: bool,
}

/// Appointments falling on one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentGroup {
	pub date: NaiveDate,
	pub appointments: Vec<Appointment>,
}

/// Parse a slot date such as `"7 3_2025"` or `"7_3_2025"`.
pub fn parse_slot_date(s: &str) -> Result<NaiveDate, ParseIdError> {
	let s = s.trim();
	if s.is_empty() {
		return Err(ParseIdError::Empty);
	}

	let parts: Vec<&str> = s.split([' ', '_']).filter(|p| !p.is_empty()).collect();
	let [day, month, year] = parts.as_slice() else {
		return Err(ParseIdError::InvalidFormat(format!("expected <day> <month>_<year>: {s}")));
	};

	let parse = |v: &str| {
		v.parse::<u32>()
			.map_err(|_| ParseIdError::InvalidFormat(format!("non-numeric slot date component: {s}")))
	};
	let (day, month) = (parse(day)?, parse(month)?);
	let year = year
		.parse::<i32>()
		.map_err(|_| ParseIdError::InvalidFormat(format!("non-numeric slot year: {s}")))?;

	NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ParseIdError::InvalidFormat(format!("no such date: {s}")))
}

/// Minutes after midnight for a 12-hour slot like `"10:30AM"` or `"2:00 PM"`.
///
/// A slot without an AM/PM suffix is read as AM.
pub fn time_slot_minutes(slot: &str) -> Option<u32> {
	let compact: String = slot.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_uppercase();
	let (clock, pm) = if let Some(rest) = compact.strip_suffix("PM") {
		(rest, true)
	} else if let Some(rest) = compact.strip_suffix("AM") {
		(rest, false)
	} else {
		(compact.as_str(), false)
	};

	let (hours, minutes) = clock.split_once(':')?;
	let hours: u32 = hours.parse().ok()?;
	let minutes: u32 = minutes.parse().ok()?;
	if minutes >= 60 || hours > 12 {
		return None;
	}

	Some((hours % 12 + if pm { 12 } else { 0 }) * 60 + minutes)
}

/// Group appointments from `today` through the next week by date.
///
/// Dates ascend; appointments within a date are ordered by time slot, with unreadable slots last.
pub fn group_upcoming(appointments: &[Appointment], today: NaiveDate) -> Vec<AppointmentGroup> {
	let mut groups: Vec<AppointmentGroup> = Vec::new();

	for appointment in appointments {
		let date = match parse_slot_date(&appointment.slot_date) {
			Ok(d) => d,
			Err(e) => {
				debug!(appointment = %appointment.id, error = %e, "skipping appointment with unreadable slot date");
				continue;
			}
		};

		let days_ahead = (date - today).num_days();
		if !(0..=UPCOMING_WINDOW_DAYS).contains(&days_ahead) {
			continue;
		}

		match groups.iter_mut().find(|g| g.date == date) {
			Some(group) => group.appointments.push(appointment.clone()),
			None => groups.push(AppointmentGroup {
				date,
				appointments: vec![appointment.clone()],
			}),
		}
	}

	groups.sort_by_key(|g| g.date);
	for group in groups.iter_mut() {
		group
			.appointments
			.sort_by_key(|a| time_slot_minutes(&a.time_slot).unwrap_or(u32::MAX));
	}
	groups
}

/// Heading shown above a group of appointments.
pub fn group_header(date: NaiveDate, today: NaiveDate) -> String {
	match (date - today).num_days() {
		0 => "Today's Appointments".to_string(),
		1 => "Tomorrow's Appointments".to_string(),
		_ => format!("{}, {} {}", date.format("%A"), date.format("%B"), date.day()),
	}
}
