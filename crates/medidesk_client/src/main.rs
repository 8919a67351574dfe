#![forbid(unsafe_code)]

mod args;
mod chat;

use std::sync::Arc;

use anyhow::{Context as _, anyhow, bail};
use args::{Command, USAGE};
use medidesk_client_core::ApiClient;
use medidesk_domain::schedule::{group_header, group_upcoming};
use medidesk_session::{Credential, KeyringCredentialStore, SessionIdentityStore, load_session_config};
use tracing::{info, warn};

fn usage_and_exit() -> ! {
	eprintln!("{USAGE}");
	std::process::exit(2)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG")
		.unwrap_or_else(|_| "info,medidesk_session=debug,medidesk_client_core=debug".to_string());
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let cli = args::parse_args(std::env::args().skip(1)).unwrap_or_else(|e| {
		eprintln!("{e}");
		usage_and_exit()
	});
	if cli.command == Command::Help {
		usage_and_exit();
	}

	let mut session_cfg = load_session_config().context("load config")?;
	if let Some(url) = cli.backend {
		session_cfg.backend_url = url;
	}
	let client_cfg = session_cfg.client_config().context("backend configuration")?;
	info!(backend = %client_cfg.backend.base_url(), "using backend");

	let api = ApiClient::new(client_cfg.clone())?;
	let identity = Arc::new(SessionIdentityStore::new(Arc::new(KeyringCredentialStore::new())));

	match cli.command {
		Command::Help => {}
		Command::Login { role, email, password } => {
			let resp = api.login(role, &email, &password).await?;
			println!("Logged in as {} ({role})", resp.identity.id);
			identity.set_identity(Some(Credential::new(resp.identity, resp.token)));
		}
		Command::Logout => {
			identity.clear();
			println!("Logged out");
		}
		Command::Whoami => {
			let credential = restore_session(&api, &identity).await?;
			println!("{}", credential.identity);
		}
		Command::Doctors => {
			let credential = restore_session(&api, &identity).await?;
			let doctors = api.list_doctors(&credential.token).await?;
			if doctors.is_empty() {
				println!("No doctors registered");
			}
			for d in doctors {
				let availability = if d.is_available { "available" } else { "unavailable" };
				println!("{}  {:<24} {:<20} {availability}", d.id, d.name, d.speciality);
			}
		}
		Command::ToggleAvailability { id } => {
			let credential = restore_session(&api, &identity).await?;
			api.change_doctor_availability(&credential.token, &id).await?;
			println!("Availability changed for {id}");
		}
		Command::AddDoctor { mut doctor, image_path } => {
			let credential = restore_session(&api, &identity).await?;
			doctor.image = std::fs::read(&image_path).with_context(|| format!("read image {image_path}"))?;
			doctor.image_file_name = std::path::Path::new(&image_path)
				.file_name()
				.map(|n| n.to_string_lossy().into_owned())
				.unwrap_or_else(|| "image".to_string());
			api.add_doctor(&credential.token, &doctor).await?;
			println!("Doctor {} added", doctor.name);
		}
		Command::Appointments { delete: Some(id) } => {
			let credential = restore_session(&api, &identity).await?;
			api.delete_appointment(&credential.token, &id).await?;
			println!("Appointment {id} deleted");
		}
		Command::Appointments { delete: None } => {
			let credential = restore_session(&api, &identity).await?;
			let appointments = api.list_appointments(&credential.token).await?;
			let today = chrono::Local::now().date_naive();
			let groups = group_upcoming(&appointments, today);
			if groups.is_empty() {
				println!("No upcoming appointments");
			}
			for group in groups {
				println!("{}", group_header(group.date, today));
				for a in group.appointments {
					println!("  {:<8} {:<24} {:<24} {}", a.time_slot, a.user.name, a.doctor.name, a.id);
				}
			}
		}
		Command::Dashboard => {
			let credential = restore_session(&api, &identity).await?;
			let summary = api.dashboard(&credential.token).await?;
			println!("Doctors:      {}", summary.doctors);
			println!("Appointments: {}", summary.appointments);
			println!("Patients:     {}", summary.users);
			if !summary.latest_appointments.is_empty() {
				println!("Latest bookings:");
				for a in summary.latest_appointments {
					println!("  {} {}  {} with {}", a.slot_date, a.time_slot, a.user.name, a.doctor.name);
				}
			}
		}
		Command::Captcha { keys } => {
			let credential = restore_session(&api, &identity).await?;
			api.update_captcha(&credential.token, &keys).await?;
			println!("Captcha keys updated");
		}
		Command::Chat { with } => {
			restore_session(&api, &identity).await?;
			chat::run_chat(api, identity, &session_cfg, client_cfg, with).await?;
		}
	}

	Ok(())
}

/// Restore the persisted token and re-validate it against the backend.
async fn restore_session(api: &ApiClient, identity: &SessionIdentityStore) -> anyhow::Result<Credential> {
	let token = identity
		.restore()
		.ok_or_else(|| anyhow!("not logged in; run `medidesk_client login` first"))?;

	match api.current_admin(&token).await {
		Ok(who) => {
			let credential = Credential::new(who, token);
			identity.set_identity(Some(credential.clone()));
			Ok(credential)
		}
		Err(e) if e.is_auth() => {
			warn!(error = %e, "stored credential rejected");
			identity.clear();
			bail!("session expired; log in again")
		}
		Err(e) => Err(e).context("validate stored credential"),
	}
}
