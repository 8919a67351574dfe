use medidesk_domain::{CaptchaKeys, LoginRole, NewDoctor, UserId};

pub const USAGE: &str = "Usage: medidesk_client [--backend http(s)://host[:port]] <command> [options]\n\
\n\
Commands:\n\
\tlogin --role admin|doctor --email E --password P\n\
\tlogout\n\
\twhoami\n\
\tdoctors\n\
\ttoggle-availability --id DOCTOR_ID\n\
\tadd-doctor --name N --email E --password P --speciality S --degree D --experience X\n\
\t           --about A --fee F --address ADDR --image PATH\n\
\tappointments [--delete APPOINTMENT_ID]\n\
\tdashboard\n\
\tcaptcha --site-key K --secret-key S\n\
\tchat [--with USER_ID]\n\
\n\
Options:\n\
\t--backend  Backend base URL (default: config file, MEDIDESK_BACKEND_URL, or http://localhost:4000)\n\
\t--help     Show this help\n\
\n\
Chat input:\n\
\t/open USER_ID   open a conversation\n\
\t/back           leave the open conversation\n\
\t/retry          resend the last unsent message\n\
\t/refresh        reload the directory\n\
\t/quit           end the session\n\
\tanything else   send to the open conversation\n";

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
	pub backend: Option<String>,
	pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	Help,
	Login {
		role: LoginRole,
		email: String,
		password: String,
	},
	Logout,
	Whoami,
	Doctors,
	ToggleAvailability {
		id: String,
	},
	AddDoctor {
		doctor: NewDoctor,
		image_path: String,
	},
	Appointments {
		delete: Option<String>,
	},
	Dashboard,
	Captcha {
		keys: CaptchaKeys,
	},
	Chat {
		with: Option<UserId>,
	},
}

/// Parse arguments (program name already skipped).
pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Cli, String> {
	let mut backend = None;
	let mut positional = Vec::new();
	let mut options: Vec<(String, String)> = Vec::new();

	let mut it = args.into_iter();
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => {
				return Ok(Cli {
					backend,
					command: Command::Help,
				});
			}
			"--backend" => {
				let v = it.next().ok_or("--backend requires a value")?;
				if v.trim().is_empty() {
					return Err("--backend must be non-empty (expected http(s)://host[:port])".to_string());
				}
				backend = Some(v);
			}
			flag if flag.starts_with("--") => {
				let v = it.next().ok_or_else(|| format!("{flag} requires a value"))?;
				options.push((flag.trim_start_matches("--").to_string(), v));
			}
			_ => positional.push(arg),
		}
	}

	let name = match positional.as_slice() {
		[] => return Err("missing command".to_string()),
		[name] => name.as_str(),
		[_, extra, ..] => return Err(format!("unexpected argument: {extra}")),
	};

	let mut opts = Options(options);
	let command = match name {
		"login" => Command::Login {
			role: opts
				.take("role")
				.map(|r| r.parse::<LoginRole>().map_err(|e| format!("invalid --role: {e}")))
				.transpose()?
				.unwrap_or_default(),
			email: opts.require("email")?,
			password: opts.require("password")?,
		},
		"logout" => Command::Logout,
		"whoami" => Command::Whoami,
		"doctors" => Command::Doctors,
		"toggle-availability" => Command::ToggleAvailability { id: opts.require("id")? },
		"add-doctor" => {
			let fee = opts.require("fee")?;
			let doctor = NewDoctor {
				name: opts.require("name")?,
				email: opts.require("email")?,
				password: opts.require("password")?,
				speciality: opts.require("speciality")?,
				degree: opts.require("degree")?,
				experience: opts.require("experience")?,
				description: opts.require("about")?,
				fee: fee.trim().parse().map_err(|_| format!("invalid --fee: {fee}"))?,
				address: opts.require("address")?,
				..NewDoctor::default()
			};
			Command::AddDoctor {
				doctor,
				image_path: opts.require("image")?,
			}
		}
		"appointments" => Command::Appointments { delete: opts.take("delete") },
		"dashboard" => Command::Dashboard,
		"captcha" => Command::Captcha {
			keys: CaptchaKeys {
				site_key: opts.require("site-key")?,
				secret_key: opts.require("secret-key")?,
			},
		},
		"chat" => Command::Chat {
			with: opts
				.take("with")
				.map(|id| UserId::new(id).map_err(|e| format!("invalid --with: {e}")))
				.transpose()?,
		},
		other => return Err(format!("unknown command: {other}")),
	};

	if let Some((flag, _)) = opts.0.first() {
		return Err(format!("unknown option for {name}: --{flag}"));
	}
	Ok(Cli { backend, command })
}

struct Options(Vec<(String, String)>);

impl Options {
	fn take(&mut self, name: &str) -> Option<String> {
		let idx = self.0.iter().position(|(k, _)| k == name)?;
		Some(self.0.remove(idx).1)
	}

	fn require(&mut self, name: &str) -> Result<String, String> {
		self.take(name)
			.filter(|v| !v.trim().is_empty())
			.ok_or_else(|| format!("--{name} is required"))
	}
}
