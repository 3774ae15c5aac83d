use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8484/api/v1/";

#[derive(Debug, Clone)]
pub struct Config {
	pub api_url: String,
	pub connect_timeout: Duration,
	pub request_timeout: Duration,
	pub preferences_path: PathBuf,
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		// Load .env file if it exists
		let _ = dotenvy::dotenv();

		Self::from_lookup(|key| env::var(key).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let api_url = normalize_base_url(
			&lookup("PACTFLOW_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
		)?;

		Ok(Self {
			api_url,
			connect_timeout: parse_secs(&lookup, "PACTFLOW_CONNECT_TIMEOUT", 30)?,
			request_timeout: parse_secs(&lookup, "PACTFLOW_REQUEST_TIMEOUT", 30)?,
			preferences_path: lookup("PACTFLOW_PREFERENCES_PATH")
				.map(PathBuf::from)
				.unwrap_or_else(|| PathBuf::from("pactflow_prefs.json")),
		})
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			api_url: DEFAULT_API_URL.to_string(),
			connect_timeout: Duration::from_secs(30),
			request_timeout: Duration::from_secs(30),
			preferences_path: PathBuf::from("pactflow_prefs.json"),
		}
	}
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	match lookup(key) {
		Some(raw) => raw
			.trim()
			.parse::<u64>()
			.map(Duration::from_secs)
			.map_err(|_| ConfigError::InvalidTimeout(key)),
		None => Ok(Duration::from_secs(default)),
	}
}

/// Relative request paths are joined onto the base URL, so it has to end in `/`.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
	let trimmed = raw.trim();
	if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
		return Err(ConfigError::InvalidApiUrl(trimmed.to_string()));
	}

	if trimmed.ends_with('/') {
		Ok(trimmed.to_string())
	} else {
		Ok(format!("{}/", trimmed))
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid API url: {0}")]
	InvalidApiUrl(String),
	#[error("Invalid timeout in {0}, expected whole seconds")]
	InvalidTimeout(&'static str),
}
