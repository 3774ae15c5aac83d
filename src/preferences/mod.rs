use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Key of the user preference gating contract notifications
pub const NOTIFICATIONS_ENABLED: &str = "notifications_enabled";

/// The single default for [`NOTIFICATIONS_ENABLED`]. Every reader goes through
/// [`NotificationSettings`], which falls back to this value when unset.
pub const NOTIFICATIONS_ENABLED_DEFAULT: bool = true;

/// Process-wide boolean settings shared by independent components
pub trait PreferenceStore: Send + Sync {
	fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferencesError>;

	fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferencesError>;
}

#[derive(Default)]
pub struct InMemoryPreferences {
	values: RwLock<HashMap<String, bool>>,
}

impl InMemoryPreferences {
	pub fn new() -> Self {
		Self::default()
	}
}

impl PreferenceStore for InMemoryPreferences {
	fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferencesError> {
		let values = self.values.read().map_err(|_| PreferencesError::Poisoned)?;
		Ok(values.get(key).copied())
	}

	fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferencesError> {
		let mut values = self.values.write().map_err(|_| PreferencesError::Poisoned)?;
		values.insert(key.to_string(), value);
		Ok(())
	}
}

/// Preferences kept as a flat JSON object on disk.
///
/// The file is re-read on every lookup so edits made by another surface are
/// picked up; writes replace the whole file through a temporary sibling.
pub struct JsonFilePreferences {
	path: PathBuf,
	lock: RwLock<()>,
}

impl JsonFilePreferences {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: RwLock::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_all(&self) -> Result<HashMap<String, bool>, PreferencesError> {
		match fs::read_to_string(&self.path) {
			Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
			Ok(raw) => Ok(serde_json::from_str(&raw)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
			Err(e) => Err(PreferencesError::Io(e)),
		}
	}
}

impl PreferenceStore for JsonFilePreferences {
	fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferencesError> {
		let _guard = self.lock.read().map_err(|_| PreferencesError::Poisoned)?;
		Ok(self.read_all()?.get(key).copied())
	}

	fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferencesError> {
		let _guard = self.lock.write().map_err(|_| PreferencesError::Poisoned)?;
		let mut values = self.read_all()?;
		values.insert(key.to_string(), value);

		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}

		let tmp_path = self.path.with_extension("json.tmp");
		fs::write(&tmp_path, serde_json::to_vec_pretty(&values)?)?;
		fs::rename(&tmp_path, &self.path)?;

		tracing::debug!(key, value, path = %self.path.display(), "Preference saved");
		Ok(())
	}
}

/// Typed access to the notification preference for both the settings surface
/// and the notification dispatcher.
#[derive(Clone)]
pub struct NotificationSettings {
	store: Arc<dyn PreferenceStore>,
}

impl NotificationSettings {
	pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
		Self { store }
	}

	/// Unset or unreadable values fall back to [`NOTIFICATIONS_ENABLED_DEFAULT`].
	pub fn notifications_enabled(&self) -> bool {
		match self.store.get_bool(NOTIFICATIONS_ENABLED) {
			Ok(value) => value.unwrap_or(NOTIFICATIONS_ENABLED_DEFAULT),
			Err(e) => {
				tracing::warn!(error = %e, "Could not read notification preference, using default");
				NOTIFICATIONS_ENABLED_DEFAULT
			}
		}
	}

	pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), PreferencesError> {
		self.store.set_bool(NOTIFICATIONS_ENABLED, enabled)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Malformed preferences file: {0}")]
	Json(#[from] serde_json::Error),
	#[error("Preference lock poisoned")]
	Poisoned,
}
