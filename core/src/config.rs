//! Core configuration, persisted as `quire.json` inside the data directory.

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use quire_query::{QueryOptions, RelayUrl};
use quire_utils::error::FileIOError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "quire.json";
const TARGET_VERSION: u32 = 2;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to parse config: {0}")]
	Parse(#[from] serde_json::Error),
	#[error("unknown config version <version='{0}'>")]
	UnknownVersion(u32),
	#[error("invalid config: {0}")]
	Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
	/// Config schema version
	pub version: u32,

	#[serde(default)]
	pub relays: Vec<RelayUrl>,

	#[serde(default = "default_local_timeout_ms")]
	pub local_timeout_ms: u64,

	#[serde(default = "default_remote_timeout_ms")]
	pub remote_timeout_ms: u64,

	/// How long newly discovered references are collected before one hydration pass runs
	#[serde(default = "default_hydration_batch_window_ms")]
	pub hydration_batch_window_ms: u64,

	#[serde(default = "default_log_level")]
	pub log_level: String,

	#[serde(skip)]
	pub data_dir: PathBuf,
}

const fn default_local_timeout_ms() -> u64 {
	1200
}

const fn default_remote_timeout_ms() -> u64 {
	6000
}

const fn default_hydration_batch_window_ms() -> u64 {
	25
}

fn default_log_level() -> String {
	quire_utils::logging::DEFAULT_FILTER.to_string()
}

impl CoreConfig {
	pub fn default_with_dir(data_dir: impl Into<PathBuf>) -> Self {
		Self {
			version: TARGET_VERSION,
			relays: vec![],
			local_timeout_ms: default_local_timeout_ms(),
			remote_timeout_ms: default_remote_timeout_ms(),
			hydration_batch_window_ms: default_hydration_batch_window_ms(),
			log_level: default_log_level(),
			data_dir: data_dir.into(),
		}
	}

	/// Load configuration from a data directory, writing defaults when none exists yet
	pub fn load_from(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let data_dir = data_dir.as_ref();
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		match fs::read_to_string(&config_path) {
			Ok(json) => {
				info!(path = %config_path.display(), "Loading config;");
				let mut config = serde_json::from_str::<Self>(&json)?;
				config.data_dir = data_dir.to_path_buf();

				if config.version < TARGET_VERSION {
					info!(
						from = config.version,
						to = TARGET_VERSION,
						"Migrating config;"
					);
					config.migrate()?;
					config.save()?;
				} else if config.version > TARGET_VERSION {
					return Err(ConfigError::UnknownVersion(config.version));
				}

				config.validate()?;

				Ok(config)
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				warn!(path = %config_path.display(), "No config found, creating default;");
				let config = Self::default_with_dir(data_dir);
				config.save()?;
				Ok(config)
			}
			Err(e) => Err(FileIOError::from_std_io_err(config_path, e).into()),
		}
	}

	/// Like [`CoreConfig::load_from`], but replaces an unreadable config with defaults
	pub fn load_or_create(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let data_dir = data_dir.as_ref();

		Self::load_from(data_dir).or_else(|e| {
			warn!(%e, "Failed to load config, recreating defaults;");
			let config = Self::default_with_dir(data_dir);
			config.save()?;
			Ok(config)
		})
	}

	pub fn save(&self) -> Result<(), ConfigError> {
		fs::create_dir_all(&self.data_dir)
			.map_err(|e| FileIOError::from_std_io_err(&self.data_dir, e))?;

		let config_path = self.data_dir.join(CONFIG_FILE_NAME);
		fs::write(&config_path, serde_json::to_vec_pretty(self)?)
			.map_err(|e| FileIOError::from_std_io_err_with_msg(&config_path, e, "saving config"))?;

		info!(path = %config_path.display(), "Saved config;");

		Ok(())
	}

	#[must_use]
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	#[must_use]
	pub const fn query_options(&self) -> QueryOptions {
		QueryOptions {
			local_timeout: Duration::from_millis(self.local_timeout_ms),
			remote_timeout: Duration::from_millis(self.remote_timeout_ms),
		}
	}

	#[must_use]
	pub const fn hydration_window(&self) -> Duration {
		Duration::from_millis(self.hydration_batch_window_ms)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.local_timeout_ms == 0 || self.remote_timeout_ms == 0 {
			return Err(ConfigError::Invalid("relay timeouts must be non-zero"));
		}

		Ok(())
	}

	fn migrate(&mut self) -> Result<(), ConfigError> {
		loop {
			match self.version {
				// v1 had a single relay timeout, reused as the remote one
				0 | 1 => {
					self.local_timeout_ms = self.local_timeout_ms.min(self.remote_timeout_ms);
					self.hydration_batch_window_ms = default_hydration_batch_window_ms();
					self.version = 2;
				}
				TARGET_VERSION => return Ok(()),
				v => return Err(ConfigError::UnknownVersion(v)),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	#[test]
	fn missing_config_is_created_with_defaults() {
		let dir = tempfile::tempdir().unwrap();

		let config = CoreConfig::load_from(dir.path()).unwrap();

		assert_eq!(config, CoreConfig::default_with_dir(dir.path()));
		assert!(dir.path().join(CONFIG_FILE_NAME).exists());
		assert_eq!(config.query_options(), QueryOptions::default());
		assert_eq!(config.hydration_window(), Duration::from_millis(25));
	}

	#[test]
	fn saved_config_round_trips_relays() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = CoreConfig::default_with_dir(dir.path());
		config.relays = vec![
			"ws://localhost:10547".parse().unwrap(),
			"wss://relay.example.com".parse().unwrap(),
		];
		config.remote_timeout_ms = 3000;
		config.save().unwrap();

		let loaded = CoreConfig::load_from(dir.path()).unwrap();

		assert_eq!(loaded, config);
	}

	#[test]
	fn old_versions_are_migrated_and_saved() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(
			dir.path().join(CONFIG_FILE_NAME),
			r#"{ "version": 1, "relays": ["wss://relay.example.com"], "remote_timeout_ms": 800 }"#,
		)
		.unwrap();

		let config = CoreConfig::load_from(dir.path()).unwrap();

		assert_eq!(config.version, TARGET_VERSION);
		assert_eq!(config.local_timeout_ms, 800);
		assert_eq!(config.remote_timeout_ms, 800);

		let on_disk: serde_json::Value =
			serde_json::from_slice(&fs::read(dir.path().join(CONFIG_FILE_NAME)).unwrap()).unwrap();
		assert_eq!(on_disk["version"], 2);
	}

	#[test]
	fn newer_versions_are_rejected() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "version": 9 }"#).unwrap();

		assert!(matches!(
			CoreConfig::load_from(dir.path()),
			Err(ConfigError::UnknownVersion(9))
		));
	}

	#[test]
	fn unreadable_config_is_replaced_by_load_or_create() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join(CONFIG_FILE_NAME), "not json").unwrap();

		assert!(matches!(
			CoreConfig::load_from(dir.path()),
			Err(ConfigError::Parse(_))
		));

		let config = CoreConfig::load_or_create(dir.path()).unwrap();
		assert_eq!(config, CoreConfig::default_with_dir(dir.path()));
	}
}
