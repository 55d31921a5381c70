use std::{
    io::{self, ErrorKind, Write},
    path::PathBuf,
    time::Duration,
};

use atomic_write_file::AtomicWriteFile;
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::args::Args;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Copy)]
pub struct AppDetails<'a> {
    pub qualifier: &'a str,
    pub organization: &'a str,
    pub application: &'a str,
}

#[derive(Debug, Error)]
pub enum ConfigFilesError {
    #[error("No valid home directory found")]
    NoValidHome,
    #[error("IO({0})")]
    IO(#[from] io::Error),
    #[error("Yaml{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("No config file path is set")]
    NoConfigSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// `host:port` of the BF2CC remote console.
    pub address: String,
    pub rcon_password: String,
    /// Announced to the server after every login. Empty to skip.
    pub admin_name: String,
    pub poll_interval_ms: u64,
    pub auto_reconnect: bool,
    pub reconnect_wait_ms: u64,
    /// Where admins, aliases and snapshots are kept. Defaults to the config
    /// directory.
    pub data_directory: Option<PathBuf>,
}

impl Settings {
    /// Attempts to locate the default file location for the settings config file
    ///
    /// # Errors
    /// If an appropriate location could not be found
    pub fn default_file_location(app_details: AppDetails) -> Result<PathBuf, ConfigFilesError> {
        Ok(Self::locate_config_directory(app_details)?.join(CONFIG_FILE_NAME))
    }

    /// Attempts to load the [Settings] at the specified location.
    /// If it cannot be found, new [Settings] will be
    /// created at that location.
    ///
    /// # Errors
    /// * `IO` - If the file could not be loaded from some reason
    /// * `Yaml` - If the contents of the file were not valid
    pub fn load_or_create(config_file_path: PathBuf) -> Result<Self, ConfigFilesError> {
        match Self::load_from(config_file_path.clone()) {
            Ok(settings) => Ok(settings),
            Err(ConfigFilesError::IO(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Could not locate {config_file_path:?}, creating new file.");
                Ok(Self {
                    config_path: Some(config_file_path),
                    ..Default::default()
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Attempt to load settings from a provided configuration file
    ///
    /// # Errors
    /// If the file could not be read or parsed
    pub fn load_from(config_file_path: PathBuf) -> Result<Self, ConfigFilesError> {
        let contents = std::fs::read_to_string(&config_file_path)?;
        let mut settings = serde_yaml::from_str::<Self>(&contents)?;
        tracing::debug!("Successfully loaded {config_file_path:?}");
        settings.config_path = Some(config_file_path);
        Ok(settings)
    }

    /// Attempt to save the settings back to the loaded configuration file
    ///
    /// # Errors
    /// If the settings could not be serialized or written back to disk
    pub fn save(&self) -> Result<(), ConfigFilesError> {
        let config_path = self
            .config_path
            .as_ref()
            .ok_or(ConfigFilesError::NoConfigSet)?;

        let mut file = AtomicWriteFile::open(config_path)?;
        write!(&mut file, "{}", serde_yaml::to_string(self)?)?;
        file.commit()?;

        Ok(())
    }

    pub fn save_ok(&self) {
        match self.save() {
            Ok(()) => tracing::debug!("Successfully saved settings to {:?}", self.config_path),
            Err(e) => tracing::error!("Failed to save settings to {:?}: {e}", self.config_path),
        }
    }

    /// Applies command line overrides. These are not meant to be saved.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(address) = &args.address {
            address.clone_into(&mut self.address);
        }
        if let Some(password) = &args.password {
            password.clone_into(&mut self.rcon_password);
        }
        if let Some(admin_name) = &args.admin_name {
            admin_name.clone_into(&mut self.admin_name);
        }
        if let Some(data_dir) = &args.data_dir {
            self.data_directory = Some(data_dir.clone());
        }
        if let Some(interval) = args.interval_ms {
            self.poll_interval_ms = interval;
        }
        if args.no_reconnect {
            self.auto_reconnect = false;
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// `None` when reconnecting is disabled.
    #[must_use]
    pub fn reconnect_wait(&self) -> Option<Duration> {
        self.auto_reconnect
            .then(|| Duration::from_millis(self.reconnect_wait_ms))
    }

    /// The configured data directory, or the config directory when there is
    /// none. The directory is created if needed.
    ///
    /// # Errors
    /// If no directory could be found or created
    pub fn data_directory(&self, app_details: AppDetails) -> Result<PathBuf, ConfigFilesError> {
        match &self.data_directory {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(dir.clone())
            }
            None => Self::locate_config_directory(app_details),
        }
    }

    /// Attempts to find (and create) a directory to be used for configuration
    /// files
    ///
    /// # Errors
    /// If a valid config file directory could not be found (usually because a
    /// valid home directory was not found)
    pub fn locate_config_directory(app_details: AppDetails) -> Result<PathBuf, ConfigFilesError> {
        let dirs = ProjectDirs::from(
            app_details.qualifier,
            app_details.organization,
            app_details.application,
        )
        .ok_or(ConfigFilesError::NoValidHome)?;
        let dir = dirs.config_dir();
        std::fs::create_dir_all(dir)?;
        Ok(PathBuf::from(dir))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: None,
            address: "127.0.0.1:4711".into(),
            rcon_password: String::new(),
            admin_name: "Gorcon".into(),
            poll_interval_ms: 2000,
            auto_reconnect: true,
            reconnect_wait_ms: 5000,
            data_directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings: Settings =
            serde_yaml::from_str("address: 10.0.0.2:4711\nrcon_password: hunter2\n").unwrap();

        assert_eq!(settings.address, "10.0.0.2:4711");
        assert_eq!(settings.rcon_password, "hunter2");
        assert_eq!(settings.admin_name, "Gorcon");
        assert_eq!(settings.poll_interval(), Duration::from_secs(2));
        assert_eq!(settings.reconnect_wait(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn args_override_settings() {
        let mut settings = Settings::default();
        let args = Args::parse_from([
            "bf2cc_monitor",
            "--address",
            "example.org:4711",
            "--interval-ms",
            "500",
            "--no-reconnect",
        ]);

        settings.apply_args(&args);

        assert_eq!(settings.address, "example.org:4711");
        assert_eq!(settings.poll_interval(), Duration::from_millis(500));
        assert_eq!(settings.reconnect_wait(), None);
        assert_eq!(settings.admin_name, "Gorcon");
    }

    #[test]
    fn saved_settings_load_back() {
        let path = std::env::temp_dir().join(format!("bf2cc_settings_{}.yaml", std::process::id()));
        let settings = Settings {
            config_path: Some(path.clone()),
            rcon_password: "secret".into(),
            ..Default::default()
        };

        settings.save().unwrap();
        let loaded = Settings::load_or_create(path.clone()).unwrap();
        assert_eq!(loaded.rcon_password, "secret");
        assert_eq!(loaded.config_path, Some(path.clone()));

        std::fs::remove_file(path).unwrap();
    }
}
