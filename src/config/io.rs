use std::env::current_exe;
use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use log::{info, warn};
use tokio::fs;
use serde_json;

use crate::config::types::SessionConfig;
use crate::error::ConfigError;

// creates a path to spacemouse-bridge.json in the same directory as the executable
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(path) => {
            let dir = path.parent()?;
            Some(dir.join("spacemouse-bridge.json"))
        },
        Err(err) => {
            warn!("Failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to spacemouse-bridge.json in an os dependent standard directory, such as
// %AppData% on windows.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "3dconnexion", "spacemouse-bridge").map(|dirs| {
        dirs.config_dir().join("spacemouse-bridge.json")
    })
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = get_portable_config_path() {
        if path.is_file() {
            return Ok(path);
        }
    }

    get_local_config_path().ok_or(ConfigError::NoConfigPath)
}

#[derive(Debug, Clone)]
pub struct ConfigIO {
    path: PathBuf,
}

impl ConfigIO {
    pub fn new(path: PathBuf) -> Self {
        ConfigIO { path }
    }

    pub fn from_default_location() -> Result<Self, ConfigError> {
        Ok(ConfigIO::new(get_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<SessionConfig, ConfigError> {
        info!("Reading config file {}", self.path.to_string_lossy());
        let content = fs::read(&self.path).await?;

        if content.is_empty() {
            return Ok(SessionConfig::default());
        }

        let content = str::from_utf8(&content)?;
        Ok(serde_json::from_str(content)?)
    }

    /**
     * Like `read`, but a missing file yields the defaults.
     */
    pub async fn read_or_default(&self) -> Result<SessionConfig, ConfigError> {
        match self.read().await {
            Ok(config) => Ok(config),
            Err(err) if err.is_file_not_found_error() => {
                info!("Config file not found, using defaults");
                Ok(SessionConfig::default())
            },
            Err(err) => Err(err),
        }
    }

    pub async fn save(&self, config: &SessionConfig) -> Result<(), ConfigError> {
        info!("Saving config to {}", self.path.to_string_lossy());

        if let Some(directory) = self.path.parent() {
            fs::create_dir_all(directory).await?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("spacemouse-bridge-{}", Uuid::new_v4()))
            .join("config.json")
    }

    #[tokio::test]
    async fn save_then_read_keeps_values() {
        let io = ConfigIO::new(scratch_path());
        let config = SessionConfig {
            helper_path: Some(PathBuf::from("/usr/local/libexec/spacemouse-hid-reader")),
            auto_reconnect: false,
            clamp_motion: true,
            ..SessionConfig::default()
        };

        io.save(&config).await.unwrap();
        assert_eq!(io.read().await.unwrap(), config);

        let _ = std::fs::remove_dir_all(io.path().parent().unwrap());
    }

    #[tokio::test]
    async fn missing_file_reads_as_defaults() {
        let io = ConfigIO::new(scratch_path());

        let err = io.read().await.unwrap_err();
        assert!(err.is_file_not_found_error());
        assert_eq!(io.read_or_default().await.unwrap(), SessionConfig::default());
    }

    #[tokio::test]
    async fn empty_file_reads_as_defaults() {
        let io = ConfigIO::new(scratch_path());
        std::fs::create_dir_all(io.path().parent().unwrap()).unwrap();
        std::fs::write(io.path(), b"").unwrap();

        assert_eq!(io.read().await.unwrap(), SessionConfig::default());

        let _ = std::fs::remove_dir_all(io.path().parent().unwrap());
    }
}
