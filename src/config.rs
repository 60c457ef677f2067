use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the uploaded PDF blobs
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Largest accepted file, in bytes
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_db_path() -> String {
    "data/docvault.db".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.resolve_upload_dir()?;
        config.ensure_directories()?;
        tracing::info!(
            "Storage config: upload_dir={}, max_upload_size={}",
            config.storage.upload_dir.display(),
            config.storage.max_upload_size
        );
        Ok(config)
    }

    /// Parse a TOML document, filling every missing key with its default
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: DV_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(val) = lookup("DV_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("DV_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        // Database overrides
        if let Some(val) = lookup("DV_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        // Storage overrides
        if let Some(val) = lookup("DV_CONF_STORAGE_UPLOAD_DIR") {
            if !val.trim().is_empty() {
                self.storage.upload_dir = PathBuf::from(val);
            }
        }
        if let Some(val) = lookup("DV_CONF_STORAGE_MAX_UPLOAD_SIZE") {
            if let Ok(size) = val.parse() {
                self.storage.max_upload_size = size;
            }
        }
    }

    /// Stored file paths are absolute, so pin a relative upload dir to the working directory
    fn resolve_upload_dir(&mut self) -> anyhow::Result<()> {
        if self.storage.upload_dir.is_relative() {
            self.storage.upload_dir = env::current_dir()?.join(&self.storage.upload_dir);
        }
        Ok(())
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::create_dir_all(&self.storage.upload_dir)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_service_contract() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.storage.max_upload_size, 10 * 1024 * 1024);
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [storage]
            max_upload_size = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.max_upload_size, 1024);
        assert_eq!(config.database.path, "data/docvault.db");
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("DV_CONF_SERVER_PORT", "9000"),
            ("DV_CONF_STORAGE_UPLOAD_DIR", "/srv/pdfs"),
            ("DV_CONF_STORAGE_MAX_UPLOAD_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.upload_dir, PathBuf::from("/srv/pdfs"));
        // Unparseable numbers are ignored
        assert_eq!(config.storage.max_upload_size, 10 * 1024 * 1024);
    }

    #[test]
    fn relative_upload_dir_becomes_absolute() {
        let mut config = Config::default();
        config.resolve_upload_dir().unwrap();
        assert!(config.storage.upload_dir.is_absolute());
        assert!(config.storage.upload_dir.ends_with("uploads"));
    }
}
