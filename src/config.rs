use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding uploaded files and both snapshot files
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_root() -> PathBuf {
    PathBuf::from("./storage")
}
fn default_max_upload() -> u64 {
    500 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

impl StorageConfig {
    /// Path of the video metadata snapshot file.
    pub fn videos_db_path(&self) -> PathBuf {
        self.root.join("videos.json")
    }

    /// Path of the webhook registry snapshot file.
    pub fn webhooks_db_path(&self) -> PathBuf {
        self.root.join("webhooks.json")
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./config.toml", "./clipvault.toml"];

    for path_str in default_paths {
        let path = Path::new(path_str);
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.storage.max_upload_bytes == 0 {
        anyhow::bail!("Maximum upload size cannot be 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.root, PathBuf::from("./storage"));
        assert_eq!(config.storage.max_upload_bytes, 500 * 1024 * 1024);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [storage]
            root = "/var/lib/clipvault"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/clipvault"));
        assert_eq!(config.storage.max_upload_bytes, 500 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_snapshot_paths_under_root() {
        let config = Config::default();
        assert_eq!(
            config.storage.videos_db_path(),
            PathBuf::from("./storage/videos.json")
        );
        assert_eq!(
            config.storage.webhooks_db_path(),
            PathBuf::from("./storage/webhooks.json")
        );
    }
}
