use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SoapError};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub wsdl_path: PathBuf,
    pub max_body_bytes: usize,
    /// Log directory override. When unset the `SOAPD_LOG_DIR` environment
    /// variable or `~/.soapd/logs` applies.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Config {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            port: DEFAULT_PORT,
            upload_dir: default_base_dir().join("uploads"),
            wsdl_path: PathBuf::from("wsdl/service.wsdl"),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_dir: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub port: Option<u16>,
    pub upload_dir: Option<PathBuf>,
    pub wsdl_path: Option<PathBuf>,
    pub max_body_bytes: Option<usize>,
    pub log_dir: Option<PathBuf>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path = env::current_dir().map_err(|err| SoapError::Config(err.to_string()))?;
    path.push(".soapd");
    path.push("config.toml");
    Ok(path)
}

pub fn load_or_default(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let config_path = if let Some(path) = path {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        path
    } else {
        default_config_path()?
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let cfg: Config =
            toml::from_str(&contents).map_err(|err| SoapError::Config(err.to_string()))?;
        Ok((cfg, config_path))
    } else {
        let cfg = Config::default();
        cfg.save(&config_path)?;
        Ok((cfg, config_path))
    }
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|err| SoapError::Config(err.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_update(&mut self, update: ConfigUpdate) {
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(dir) = update.upload_dir {
            self.upload_dir = dir;
        }
        if let Some(path) = update.wsdl_path {
            self.wsdl_path = path;
        }
        if let Some(limit) = update.max_body_bytes {
            self.max_body_bytes = limit;
        }
        if let Some(dir) = update.log_dir {
            self.log_dir = Some(dir);
        }
        self.updated_at = Utc::now();
    }

    pub fn ensure_upload_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.upload_dir)?;
        Ok(())
    }
}

fn default_base_dir() -> PathBuf {
    let Ok(current_dir) = env::current_dir() else {
        return PathBuf::from(".soapd");
    };
    current_dir.join(".soapd")
}
