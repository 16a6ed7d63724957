use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::api::{ClientSettings, DEFAULT_API_BASE, DEFAULT_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT};
use crate::errors::FirError;

/// Shape of `config.toml`. Every key is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub user_token: Option<String>,
    pub app_id: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
}

/// Config file merged with `FIR_*` environment overrides. Command-line
/// flags are applied on top of this by the caller.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub user_token: Option<String>,
    pub app_id: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
    pub upload_timeout: Duration,
}

impl EffectiveConfig {
    pub fn load() -> Result<Self> {
        let cfg_path = config_file_path();
        debug!(path = ?cfg_path, exists = cfg_path.exists(), "config.load.attempt");
        let mut file_cfg: FileConfig = if cfg_path.exists() {
            let content = fs::read_to_string(&cfg_path)
                .with_context(|| format!("read config {cfg_path:?}"))
                .map_err(|e| FirError::Config(format!("failed to read config: {e:#}")))?;
            match toml::from_str(&content) {
                Ok(v) => {
                    debug!("config.parse.success");
                    v
                }
                Err(e) => {
                    debug!(error = ?e, "config.parse.error");
                    let msg = format!("failed to parse config {cfg_path:?}: {e}");
                    return Err(FirError::Config(msg).into());
                }
            }
        } else {
            FileConfig::default()
        };

        if let Some(v) = non_empty_env("FIR_USER_TOKEN") {
            file_cfg.user_token = Some(v);
        }
        if let Some(v) = non_empty_env("FIR_APP_ID") {
            file_cfg.app_id = Some(v);
        }
        if let Some(v) = non_empty_env("FIR_API_BASE") {
            file_cfg.api_base = Some(v);
        }
        if let Some(v) = secs_env("FIR_TIMEOUT_SECS")? {
            file_cfg.timeout_secs = Some(v);
        }
        if let Some(v) = secs_env("FIR_UPLOAD_TIMEOUT_SECS")? {
            file_cfg.upload_timeout_secs = Some(v);
        }

        Ok(Self {
            user_token: file_cfg.user_token,
            app_id: file_cfg.app_id,
            api_base: file_cfg.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout: file_cfg.timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT),
            upload_timeout: file_cfg
                .upload_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_UPLOAD_TIMEOUT),
        })
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api_base.clone(),
            timeout: self.timeout,
            upload_timeout: self.upload_timeout,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn secs_env(key: &str) -> Result<Option<u64>> {
    match non_empty_env(key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| {
                let msg = format!("{key} must be a whole number of seconds, got {v:?}");
                FirError::Config(msg).into()
            }),
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fir-distribute")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
