use crate::error::{ConsoleError, Result};
use postdisaster_common::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 環境変数でサーバURLを上書きする
pub const API_URL_ENV: &str = "POSTDISASTER_API_URL";

/// アップロード可能な画像サイズの上限（10MB）
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub timeout_seconds: u64,
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読み込み（存在しなければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConsoleError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("postdisaster").join("config.json"))
    }

    /// 接続先URL（環境変数を優先）
    pub fn resolved_api_url(&self) -> String {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => self.api_url.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn set_api_url(&mut self, url: String) -> Result<()> {
        validate_api_url(&url)?;
        self.api_url = url;
        self.save()
    }
}

/// http(s) のURLのみ受け付ける
pub fn validate_api_url(url: &str) -> Result<()> {
    let url = url.trim();
    let has_scheme = url.starts_with("http://") || url.starts_with("https://");
    let has_host = url
        .split_once("://")
        .map(|(_, rest)| !rest.trim_matches('/').is_empty())
        .unwrap_or(false);
    if has_scheme && has_host {
        Ok(())
    } else {
        Err(ConsoleError::Config(format!(
            "invalid API URL: {} (expected http://host[:port])",
            url
        )))
    }
}
