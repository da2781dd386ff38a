//! 应用配置模块

use crate::error::{SyncError, SyncResult};
use crate::logging::LogConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件名
pub const CONFIG_FILE: &str = "config.json";

/// 远程存储类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[default]
    Http,
    WebDav,
    S3,
}

/// 远程存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: BackendType,

    // ---- http ----
    /// 元数据接口地址
    #[serde(default)]
    pub api_url: Option<String>,
    /// 文件内容接口地址，为空时与 api_url 相同
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// 访问根，拼在每个路径前面
    #[serde(default = "default_access_root")]
    pub access_root: String,
    /// 是否对路径做百分号编码
    #[serde(default = "default_escape_paths")]
    pub escape_paths: bool,
    /// 连接超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // ---- webdav ----
    #[serde(default)]
    pub webdav_endpoint: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub root: Option<String>,

    // ---- s3 ----
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_access_root() -> String {
    "auto".to_string()
}

fn default_escape_paths() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            api_url: None,
            content_url: None,
            access_token: None,
            access_root: default_access_root(),
            escape_paths: default_escape_paths(),
            timeout_secs: default_timeout_secs(),
            webdav_endpoint: None,
            username: None,
            password: None,
            root: None,
            bucket: None,
            region: None,
            access_key: None,
            secret_key: None,
            endpoint: None,
            prefix: None,
        }
    }
}

/// 应用配置（`config.json`）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE)
    }

    /// 加载配置；文件不存在时使用默认值，无法读取或解析时返回配置错误
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            tracing::debug!("配置文件不存在，使用默认配置: {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::config(format!("读取配置文件失败 {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| SyncError::config(format!("解析配置文件失败 {}: {}", path.display(), e)))
    }

    /// 保存配置；保留文件中其他未知字段
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {}", parent.display()))?;
        }

        // 读取现有配置
        let mut config: serde_json::Value = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        config["remote"] = serde_json::to_value(&self.remote)?;
        config["log"] = serde_json::to_value(&self.log)?;

        fs::write(path, serde_json::to_string_pretty(&config)?)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}

/// 应用配置目录
pub fn config_dir() -> PathBuf {
    crate::dirs::config_dir()
        .map(|p| p.join("mirrorsync"))
        .unwrap_or_else(|| PathBuf::from(".mirrorsync"))
}
