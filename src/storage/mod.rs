pub mod http;
#[cfg(test)]
pub mod memory;
pub mod operator;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWrite;

pub use http::HttpStore;
pub use operator::OperatorStore;

use crate::config::{BackendType, RemoteConfig};
use crate::error::{SyncError, SyncResult};

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- list, mkdir, delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- upload, download 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远程条目元数据（list/upload 的返回值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    /// 远程完整路径，以 `/` 开头
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    /// 修改时间（Unix 秒）
    pub modified_time: i64,
    pub revision: Option<String>,
    pub mime_type: Option<String>,
    pub icon: Option<String>,
    pub thumb_exists: bool,
}

impl RemoteEntry {
    /// 路径的最后一段
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// 远程存储能力接口
///
/// 所有调用都是一次性的，失败直接返回错误，由调用方决定如何处理。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 列出目录的直接子条目（不递归）
    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>>;

    /// 上传本地文件到远程目录，总是覆盖；`name` 为空时使用本地文件名
    async fn upload(
        &self,
        local_file: &Path,
        remote_dir: &str,
        name: Option<&str>,
    ) -> Result<RemoteEntry>;

    /// 下载远程文件，写入 `sink`，返回写入的字节数
    async fn download(
        &self,
        remote_file: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64>;

    /// 创建远程目录，不会自动创建缺失的上级目录
    async fn mkdir(&self, remote_dir: &str) -> Result<()>;

    /// 删除文件或目录（目录递归删除）
    async fn delete(&self, path: &str) -> Result<()>;

    /// 转义路径，用于拼接请求 URL
    fn escape(&self, raw: &str) -> String {
        raw.to_string()
    }

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 百分号编码，只保留字母、数字以及 `_` `.` `/` `-`
pub fn escape_path(raw: &str, enabled: bool) -> String {
    if !enabled {
        return raw.to_string();
    }
    raw.split('/')
        .map(|segment| urlencoding::encode(segment).replace('~', "%7E"))
        .collect::<Vec<_>>()
        .join("/")
}

/// 规范化远程路径：以 `/` 开头，去掉末尾的 `/`
pub fn normalize_remote(path: &str) -> String {
    let trimmed = path.replace('\\', "/");
    let trimmed = trimmed.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// 拼接远程根路径和相对路径
pub fn join_remote(root: &str, relative: &str) -> String {
    let root = normalize_remote(root);
    let relative = relative.trim_matches('/');
    match (root.as_str(), relative) {
        (_, "") => root,
        ("/", rel) => format!("/{}", rel),
        (base, rel) => format!("{}/{}", base, rel),
    }
}

/// 取出必填配置项，缺失时返回配置错误
fn required<'a>(value: &'a Option<String>, backend: &str, key: &str) -> SyncResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SyncError::config(format!("{} 存储缺少配置项 {}，请运行 `mirrorsync setup`", backend, key)))
}

/// 根据配置创建远程存储实例
pub fn create_store(config: &RemoteConfig) -> SyncResult<Arc<dyn RemoteStore>> {
    let build_err = |e: anyhow::Error| SyncError::config(format!("初始化远程存储失败: {:#}", e));

    match config.backend {
        BackendType::Http => {
            let api_url = required(&config.api_url, "http", "apiUrl")?;
            let content_url = config.content_url.as_deref().unwrap_or(api_url);
            let token = required(&config.access_token, "http", "accessToken")?;
            tracing::info!("初始化 HTTP 存储: {}", api_url);
            let store = HttpStore::new(
                api_url,
                content_url,
                &config.access_root,
                token,
                config.escape_paths,
                config.timeout_secs,
            )
            .map_err(build_err)?;
            Ok(Arc::new(store) as Arc<dyn RemoteStore>)
        }
        BackendType::WebDav => {
            let endpoint = required(&config.webdav_endpoint, "WebDAV", "webdavEndpoint")?;
            let username = required(&config.username, "WebDAV", "username")?;
            let password = required(&config.password, "WebDAV", "password")?;
            tracing::info!("初始化 WebDAV 存储: endpoint={}, root={:?}", endpoint, config.root);
            let store = OperatorStore::webdav(endpoint, username, password, config.root.clone())
                .map_err(build_err)?;
            Ok(Arc::new(store) as Arc<dyn RemoteStore>)
        }
        BackendType::S3 => {
            let bucket = required(&config.bucket, "S3", "bucket")?;
            let region = required(&config.region, "S3", "region")?;
            let access_key = required(&config.access_key, "S3", "accessKey")?;
            let secret_key = required(&config.secret_key, "S3", "secretKey")?;
            tracing::info!("初始化 S3 存储: bucket={}, region={}", bucket, region);
            let store = OperatorStore::s3(
                bucket,
                region,
                access_key,
                secret_key,
                config.endpoint.clone(),
                config.prefix.clone(),
            )
            .map_err(build_err)?;
            Ok(Arc::new(store) as Arc<dyn RemoteStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_keeps_allow_list() {
        assert_eq!(escape_path("/Public/a_b-c.txt", true), "/Public/a_b-c.txt");
        assert_eq!(escape_path("/My Docs/100%.txt", true), "/My%20Docs/100%25.txt");
        assert_eq!(escape_path("/x~y", true), "/x%7Ey");
        assert_eq!(escape_path("/文档", true), "/%E6%96%87%E6%A1%A3");
    }

    #[test]
    fn test_escape_disabled() {
        assert_eq!(escape_path("/My Docs/a b", false), "/My Docs/a b");
    }

    #[test]
    fn test_normalize_and_join_remote() {
        assert_eq!(normalize_remote(""), "/");
        assert_eq!(normalize_remote("Public/"), "/Public");
        assert_eq!(join_remote("/", "a/b"), "/a/b");
        assert_eq!(join_remote("/Public/", "a.txt"), "/Public/a.txt");
        assert_eq!(join_remote("/Public", ""), "/Public");
    }

    #[test]
    fn test_entry_name() {
        let entry = RemoteEntry {
            path: "/Public/a.txt".to_string(),
            is_dir: false,
            size: 10,
            modified_time: 0,
            revision: None,
            mime_type: None,
            icon: None,
            thumb_exists: false,
        };
        assert_eq!(entry.name(), "a.txt");
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let err = create_store(&RemoteConfig::default()).err().unwrap();
        match err {
            SyncError::Config(msg) => assert!(msg.contains("apiUrl")),
            other => panic!("unexpected: {:?}", other),
        }

        let config = RemoteConfig {
            api_url: Some("https://api.example.com/1".into()),
            access_token: Some(String::new()),
            ..RemoteConfig::default()
        };
        assert!(matches!(create_store(&config), Err(SyncError::Config(msg)) if msg.contains("accessToken")));

        let webdav = RemoteConfig {
            backend: BackendType::WebDav,
            webdav_endpoint: Some("https://dav.example.com".into()),
            ..RemoteConfig::default()
        };
        assert!(matches!(create_store(&webdav), Err(SyncError::Config(msg)) if msg.contains("username")));
    }

    #[test]
    fn test_complete_http_config_builds_store() {
        let config = RemoteConfig {
            api_url: Some("https://api.example.com/1".into()),
            access_token: Some("token".into()),
            ..RemoteConfig::default()
        };
        let store = create_store(&config).unwrap();
        assert_eq!(store.name(), "http:https://api.example.com/1");
    }
}
