use super::{normalize_remote, RemoteEntry, RemoteStore, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metadata, Metakey, Operator};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// 基于 opendal 的远程存储（WebDAV / S3）
pub struct OperatorStore {
    operator: Operator,
    name: String,
}

impl OperatorStore {
    pub fn webdav(
        endpoint: &str,
        username: &str,
        password: &str,
        root: Option<String>,
    ) -> Result<Self> {
        use opendal::services::Webdav;

        let mut builder = Webdav::default()
            .endpoint(endpoint)
            .username(username)
            .password(password);

        if let Some(ref r) = root {
            builder = builder.root(r);
        }

        let name = format!(
            "webdav://{}{}",
            endpoint.trim_end_matches('/'),
            root.as_deref()
                .map(|r| format!("/{}", r.trim_start_matches('/')))
                .unwrap_or_default()
        );

        Ok(Self::with_timeouts(Operator::new(builder)?.finish(), name))
    }

    pub fn s3(
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        endpoint: Option<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default()
            .bucket(bucket)
            .region(region)
            .access_key_id(access_key)
            .secret_access_key(secret_key);

        if let Some(ref ep) = endpoint {
            builder = builder.endpoint(ep);
        }

        if let Some(ref p) = prefix {
            builder = builder.root(p);
        }

        let name = format!(
            "s3://{}{}",
            bucket,
            prefix.as_deref().map(|p| format!("/{}", p)).unwrap_or_default()
        );

        Ok(Self::with_timeouts(Operator::new(builder)?.finish(), name))
    }

    fn with_timeouts(operator: Operator, name: String) -> Self {
        let operator = operator.layer(
            TimeoutLayer::default()
                .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
        );
        Self { operator, name }
    }

    /// 远程路径 -> opendal 文件路径（无前导 `/`）
    fn file_key(path: &str) -> String {
        normalize_remote(path).trim_start_matches('/').to_string()
    }

    /// 远程路径 -> opendal 目录路径（以 `/` 结尾，根目录为 `/`）
    fn dir_key(path: &str) -> String {
        let key = Self::file_key(path);
        if key.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", key)
        }
    }

    fn to_entry(path: &str, meta: &Metadata) -> RemoteEntry {
        RemoteEntry {
            path: normalize_remote(path),
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.content_length() },
            modified_time: meta.last_modified().map_or(0, |t| t.timestamp()),
            revision: meta.etag().map(|s| s.trim_matches('"').to_string()),
            mime_type: meta.content_type().map(str::to_string),
            icon: None,
            thumb_exists: false,
        }
    }
}

#[async_trait]
impl RemoteStore for OperatorStore {
    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let dir_key = Self::dir_key(dir);
        let mut lister = self
            .operator
            .lister_with(&dir_key)
            .metakey(
                Metakey::ContentLength
                    | Metakey::LastModified
                    | Metakey::Mode
                    | Metakey::Etag
                    | Metakey::ContentType,
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(entry) = lister.try_next().await? {
            // 部分服务会把目录自身也列出来
            if entry.path() == dir_key || entry.path().is_empty() {
                continue;
            }
            entries.push(Self::to_entry(entry.path(), entry.metadata()));
        }

        Ok(entries)
    }

    async fn upload(
        &self,
        local_file: &Path,
        remote_dir: &str,
        name: Option<&str>,
    ) -> Result<RemoteEntry> {
        let name = match name {
            Some(n) => n.to_string(),
            None => local_file
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("无效的本地文件名: {}", local_file.display()))?,
        };
        let data = tokio::fs::read(local_file)
            .await
            .with_context(|| format!("读取本地文件失败: {}", local_file.display()))?;

        let key = Self::file_key(&super::join_remote(remote_dir, &name));
        self.operator.write(&key, data).await?;

        let meta = self.operator.stat(&key).await?;
        Ok(Self::to_entry(&key, &meta))
    }

    async fn download(
        &self,
        remote_file: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let data = self.operator.read(&Self::file_key(remote_file)).await?;
        let bytes = data.to_vec();
        sink.write_all(&bytes).await?;
        sink.flush().await?;
        Ok(bytes.len() as u64)
    }

    async fn mkdir(&self, remote_dir: &str) -> Result<()> {
        self.operator.create_dir(&Self::dir_key(remote_dir)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = Self::file_key(path);
        let meta = self.operator.stat(&key).await?;
        if meta.is_dir() {
            self.operator.remove_all(&Self::dir_key(path)).await?;
        } else {
            self.operator.delete(&key).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
