use super::{escape_path, normalize_remote, RemoteEntry, RemoteStore, OP_TIMEOUT_SECS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// 远程接口返回的修改时间格式，例如 `Wed, 01 Jan 2020 00:00:00 +0000`
pub const MODIFIED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// 接口返回的元数据记录
#[derive(Debug, Clone, Deserialize)]
struct MetadataRecord {
    path: String,
    #[serde(default)]
    is_dir: bool,
    #[serde(default)]
    bytes: u64,
    modified: Option<String>,
    rev: Option<String>,
    mime_type: Option<String>,
    icon: Option<String>,
    #[serde(default)]
    thumb_exists: bool,
    #[serde(default)]
    is_deleted: bool,
    #[serde(default)]
    contents: Vec<MetadataRecord>,
}

impl MetadataRecord {
    fn into_entry(self) -> Result<RemoteEntry> {
        let modified_time = match self.modified.as_deref() {
            Some(s) => parse_modified(s)?,
            None => 0,
        };
        Ok(RemoteEntry {
            path: normalize_remote(&self.path),
            is_dir: self.is_dir,
            size: if self.is_dir { 0 } else { self.bytes },
            modified_time,
            revision: self.rev,
            mime_type: self.mime_type,
            icon: self.icon,
            thumb_exists: self.thumb_exists,
        })
    }
}

/// 解析修改时间为 Unix 秒
pub fn parse_modified(value: &str) -> Result<i64> {
    let time = chrono::DateTime::parse_from_str(value, MODIFIED_FORMAT)
        .with_context(|| format!("无法解析修改时间: {}", value))?;
    Ok(time.timestamp())
}

/// 基于 REST 接口的远程存储
pub struct HttpStore {
    client: Client,
    api_url: String,
    content_url: String,
    access_root: String,
    token: String,
    escape_paths: bool,
    name: String,
}

impl HttpStore {
    pub fn new(
        api_url: &str,
        content_url: &str,
        access_root: &str,
        token: &str,
        escape_paths: bool,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = if timeout_secs == 0 { OP_TIMEOUT_SECS } else { timeout_secs };
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            content_url: content_url.trim_end_matches('/').to_string(),
            access_root: access_root.to_string(),
            token: token.to_string(),
            escape_paths,
            name: format!("http:{}", api_url.trim_end_matches('/')),
        })
    }

    /// 拼接带路径的接口地址：`{base}/{action}/{root}{path}`
    fn url(&self, base: &str, action: &str, path: &str) -> String {
        format!(
            "{}/{}/{}{}",
            base,
            action,
            self.access_root,
            self.escape(&normalize_remote(path))
        )
    }

    /// 检查响应状态，失败时带上响应体
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("HTTP {}: {}", status, body.trim())
    }

    async fn fileop(&self, op: &str, path: &str) -> Result<Response> {
        let url = format!("{}/fileops/{}", self.api_url, op);
        let path = normalize_remote(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .form(&[("root", self.access_root.as_str()), ("path", path.as_str())])
            .send()
            .await?;
        Self::check(response).await
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let url = self.url(&self.api_url, "metadata", dir);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("list", "true")])
            .send()
            .await?;
        let record: MetadataRecord = Self::check(response).await?.json().await?;

        if !record.is_dir {
            anyhow::bail!("{} 不是目录", record.path);
        }

        record
            .contents
            .into_iter()
            .filter(|child| !child.is_deleted)
            .map(MetadataRecord::into_entry)
            .collect()
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

        let target = super::join_remote(remote_dir, &name);
        let url = self.url(&self.content_url, "files_put", &target);
        tracing::debug!("PUT {} ({} 字节)", url, data.len());

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .query(&[("overwrite", "true")])
            .body(data)
            .send()
            .await?;
        let record: MetadataRecord = Self::check(response).await?.json().await?;
        record.into_entry()
    }

    async fn download(
        &self,
        remote_file: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let url = self.url(&self.content_url, "files", remote_file);
        tracing::debug!("GET {}", url);

        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
        let mut stream = Box::pin(Self::check(response).await?.bytes_stream());

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;
        Ok(written)
    }

    async fn mkdir(&self, remote_dir: &str) -> Result<()> {
        self.fileop("create_folder", remote_dir).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.fileop("delete", path).await?;
        Ok(())
    }

    fn escape(&self, raw: &str) -> String {
        escape_path(raw, self.escape_paths)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
