//! 内存远程存储，仅用于测试：记录每一次原语调用，便于断言顺序和 dry-run

use super::{normalize_remote, RemoteEntry, RemoteStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    data: Vec<u8>,
    modified_time: i64,
    revision: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    nodes: Mutex<BTreeMap<String, Node>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    next_revision: Mutex<u64>,
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.insert("/", true, Vec::new(), 0);
        store
    }

    fn insert(&self, path: &str, is_dir: bool, data: Vec<u8>, modified_time: i64) {
        let mut rev = self.next_revision.lock().unwrap();
        *rev += 1;
        self.nodes.lock().unwrap().insert(
            normalize_remote(path),
            Node {
                is_dir,
                data,
                modified_time,
                revision: *rev,
            },
        );
    }

    pub fn add_dir(&self, path: &str, modified_time: i64) {
        self.insert(path, true, Vec::new(), modified_time);
    }

    pub fn add_file(&self, path: &str, data: &[u8], modified_time: i64) {
        self.insert(path, false, data.to_vec(), modified_time);
    }

    /// 让指定路径的 list / upload 失败，download 在写出一半数据后失败
    pub fn fail_on(&self, path: &str) {
        self.failing.lock().unwrap().insert(normalize_remote(path));
    }

    pub fn file(&self, path: &str) -> Option<(Vec<u8>, i64)> {
        self.nodes
            .lock()
            .unwrap()
            .get(&normalize_remote(path))
            .filter(|n| !n.is_dir)
            .map(|n| (n.data.clone(), n.modified_time))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.lock().unwrap().contains_key(&normalize_remote(path))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// 会修改远程状态的调用（不含 list 和 download）
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list ") && !c.starts_with("download "))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn require_dir(&self, path: &str) -> Result<()> {
        match self.nodes.lock().unwrap().get(path) {
            Some(node) if node.is_dir => Ok(()),
            Some(_) => anyhow::bail!("{} 不是目录", path),
            None => anyhow::bail!("{} 不存在", path),
        }
    }

    fn entry(path: &str, node: &Node) -> RemoteEntry {
        RemoteEntry {
            path: path.to_string(),
            is_dir: node.is_dir,
            size: node.data.len() as u64,
            modified_time: node.modified_time,
            revision: Some(format!("{:x}", node.revision)),
            mime_type: None,
            icon: None,
            thumb_exists: false,
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let dir = normalize_remote(dir);
        self.record(format!("list {}", dir));
        if self.failing.lock().unwrap().contains(&dir) {
            anyhow::bail!("HTTP 500: list failed");
        }
        self.require_dir(&dir)?;

        let nodes = self.nodes.lock().unwrap();
        Ok(nodes
            .iter()
            .filter(|(path, _)| path.as_str() != "/" && parent_of(path) == dir)
            .map(|(path, node)| Self::entry(path, node))
            .collect())
    }

    async fn upload(
        &self,
        local_file: &Path,
        remote_dir: &str,
        name: Option<&str>,
    ) -> Result<RemoteEntry> {
        let name = match name {
            Some(n) => n.to_string(),
            None => local_file.file_name().unwrap().to_string_lossy().to_string(),
        };
        let path = super::join_remote(remote_dir, &name);
        self.record(format!("upload {}", path));
        if self.failing.lock().unwrap().contains(&path) {
            anyhow::bail!("HTTP 507: insufficient storage");
        }
        self.require_dir(&normalize_remote(remote_dir))?;

        let data = tokio::fs::read(local_file).await?;
        self.insert(&path, false, data, chrono::Utc::now().timestamp());
        let nodes = self.nodes.lock().unwrap();
        Ok(Self::entry(&path, &nodes[&path]))
    }

    async fn download(
        &self,
        remote_file: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let path = normalize_remote(remote_file);
        self.record(format!("download {}", path));
        let data = self
            .file(&path)
            .map(|(data, _)| data)
            .ok_or_else(|| anyhow::anyhow!("HTTP 404: {} not found", path))?;

        if self.failing.lock().unwrap().contains(&path) {
            let half = data.len() / 2;
            sink.write_all(&data[..half]).await?;
            anyhow::bail!("connection reset after {} bytes", half);
        }

        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(data.len() as u64)
    }

    async fn mkdir(&self, remote_dir: &str) -> Result<()> {
        let path = normalize_remote(remote_dir);
        self.record(format!("mkdir {}", path));
        self.require_dir(&parent_of(&path))?;
        if self.contains(&path) {
            anyhow::bail!("HTTP 403: {} already exists", path);
        }
        self.insert(&path, true, Vec::new(), chrono::Utc::now().timestamp());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize_remote(path);
        self.record(format!("delete {}", path));
        let mut nodes = self.nodes.lock().unwrap();
        if nodes.remove(&path).is_none() {
            anyhow::bail!("HTTP 404: {} not found", path);
        }
        let prefix = format!("{}/", path);
        nodes.retain(|p, _| !p.starts_with(&prefix));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
