//! 本地目录树遍历
//!
//! 一次前序遍历的结果放进按路径排序的 `TreeMap`，正向迭代即前序（创建类动作），
//! 反向迭代即后序（删除类动作）。

use crate::core::entry::{Entry, TreeMap};
use crate::error::{SyncError, SyncResult};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 本地目录树遍历器
#[derive(Debug, Clone)]
pub struct LocalTreeWalker {
    root: PathBuf,
}

/// 修改时间截断到整秒，与远程时间精度一致
pub fn truncate_to_secs(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl LocalTreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 前序遍历（祖先在前）
    pub fn pre_order(&self) -> SyncResult<Vec<Entry>> {
        // 根目录不存在视为空树（例如下载到新目录）
        if !self.root.exists() {
            debug!("本地目录不存在，视为空: {}", self.root.display());
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name();

        for item in walker {
            let item = item.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                SyncError::filesystem(path, e.into())
            })?;

            let file_type = item.file_type();
            if !file_type.is_file() && !file_type.is_dir() {
                debug!("跳过非普通文件: {}", item.path().display());
                continue;
            }

            let Some(relative) = self.relative_path(item.path()) else {
                warn!("跳过无法转换为 UTF-8 的路径: {}", item.path().display());
                continue;
            };

            let metadata = item
                .metadata()
                .map_err(|e| SyncError::filesystem(item.path(), e.into()))?;
            let modified = metadata
                .modified()
                .map(truncate_to_secs)
                .map_err(|e| SyncError::filesystem(item.path(), e))?;

            entries.push(if file_type.is_dir() {
                Entry::dir(relative, modified)
            } else {
                Entry::file(relative, metadata.len(), modified)
            });
        }

        Ok(entries)
    }

    /// 绝对路径 -> `/` 分隔的相对路径
    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }

    /// 扫描整棵树，构建本地映射（在阻塞线程池中执行）
    pub async fn scan(&self) -> SyncResult<TreeMap> {
        let walker = self.clone();
        let entries = tokio::task::spawn_blocking(move || walker.pre_order())
            .await
            .map_err(|e| SyncError::filesystem(&self.root, std::io::Error::other(e)))??;

        let tree: TreeMap = entries.into_iter().map(|e| (e.path.clone(), e)).collect();
        info!("本地扫描完成: {} ({} 个条目)", self.root.display(), tree.len());
        Ok(tree)
    }
}
