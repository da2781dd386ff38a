//! 远程目录树遍历
//!
//! 基于非递归的 `list` 原语做显式栈的深度优先遍历，每个目录只列一次。

use crate::core::entry::{join_relative, Entry, EntryKind, TreeMap};
use crate::error::{SyncError, SyncResult};
use crate::storage::{join_remote, normalize_remote, RemoteEntry, RemoteStore};
use tracing::{debug, info};

/// 遍历产出的一项：条目及其父目录（相对路径，根目录为空串）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWalkItem {
    pub parent: String,
    pub entry: Entry,
}

/// 远程目录树遍历器（惰性、有限、不可重启）
pub struct RemoteTreeWalker<'a> {
    store: &'a dyn RemoteStore,
    root: String,
    /// 待产出的条目：(父目录相对路径, 远程条目)
    pending: Vec<(String, RemoteEntry)>,
    started: bool,
    finished: bool,
    list_calls: usize,
}

impl<'a> RemoteTreeWalker<'a> {
    pub fn new(store: &'a dyn RemoteStore, root: &str) -> Self {
        Self {
            store,
            root: normalize_remote(root),
            pending: Vec::new(),
            started: false,
            finished: false,
            list_calls: 0,
        }
    }

    /// 已发起的 list 调用次数
    pub fn list_calls(&self) -> usize {
        self.list_calls
    }

    /// 产出下一个条目；任何一次 list 失败都会终止整个遍历
    pub async fn next(&mut self) -> SyncResult<Option<RemoteWalkItem>> {
        if self.finished {
            return Ok(None);
        }

        if !self.started {
            self.started = true;
            self.expand("").await?;
        }

        let Some((parent, remote)) = self.pending.pop() else {
            self.finished = true;
            return Ok(None);
        };

        let path = join_relative(&parent, remote.name());
        let entry = if remote.is_dir {
            self.expand(&path).await?;
            Entry {
                revision: remote.revision,
                ..Entry::dir(path, remote.modified_time)
            }
        } else {
            Entry {
                revision: remote.revision,
                ..Entry::file(path, remote.size, remote.modified_time)
            }
        };

        Ok(Some(RemoteWalkItem { parent, entry }))
    }

    /// 列出一个目录，子条目逆序压栈，保证按列表顺序弹出
    async fn expand(&mut self, relative: &str) -> SyncResult<()> {
        let remote_path = join_remote(&self.root, relative);
        debug!("列出远程目录: {}", remote_path);
        self.list_calls += 1;

        let children = match self.store.list(&remote_path).await {
            Ok(children) => children,
            Err(e) => {
                self.finished = true;
                self.pending.clear();
                return Err(SyncError::remote_list(remote_path, e));
            }
        };

        for child in children.into_iter().rev() {
            if child.name().is_empty() {
                continue;
            }
            self.pending.push((relative.to_string(), child));
        }
        Ok(())
    }

    /// 遍历整棵树，构建远程映射
    pub async fn collect(mut self) -> SyncResult<TreeMap> {
        let mut tree = TreeMap::new();
        while let Some(item) = self.next().await? {
            tree.insert(item.entry.path.clone(), item.entry);
        }

        let dirs = tree.values().filter(|e| e.kind == EntryKind::Directory).count();
        info!(
            "远程扫描完成: {} ({} 个文件, {} 个目录, {} 次 list)",
            self.root,
            tree.len() - dirs,
            dirs,
            self.list_calls
        );
        Ok(tree)
    }
}
