//! 动作执行器 - 把单个同步动作落到远程存储或本地文件系统

use crate::core::comparator::SyncAction;
use crate::core::entry::{file_name, parent_relative, Direction, EntryKind};
use crate::error::{SyncError, SyncResult, TransferOp};
use crate::storage::{join_remote, RemoteStore};
use scopeguard::ScopeGuard;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// 单个动作的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// 已执行，附带传输字节数
    Applied { bytes: u64 },
    /// dry-run，未执行
    Simulated,
    /// 下载成功但重命名失败，临时文件已删除，同步继续
    RenameFailed { warning: String },
}

/// 动作执行器
pub struct TransferExecutor<'a> {
    store: &'a dyn RemoteStore,
    direction: Direction,
    remote_root: String,
    local_root: PathBuf,
    dry_run: bool,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        direction: Direction,
        remote_root: &str,
        local_root: &Path,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            direction,
            remote_root: remote_root.to_string(),
            local_root: local_root.to_path_buf(),
            dry_run,
        }
    }

    fn remote_path(&self, relative: &str) -> String {
        join_remote(&self.remote_root, relative)
    }

    fn local_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.local_root.clone(), |path, segment| path.join(segment))
    }

    /// 执行一个动作；dry-run 时只记录日志
    pub async fn apply(&self, action: &SyncAction) -> SyncResult<ActionOutcome> {
        let relative = action.path();
        let (remote, local) = (self.remote_path(relative), self.local_path(relative));

        match action {
            SyncAction::Mkdir { .. } => match self.direction {
                Direction::Download => info!("mkdir {}", local.display()),
                Direction::Upload => info!("mkdir {}", remote),
            },
            SyncAction::Download { .. } => info!("download {} -> {}", remote, local.display()),
            SyncAction::Upload { .. } => info!("upload {} -> {}", local.display(), remote),
            SyncAction::Delete { .. } => match self.direction {
                Direction::Download => info!("delete {}", local.display()),
                Direction::Upload => info!("delete {}", remote),
            },
        }

        if self.dry_run {
            return Ok(ActionOutcome::Simulated);
        }

        match action {
            SyncAction::Mkdir { .. } => {
                match self.direction {
                    Direction::Download => fs::create_dir_all(&local)
                        .await
                        .map_err(|e| SyncError::filesystem(&local, e))?,
                    Direction::Upload => self
                        .store
                        .mkdir(&remote)
                        .await
                        .map_err(|e| SyncError::transfer(TransferOp::Mkdir, &remote, e))?,
                }
                Ok(ActionOutcome::Applied { bytes: 0 })
            }
            SyncAction::Download { modified_time, .. } => {
                download_atomic(self.store, &remote, &local, Some(*modified_time)).await
            }
            SyncAction::Upload { .. } => {
                let remote_dir = self.remote_path(parent_relative(relative));
                let entry = self
                    .store
                    .upload(&local, &remote_dir, Some(file_name(relative)))
                    .await
                    .map_err(|e| SyncError::transfer(TransferOp::Upload, &remote, e))?;
                debug!("已上传 {} (rev {:?})", entry.path, entry.revision);
                Ok(ActionOutcome::Applied { bytes: entry.size })
            }
            SyncAction::Delete { kind, .. } => {
                match self.direction {
                    Direction::Download => delete_local(&local, *kind).await?,
                    Direction::Upload => self
                        .store
                        .delete(&remote)
                        .await
                        .map_err(|e| SyncError::transfer(TransferOp::Delete, &remote, e))?,
                }
                Ok(ActionOutcome::Applied { bytes: 0 })
            }
        }
    }
}

/// 删除本地条目
///
/// 目录按后序删除，已知的子条目已先删掉；遍历时跳过的条目（符号链接、非 UTF-8
/// 名称）仍可能留在目录里，所以目录整体删除。
async fn delete_local(path: &Path, kind: EntryKind) -> SyncResult<()> {
    let result = match kind {
        EntryKind::File => fs::remove_file(path).await,
        EntryKind::Directory => fs::remove_dir_all(path).await,
    };
    result.map_err(|e| SyncError::filesystem(path, e))
}

/// 下载时使用的临时文件路径（与目标同目录）
fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}

/// 原子下载：先写同目录的临时文件，成功后重命名到目标路径
///
/// 传输失败时删除临时文件并返回错误；仅重命名失败时删除临时文件、记录警告并返回
/// `RenameFailed`。`modified_time` 非空时写回本地修改时间。
pub async fn download_atomic(
    store: &dyn RemoteStore,
    remote: &str,
    target: &Path,
    modified_time: Option<i64>,
) -> SyncResult<ActionOutcome> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::filesystem(parent, e))?;
    }

    let temp = scopeguard::guard(temp_path_for(target), |path| {
        let _ = std::fs::remove_file(&path);
    });

    let mut file = fs::File::create(&*temp)
        .await
        .map_err(|e| SyncError::filesystem(&*temp, e))?;

    let bytes = store
        .download(remote, &mut file)
        .await
        .map_err(|e| SyncError::transfer(TransferOp::Download, remote, e))?;

    file.flush().await.map_err(|e| SyncError::filesystem(&*temp, e))?;
    let file = file.into_std().await;
    if let Some(secs) = modified_time.filter(|s| *s >= 0) {
        if let Err(e) = file.set_modified(UNIX_EPOCH + Duration::from_secs(secs as u64)) {
            debug!("设置修改时间失败 {}: {}", temp.display(), e);
        }
    }
    drop(file);

    match fs::rename(&*temp, target).await {
        Ok(()) => {
            // 重命名成功，不再清理
            let _ = ScopeGuard::into_inner(temp);
            debug!("下载完成: {} ({} 字节)", target.display(), bytes);
            Ok(ActionOutcome::Applied { bytes })
        }
        Err(source) => {
            let err = SyncError::Rename {
                from: temp.clone(),
                to: target.to_path_buf(),
                source,
            };
            warn!("{}，已丢弃临时文件", err);
            Ok(ActionOutcome::RenameFailed {
                warning: err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn leftover_parts(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".part"))
            .collect()
    }

    #[tokio::test]
    async fn test_download_creates_parents_and_sets_mtime() {
        let store = MemoryStore::new();
        store.add_dir("/Public", 0);
        store.add_file("/Public/a.txt", b"0123456789", 1577836800);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Public/a.txt");

        let outcome = download_atomic(&store, "/Public/a.txt", &target, Some(1577836800))
            .await
            .unwrap();

        assert_eq!(outcome, ActionOutcome::Applied { bytes: 10 });
        assert_eq!(std::fs::read(&target).unwrap(), b"0123456789");
        let mtime = std::fs::metadata(&target).unwrap().modified().unwrap();
        assert_eq!(crate::core::local_walker::truncate_to_secs(mtime), 1577836800);
        assert!(leftover_parts(&dir.path().join("Public")).is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_no_partial_file() {
        let store = MemoryStore::new();
        store.add_file("/big.bin", &[7u8; 64], 10);
        store.fail_on("/big.bin");
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("big.bin");

        let err = download_atomic(&store, "/big.bin", &target, None).await.unwrap_err();

        assert!(matches!(err, SyncError::Transfer { op: TransferOp::Download, .. }));
        assert!(!target.exists());
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_download_keeps_previous_version() {
        let store = MemoryStore::new();
        store.add_file("/doc.txt", b"new contents", 10);
        store.fail_on("/doc.txt");
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.txt");
        std::fs::write(&target, b"old").unwrap();

        assert!(download_atomic(&store, "/doc.txt", &target, None).await.is_err());
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_rename_failure_is_recoverable() {
        let store = MemoryStore::new();
        store.add_file("/clash", b"data", 10);
        let dir = tempfile::tempdir().unwrap();
        // 目标位置是一个非空目录，重命名必然失败
        let target = dir.path().join("clash");
        std::fs::create_dir_all(target.join("inside")).unwrap();

        let outcome = download_atomic(&store, "/clash", &target, None).await.unwrap();

        assert!(matches!(outcome, ActionOutcome::RenameFailed { .. }));
        assert!(target.is_dir());
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("f.txt");
        std::fs::write(&local, b"abc").unwrap();

        let executor = TransferExecutor::new(&store, Direction::Upload, "/", dir.path(), true);
        for action in [
            SyncAction::Mkdir { path: "d".into() },
            SyncAction::Upload { path: "f.txt".into(), size: 3 },
            SyncAction::Delete { path: "gone".into(), kind: EntryKind::File },
        ] {
            assert_eq!(executor.apply(&action).await.unwrap(), ActionOutcome::Simulated);
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_goes_to_parent_directory() {
        let store = MemoryStore::new();
        store.add_dir("/Backup", 0);
        store.add_dir("/Backup/docs", 0);
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/r.md"), b"report").unwrap();

        let executor = TransferExecutor::new(&store, Direction::Upload, "/Backup", dir.path(), false);
        let outcome = executor
            .apply(&SyncAction::Upload { path: "docs/r.md".into(), size: 6 })
            .await
            .unwrap();

        assert_eq!(outcome, ActionOutcome::Applied { bytes: 6 });
        assert_eq!(store.file("/Backup/docs/r.md").unwrap().0, b"report");
    }
}
