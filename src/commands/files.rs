//! 单文件命令：ls / mkdir / rm / get / put

use crate::core::engine::remote_path;
use crate::core::{download_atomic, ActionOutcome};
use crate::storage::{RemoteEntry, RemoteStore};
use anyhow::{bail, Context, Result};
use chrono::DateTime;
use std::path::{Path, PathBuf};

/// `ls -l` 的一行：类型、大小、修改时间（UTC）、名称
pub fn format_entry(entry: &RemoteEntry, long: bool) -> String {
    let name = if entry.is_dir {
        format!("{}/", entry.name())
    } else {
        entry.name().to_string()
    };
    if !long {
        return name;
    }

    let kind = if entry.is_dir { 'd' } else { '-' };
    let size = if entry.is_dir {
        "-".to_string()
    } else {
        entry.size.to_string()
    };
    let modified = DateTime::from_timestamp(entry.modified_time, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{} {:>12} {} {}", kind, size, modified, name)
}

pub async fn ls(store: &dyn RemoteStore, path: &str, long: bool) -> Result<()> {
    let path = remote_path(path);
    let mut entries = store
        .list(&path)
        .await
        .with_context(|| format!("列出远程目录失败: {}", path))?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    for entry in &entries {
        println!("{}", format_entry(entry, long));
    }
    Ok(())
}

pub async fn mkdir(store: &dyn RemoteStore, path: &str) -> Result<()> {
    let path = remote_path(path);
    store
        .mkdir(&path)
        .await
        .with_context(|| format!("创建远程目录失败: {}", path))?;
    tracing::info!("已创建远程目录: {}", path);
    Ok(())
}

pub async fn rm(store: &dyn RemoteStore, path: &str) -> Result<()> {
    let path = remote_path(path);
    if path == "/" {
        bail!("拒绝删除远程根目录");
    }
    store
        .delete(&path)
        .await
        .with_context(|| format!("删除远程路径失败: {}", path))?;
    tracing::info!("已删除远程路径: {}", path);
    Ok(())
}

/// 在父目录的列表中查找远程条目
async fn stat(store: &dyn RemoteStore, path: &str) -> Result<RemoteEntry> {
    let parent = match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    };
    store
        .list(parent)
        .await
        .with_context(|| format!("列出远程目录失败: {}", parent))?
        .into_iter()
        .find(|e| e.path == path)
        .with_context(|| format!("远程文件不存在: {}", path))
}

/// 下载目标路径：未指定时用当前目录，指定目录时放在目录下
fn resolve_local_target(local: Option<&Path>, name: &str) -> Result<PathBuf> {
    match local {
        Some(path) if path.is_dir() => Ok(path.join(name)),
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(std::env::current_dir()?.join(name)),
    }
}

pub async fn get(store: &dyn RemoteStore, remote: &str, local: Option<&Path>) -> Result<()> {
    let remote = remote_path(remote);
    let entry = stat(store, &remote).await?;
    if entry.is_dir {
        bail!("{} 是目录，请使用 sync 命令", remote);
    }

    let target = resolve_local_target(local, entry.name())?;
    match download_atomic(store, &remote, &target, Some(entry.modified_time)).await? {
        ActionOutcome::RenameFailed { warning } => {
            eprintln!("警告: {}", warning);
        }
        _ => println!("{} -> {} ({} 字节)", remote, target.display(), entry.size),
    }
    Ok(())
}

pub async fn put(store: &dyn RemoteStore, local: &Path, remote_dir: &str, name: Option<&str>) -> Result<()> {
    if !local.is_file() {
        bail!("本地文件不存在: {}", local.display());
    }
    let remote_dir = remote_path(remote_dir);
    let entry = store
        .upload(local, &remote_dir, name)
        .await
        .with_context(|| format!("上传失败: {} -> {}", local.display(), remote_dir))?;
    println!("{} -> {} ({} 字节)", local.display(), entry.path, entry.size);
    Ok(())
}
