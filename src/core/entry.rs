//! 条目与树映射
//!
//! 两端的目录树都表示为「相对路径 -> 条目」的有序映射。祖先路径总是后代路径的严格前缀，
//! 所以按键正序遍历就是前序（先祖先后后代），逆序遍历就是后序。

use serde::Serialize;
use std::collections::BTreeMap;

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// 一个文件或目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// 相对根目录的路径，`/` 分隔，不包含根目录本身
    pub path: String,
    pub kind: EntryKind,
    /// 仅文件有大小
    pub size: Option<u64>,
    /// 修改时间（Unix 秒）
    pub modified_time: i64,
    /// 远程版本号（仅远程条目）
    pub revision: Option<String>,
}

impl Entry {
    pub fn file(path: impl Into<String>, size: u64, modified_time: i64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size: Some(size),
            modified_time,
            revision: None,
        }
    }

    pub fn dir(path: impl Into<String>, modified_time: i64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            size: None,
            modified_time,
            revision: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn size(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// 相对路径 -> 条目
pub type TreeMap = BTreeMap<String, Entry>;

/// 同步方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// 远程 -> 本地
    Download,
    /// 本地 -> 远程
    Upload,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

/// 拼接相对路径
pub fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// 相对路径的父路径，顶层条目返回空串
pub fn parent_relative(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// 相对路径的最后一段
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `path` 是否等于 `ancestor` 或位于其下（按路径段判断）
pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}
