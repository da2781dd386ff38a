//! 同步错误分类
//!
//! 除 `Rename` 外，所有错误都会终止当前同步，已完成的动作不回滚。
//! `Rename` 由执行器转换为报告中的警告。

use std::fmt;
use std::path::PathBuf;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// 传输类原语
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Upload,
    Download,
    Mkdir,
    Delete,
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOp::Upload => write!(f, "upload"),
            TransferOp::Download => write!(f, "download"),
            TransferOp::Mkdir => write!(f, "mkdir"),
            TransferOp::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 同步方向无效（两端都是远程或都是本地）
    #[error("用法错误: {0}")]
    Usage(String),

    /// 远程目录列举失败，不重试
    #[error("列出远程目录失败 {path}: {source}")]
    RemoteList {
        path: String,
        #[source]
        source: BoxError,
    },

    /// 上传/下载/创建目录/删除失败
    #[error("{op} 失败 {path}: {source}")]
    Transfer {
        op: TransferOp,
        path: String,
        #[source]
        source: BoxError,
    },

    /// 本地文件系统错误
    #[error("本地文件系统错误 {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 下载完成后原子重命名失败（唯一可恢复的错误）
    #[error("重命名失败 {} -> {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置缺失或无法读取
    #[error("配置错误: {0}")]
    Config(String),
}

impl SyncError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn remote_list(path: impl Into<String>, err: anyhow::Error) -> Self {
        Self::RemoteList {
            path: path.into(),
            source: err.into(),
        }
    }

    pub fn transfer(op: TransferOp, path: impl Into<String>, err: anyhow::Error) -> Self {
        Self::Transfer {
            op,
            path: path.into(),
            source: err.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
