//! 命令行参数解析

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mirrorsync - 本地目录与远程存储之间的单向镜像同步
#[derive(Parser, Debug)]
#[command(name = "mirrorsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 输出更详细的日志（info -> debug）
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 输出全部调试日志（trace）
    #[arg(long, global = true)]
    pub debug: bool,

    /// 配置文件路径
    #[arg(long, global = true, env = "MIRRORSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// 同步目录树，源和目标恰好一个以 `remote:` 开头
    ///
    /// 示例:
    ///   mirrorsync sync remote:/Public ./public     # 下载
    ///   mirrorsync sync ./photos remote:/Photos     # 上传
    ///   mirrorsync sync ./photos remote:/Photos --dry-run --delete
    Sync {
        source: String,
        destination: String,

        /// 只打印将要执行的动作
        #[arg(long)]
        dry_run: bool,

        /// 删除目标端多余的文件和目录
        #[arg(long)]
        delete: bool,

        /// 以 JSON 输出同步报告
        #[arg(long)]
        json: bool,
    },

    /// 列出远程目录
    Ls {
        #[arg(default_value = "/")]
        path: String,

        /// 显示类型、大小和修改时间
        #[arg(short, long)]
        long: bool,
    },

    /// 创建远程目录
    Mkdir { path: String },

    /// 删除远程文件或目录
    Rm { path: String },

    /// 下载单个远程文件
    Get {
        remote: String,
        /// 本地路径，默认为当前目录下的同名文件
        local: Option<PathBuf>,
    },

    /// 上传单个本地文件到远程目录
    Put {
        local: PathBuf,
        remote_dir: String,
        /// 远程文件名，默认为本地文件名
        #[arg(long)]
        name: Option<String>,
    },

    /// 交互式配置远程存储
    Setup,
}
